pub mod awsdoctor;
pub mod factory;
pub mod fixtures;
pub mod kubecost;
pub mod tenant_auth;

pub use awsdoctor::{BinaryRunner, WasteReport, map_waste_findings};
pub use factory::SessionTenantFactory;
pub use fixtures::{FixtureCost, FixtureInfra, FixtureKubeCost, FixtureWaste};
pub use kubecost::KubeCostClient;
pub use tenant_auth::{
    SessionBroker, SessionConfig, StaticSessionBroker, TenantSessionProvider,
};
