// Re-export chrono for downstream crates that need DateTime types
pub use chrono;

pub mod analysis;
pub mod config;
pub mod domain;
pub mod errors;
pub mod executor;
pub mod policy;
pub mod ratelimit;
pub mod triage;
pub mod uischema;
pub mod verifier;

pub use config::{Config, ConfigError, Mode};
pub use domain::{
    ActionRiskLevel, AnalysisResult, AnomalyCategory, AnomalySeverity, ApprovalStatus,
    CostAnomaly, ExecutionResult, FinOpsState, RecommendedAction, TenantContext, TriageEvidence,
    TriageResult, VerificationRecommendation, VerificationResult, WasteFinding, WorkflowPhase,
    risk_score,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use executor::{Executor, TagFetcher};
pub use policy::{PolicyDecision, PolicyEngine, SafetyRefusal, enforce_executor_safety};
pub use ratelimit::{ActivityBudget, BudgetExceeded, ServiceLimiter, ServiceRates};
pub use triage::{
    CostFetcher, FetchResult, InfraFetcher, KubeCostFetcher, WasteFetcher, severity_from_delta,
    triage,
};
pub use uischema::UISchema;
