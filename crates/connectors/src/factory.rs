//! Per-tenant client factory: assumes the tenant's role through the session
//! provider, then builds fetchers scoped to the resulting session. The
//! concrete client constructors are injected so the factory stays agnostic
//! of the cloud SDK surface.

use std::sync::Arc;

use async_trait::async_trait;

use finops_core::domain::TenantContext;
use finops_core::triage::{CostFetcher, FetchResult};

use finops_engine::activities::{InfraClient, TenantClientFactory};

use crate::tenant_auth::{SessionBroker, SessionConfig, TenantSessionProvider};

pub type CostBuilder = dyn Fn(&SessionConfig) -> Arc<dyn CostFetcher> + Send + Sync;
pub type InfraBuilder = dyn Fn(&SessionConfig) -> Arc<dyn InfraClient> + Send + Sync;

/// Builds per-tenant fetchers from assumed-role sessions.
pub struct SessionTenantFactory<B> {
    provider: Arc<TenantSessionProvider<B>>,
    cost_builder: Box<CostBuilder>,
    infra_builder: Box<InfraBuilder>,
}

impl<B> SessionTenantFactory<B>
where
    B: SessionBroker,
{
    pub fn new(
        provider: Arc<TenantSessionProvider<B>>,
        cost_builder: Box<CostBuilder>,
        infra_builder: Box<InfraBuilder>,
    ) -> Self {
        Self { provider, cost_builder, infra_builder }
    }

    async fn session(&self, tenant: &TenantContext) -> FetchResult<SessionConfig> {
        self.provider
            .for_tenant(&tenant.tenant_id, &tenant.iam_role_arn, &tenant.default_region)
            .await
    }
}

#[async_trait]
impl<B> TenantClientFactory for SessionTenantFactory<B>
where
    B: SessionBroker,
{
    async fn cost_client(&self, tenant: &TenantContext) -> FetchResult<Arc<dyn CostFetcher>> {
        let session = self.session(tenant).await?;
        Ok((self.cost_builder)(&session))
    }

    async fn infra_client(&self, tenant: &TenantContext) -> FetchResult<Arc<dyn InfraClient>> {
        let session = self.session(tenant).await?;
        Ok((self.infra_builder)(&session))
    }
}
