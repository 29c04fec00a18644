//! Activity adapters: the bridge between the workflow boundary and the pure
//! logic in `finops-core`. All I/O happens here; workflow bodies only see
//! the serialized inputs and outputs. Budgets and rate limits are advisory
//! wrappers applied on activity entry; they delay work, never skip safety.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use finops_core::analysis;
use finops_core::domain::{
    AnalysisResult, ApprovalStatus, CostAnomaly, ExecutionResult, RecommendedAction,
    TenantContext, TriageResult, VerificationResult, WasteFinding,
};
use finops_core::errors::ApplicationError;
use finops_core::executor::{Executor, TagFetcher};
use finops_core::ratelimit::{
    ActivityBudget, SERVICE_ATHENA, SERVICE_CLOUDWATCH, SERVICE_COST_EXPLORER, ServiceLimiter,
};
use finops_core::triage::{
    self, CostFetcher, FetchResult, InfraFetcher, KubeCostFetcher, WasteFetcher,
};
use finops_core::verifier;

/// Infra capability bundle: deploy/metric queries plus resource tag lookups.
pub trait InfraClient: InfraFetcher + TagFetcher {}
impl<T: InfraFetcher + TagFetcher> InfraClient for T {}

/// Produces per-tenant-scoped fetchers from assumed-role sessions. `None`
/// on the [`Activities`] struct means static (stub-mode) clients are used
/// for every tenant.
#[async_trait]
pub trait TenantClientFactory: Send + Sync {
    async fn cost_client(&self, tenant: &TenantContext) -> FetchResult<Arc<dyn CostFetcher>>;
    async fn infra_client(&self, tenant: &TenantContext) -> FetchResult<Arc<dyn InfraClient>>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriageInput {
    pub tenant: TenantContext,
    pub anomaly: CostAnomaly,
    pub window_start: String,
    pub window_end: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriageOutput {
    pub result: TriageResult,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanActionsInput {
    pub tenant: TenantContext,
    pub account_id: String,
    pub service: String,
    pub window_start: String,
    pub window_end: String,
    /// Waste findings surfaced by triage; each gets a templated action.
    #[serde(default)]
    pub waste_findings: Vec<WasteFinding>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanActionsOutput {
    pub result: AnalysisResult,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecuteActionsInput {
    pub tenant: TenantContext,
    pub approval: ApprovalStatus,
    pub actions: Vec<RecommendedAction>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecuteActionsOutput {
    pub results: Vec<ExecutionResult>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifyOutcomeInput {
    pub tenant: TenantContext,
    pub service: String,
    pub account_id: String,
    pub window_start: String,
    pub window_end: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifyOutcomeOutput {
    pub result: VerificationResult,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WasteScanInput {
    pub account_id: String,
    pub region: String,
    pub profile: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WasteScanOutput {
    pub findings: Vec<WasteFinding>,
    pub total_savings: f64,
}

/// Sent through the named "approval" update handler for HIL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub approved: bool,
    pub by: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

/// Dependency bundle for every activity. When `tenants` is set and the
/// tenant carries a role ARN, per-tenant clients are resolved dynamically;
/// otherwise the static clients serve all tenants (stub mode).
pub struct Activities {
    pub cost: Arc<dyn CostFetcher>,
    pub infra: Arc<dyn InfraClient>,
    pub kubecost: Option<Arc<dyn KubeCostFetcher>>,
    pub waste: Option<Arc<dyn WasteFetcher>>,
    pub tenants: Option<Arc<dyn TenantClientFactory>>,
    pub limiter: Arc<ServiceLimiter>,
    pub budget: Option<Arc<ActivityBudget>>,
}

impl Activities {
    fn check_budget(&self, tenant_id: &str, activity: &str) -> Result<(), ApplicationError> {
        let Some(budget) = &self.budget else {
            return Ok(());
        };
        budget
            .check(tenant_id, activity)
            .map_err(|exceeded| ApplicationError::Integration(exceeded.to_string()))?;
        budget.record(tenant_id, activity);
        Ok(())
    }

    async fn resolve_cost(
        &self,
        tenant: &TenantContext,
    ) -> Result<Arc<dyn CostFetcher>, ApplicationError> {
        if let Some(factory) = &self.tenants {
            if !tenant.iam_role_arn.is_empty() {
                return factory.cost_client(tenant).await;
            }
        }
        Ok(Arc::clone(&self.cost))
    }

    async fn resolve_infra(
        &self,
        tenant: &TenantContext,
    ) -> Result<Arc<dyn InfraClient>, ApplicationError> {
        if let Some(factory) = &self.tenants {
            if !tenant.iam_role_arn.is_empty() {
                return factory.infra_client(tenant).await;
            }
        }
        Ok(Arc::clone(&self.infra))
    }

    /// Classifies a cost anomaly with the deterministic evidence sieve.
    pub async fn triage_anomaly(&self, input: TriageInput) -> Result<TriageOutput, ApplicationError> {
        self.check_budget(&input.tenant.tenant_id, "TriageAnomaly")?;
        self.limiter.wait(SERVICE_COST_EXPLORER).await;

        let cost = self.resolve_cost(&input.tenant).await?;
        let infra = self.resolve_infra(&input.tenant).await?;

        let result = triage::triage(
            &input.anomaly,
            cost.as_ref(),
            infra.as_ref() as &dyn InfraFetcher,
            self.kubecost.as_deref(),
            self.waste.as_deref(),
            &input.window_start,
            &input.window_end,
        )
        .await?;
        Ok(TriageOutput { result })
    }

    /// Runs the deterministic planner and returns recommended actions.
    pub async fn plan_actions(
        &self,
        input: PlanActionsInput,
    ) -> Result<PlanActionsOutput, ApplicationError> {
        self.check_budget(&input.tenant.tenant_id, "PlanActions")?;
        self.limiter.wait(SERVICE_ATHENA).await;

        let cost = self.resolve_cost(&input.tenant).await?;
        let result = analysis::analyze_and_recommend(
            &input.account_id,
            &input.service,
            &input.window_start,
            &input.window_end,
            &input.waste_findings,
            cost.as_ref(),
        )
        .await?;
        Ok(PlanActionsOutput { result })
    }

    /// Gathers resource tags and runs the executor. Tags are fetched inside
    /// the activity boundary; I/O belongs here, not in the workflow.
    pub async fn execute_actions(
        &self,
        input: ExecuteActionsInput,
    ) -> Result<ExecuteActionsOutput, ApplicationError> {
        self.check_budget(&input.tenant.tenant_id, "ExecuteActions")?;
        self.limiter.wait(SERVICE_CLOUDWATCH).await;

        let infra = self.resolve_infra(&input.tenant).await?;

        let mut tags_by_resource = BTreeMap::new();
        for action in &input.actions {
            if action.target_resource.is_empty() {
                continue;
            }
            let tags = infra.resource_tags(&action.target_resource).await.map_err(|err| {
                ApplicationError::Fetch(format!(
                    "fetch tags for {}: {err}",
                    action.target_resource
                ))
            })?;
            tags_by_resource.insert(action.target_resource.clone(), tags);
        }

        let executor = Executor::new(infra);
        let results = executor
            .execute_actions(input.approval, &input.actions, &tags_by_resource)
            .await?;
        Ok(ExecuteActionsOutput { results })
    }

    /// Checks service health and observed cost reduction.
    pub async fn verify_outcome(
        &self,
        input: VerifyOutcomeInput,
    ) -> Result<VerifyOutcomeOutput, ApplicationError> {
        self.check_budget(&input.tenant.tenant_id, "VerifyOutcome")?;
        self.limiter.wait(SERVICE_COST_EXPLORER).await;

        let cost = self.resolve_cost(&input.tenant).await?;
        let result = verifier::verify(
            &input.service,
            &input.account_id,
            cost.as_ref(),
            &input.window_start,
            &input.window_end,
        )
        .await?;
        Ok(VerifyOutcomeOutput { result })
    }

    /// Runs a waste scan and returns domain-level findings.
    pub async fn run_waste_scan(
        &self,
        input: WasteScanInput,
    ) -> Result<WasteScanOutput, ApplicationError> {
        let Some(waste) = &self.waste else {
            return Err(ApplicationError::Configuration(
                "waste scanner not configured".to_string(),
            ));
        };
        let findings =
            waste.waste(&input.account_id, &input.region, &input.profile).await?;
        let total_savings = findings.iter().map(|f| f.estimated_monthly_savings).sum();
        Ok(WasteScanOutput { findings, total_savings })
    }
}
