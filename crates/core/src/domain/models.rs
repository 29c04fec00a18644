use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::enums::{
    ActionRiskLevel, AnomalyCategory, AnomalySeverity, ApprovalStatus, VerificationRecommendation,
    WorkflowPhase,
};

/// Generates a short opaque identifier (8 hex chars) for anomalies and actions.
pub fn short_id() -> String {
    format!("{:08x}", rand::random::<u32>())
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// A detected cost deviation awaiting triage. Carries evidence, not a
/// diagnosis. `delta_dollars ≈ actual − expected` is assumed from the
/// detector and not re-checked; negative deltas are permitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostAnomaly {
    pub anomaly_id: String,
    pub detected_at: String,

    pub service: String,
    pub account_id: String,
    pub region: String,
    pub team: String,

    pub expected_daily_cost: f64,
    pub actual_daily_cost: f64,
    pub delta_dollars: f64,
    pub delta_percent: f64,
    pub z_score: f64,
    pub lookback_days: i64,
}

impl CostAnomaly {
    pub fn new() -> Self {
        Self {
            anomaly_id: short_id(),
            detected_at: now_rfc3339(),
            service: String::new(),
            account_id: String::new(),
            region: String::new(),
            team: String::new(),
            expected_daily_cost: 0.0,
            actual_daily_cost: 0.0,
            delta_dollars: 0.0,
            delta_percent: 0.0,
            z_score: 0.0,
            lookback_days: 30,
        }
    }
}

impl Default for CostAnomaly {
    fn default() -> Self {
        Self::new()
    }
}

/// A single resource waste finding from the waste scanner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WasteFinding {
    pub resource_type: String,
    pub resource_id: String,
    pub resource_arn: String,
    pub reason: String,
    pub estimated_monthly_savings: f64,
    pub region: String,
}

/// Correlation evidence collected during triage. Fields are populated by the
/// classifier as checks run; category-specific fields stay `None` when the
/// corresponding check never executed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageEvidence {
    pub deploy_correlation: Vec<String>,
    pub usage_correlation: Vec<String>,
    pub infra_correlation: Vec<String>,

    pub ri_coverage_delta: Option<f64>,
    pub sp_coverage_delta: Option<f64>,
    pub credits_delta: Option<f64>,
    pub refunds_delta: Option<f64>,
    pub fees_delta: Option<f64>,
    pub marketplace_delta: Option<f64>,
    pub data_transfer_delta: Option<f64>,
    pub k8s_namespace_deltas: BTreeMap<String, f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waste_findings: Vec<WasteFinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waste_savings: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_velocity_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trend_direction: String,
}

/// Output of the triage classifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub category: AnomalyCategory,
    pub severity: AnomalySeverity,
    pub confidence: f64,
    pub summary: String,
    pub evidence: TriageEvidence,
}

/// A proposed remediation from the analysis planner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub action_id: String,
    pub description: String,
    pub action_type: String,
    pub risk_level: ActionRiskLevel,
    pub estimated_savings_monthly: f64,
    pub target_resource: String,
    pub parameters: BTreeMap<String, Value>,
    pub rollback_procedure: String,
}

impl RecommendedAction {
    pub fn new(
        description: impl Into<String>,
        action_type: impl Into<String>,
        risk_level: ActionRiskLevel,
        rollback_procedure: impl Into<String>,
    ) -> Self {
        Self {
            action_id: short_id(),
            description: description.into(),
            action_type: action_type.into(),
            risk_level,
            estimated_savings_monthly: 0.0,
            target_resource: String::new(),
            parameters: BTreeMap::new(),
            rollback_procedure: rollback_procedure.into(),
        }
    }
}

/// Output of the analysis planner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub root_cause_narrative: String,
    pub affected_resources: Vec<String>,
    pub recommended_actions: Vec<RecommendedAction>,
    pub estimated_monthly_savings: f64,
    pub confidence: f64,
}

/// Outcome of executing a single action, with pre/post snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub action_id: String,
    pub executed_at: String,
    pub success: bool,
    pub details: String,
    pub rollback_available: bool,
    pub pre_action_snapshot: BTreeMap<String, Value>,
    pub post_action_snapshot: BTreeMap<String, Value>,
}

/// Outcome of post-execution verification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verified_at: String,
    pub cost_reduction_observed: bool,
    pub observed_savings_daily: f64,
    pub service_health_ok: bool,
    pub health_check_details: String,
    pub recommendation: VerificationRecommendation,
}

/// Identifies a tenant and their cloud accounts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: String,
    pub aws_management_account_id: String,
    pub default_region: String,
    pub iam_role_arn: String,
    pub kubecost_base_url: String,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            aws_management_account_id: String::new(),
            default_region: "us-east-1".to_string(),
            iam_role_arn: String::new(),
            kubecost_base_url: String::new(),
        }
    }
}

/// Top-level workflow state. Owned exclusively by the workflow's executor;
/// external readers receive snapshots through the query handler. After
/// `should_terminate` flips true the state is never mutated again.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinOpsState {
    pub workflow_id: String,
    pub started_at: String,

    pub tenant: TenantContext,
    pub anomaly: Option<CostAnomaly>,
    pub triage: Option<TriageResult>,
    pub analysis: Option<AnalysisResult>,

    pub approval: ApprovalStatus,
    pub approval_details: String,

    pub executions: Vec<ExecutionResult>,
    pub verification: Option<VerificationResult>,

    pub current_phase: WorkflowPhase,
    pub should_terminate: bool,
    pub error: Option<String>,
}

impl FinOpsState {
    pub fn new(tenant: TenantContext) -> Self {
        Self {
            workflow_id: Uuid::new_v4().to_string(),
            started_at: now_rfc3339(),
            tenant,
            anomaly: None,
            triage: None,
            analysis: None,
            approval: ApprovalStatus::Pending,
            approval_details: String::new(),
            executions: Vec::new(),
            verification: None,
            current_phase: WorkflowPhase::Watcher,
            should_terminate: false,
            error: None,
        }
    }
}
