pub mod enums;
pub mod models;
pub mod validate;

pub use enums::{
    ActionRiskLevel, AnomalyCategory, AnomalySeverity, ApprovalStatus,
    VerificationRecommendation, WorkflowPhase, risk_score,
};
pub use models::{
    AnalysisResult, CostAnomaly, ExecutionResult, FinOpsState, RecommendedAction, TenantContext,
    TriageEvidence, TriageResult, VerificationResult, WasteFinding, short_id,
};
pub use validate::{
    ValidationFailure, validate_action, validate_anomaly, validate_role_arn, validate_tenant,
    validate_triage, validate_window_date,
};
