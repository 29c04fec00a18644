use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::domain::models::{CostAnomaly, RecommendedAction, TenantContext, TriageResult};

/// Boundary validation failures. These surface as 400-class responses or
/// startup errors; they never reach the workflow body.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ValidationFailure {
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("invalid account_id `{account_id}` (expected 12 digits)")]
    InvalidAccountId { account_id: String },
    #[error("invalid IAM role ARN: `{arn}`")]
    InvalidRoleArn { arn: String },
    #[error("invalid window date `{date}` (expected YYYY-MM-DD)")]
    InvalidWindowDate { date: String },
    #[error("confidence must be between 0 and 1, got {confidence}")]
    ConfidenceOutOfRange { confidence: f64 },
}

fn account_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{12}$").expect("account id regex"))
}

fn role_arn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^arn:aws:iam::\d{12}:role/.+$").expect("role arn regex"))
}

fn window_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("window date regex"))
}

/// Checks that an IAM role ARN matches the strict cross-account role shape.
pub fn validate_role_arn(arn: &str) -> Result<(), ValidationFailure> {
    if role_arn_re().is_match(arn) {
        Ok(())
    } else {
        Err(ValidationFailure::InvalidRoleArn { arn: arn.to_string() })
    }
}

/// Checks an analysis window date. Dates are interpolated into CUR queries,
/// so anything outside the strict calendar shape is rejected.
pub fn validate_window_date(date: &str) -> Result<(), ValidationFailure> {
    if date.is_empty() || window_date_re().is_match(date) {
        Ok(())
    } else {
        Err(ValidationFailure::InvalidWindowDate { date: date.to_string() })
    }
}

pub fn validate_anomaly(anomaly: &CostAnomaly) -> Result<(), ValidationFailure> {
    if anomaly.anomaly_id.is_empty() {
        return Err(ValidationFailure::MissingField { field: "anomaly_id" });
    }
    if anomaly.service.is_empty() {
        return Err(ValidationFailure::MissingField { field: "service" });
    }
    if anomaly.account_id.is_empty() {
        return Err(ValidationFailure::MissingField { field: "account_id" });
    }
    if !account_id_re().is_match(&anomaly.account_id) {
        return Err(ValidationFailure::InvalidAccountId {
            account_id: anomaly.account_id.clone(),
        });
    }
    Ok(())
}

pub fn validate_tenant(tenant: &TenantContext) -> Result<(), ValidationFailure> {
    if tenant.tenant_id.is_empty() {
        return Err(ValidationFailure::MissingField { field: "tenant_id" });
    }
    // Empty ARN means stub mode; non-empty must match the strict shape.
    if !tenant.iam_role_arn.is_empty() {
        validate_role_arn(&tenant.iam_role_arn)?;
    }
    Ok(())
}

pub fn validate_action(action: &RecommendedAction) -> Result<(), ValidationFailure> {
    if action.action_id.is_empty() {
        return Err(ValidationFailure::MissingField { field: "action_id" });
    }
    if action.description.is_empty() {
        return Err(ValidationFailure::MissingField { field: "description" });
    }
    if action.action_type.is_empty() {
        return Err(ValidationFailure::MissingField { field: "action_type" });
    }
    if action.rollback_procedure.is_empty() {
        return Err(ValidationFailure::MissingField { field: "rollback_procedure" });
    }
    Ok(())
}

pub fn validate_triage(result: &TriageResult) -> Result<(), ValidationFailure> {
    if !(0.0..=1.0).contains(&result.confidence) {
        return Err(ValidationFailure::ConfidenceOutOfRange { confidence: result.confidence });
    }
    Ok(())
}
