use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of a cost anomaly, derived from the absolute daily dollar delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnomalySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Root-cause category assigned by the triage classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyCategory {
    ExpectedGrowth,
    DeployRelated,
    ConfigDrift,
    PricingChange,
    CreditsRefundsFees,
    Marketplace,
    DataTransfer,
    K8sCostShift,
    CommitmentCoverageDrift,
    ResourceWaste,
    Unknown,
}

impl AnomalyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpectedGrowth => "expected_growth",
            Self::DeployRelated => "deploy_related",
            Self::ConfigDrift => "config_drift",
            Self::PricingChange => "pricing_change",
            Self::CreditsRefundsFees => "credits_refunds_fees",
            Self::Marketplace => "marketplace",
            Self::DataTransfer => "data_transfer",
            Self::K8sCostShift => "k8s_cost_shift",
            Self::CommitmentCoverageDrift => "commitment_coverage_drift",
            Self::ResourceWaste => "resource_waste",
            Self::Unknown => "unknown",
        }
    }
}

/// Human-in-the-loop approval state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    AutoApproved,
    TimedOut,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::AutoApproved => "auto_approved",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Risk level of a recommended action.
///
/// Deliberately does not implement `Ord`: comparisons must go through the
/// explicit [`risk_score`] table, never enum declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRiskLevel {
    Low,
    LowMedium,
    Medium,
    High,
    Critical,
}

impl ActionRiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::LowMedium => "low_medium",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// The explicit risk score table.
pub fn risk_score(level: ActionRiskLevel) -> u32 {
    match level {
        ActionRiskLevel::Low => 10,
        ActionRiskLevel::LowMedium => 20,
        ActionRiskLevel::Medium => 30,
        ActionRiskLevel::High => 40,
        ActionRiskLevel::Critical => 50,
    }
}

/// Post-execution verifier recommendation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationRecommendation {
    Close,
    Rollback,
    Escalate,
    Monitor,
}

impl VerificationRecommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Rollback => "rollback",
            Self::Escalate => "escalate",
            Self::Monitor => "monitor",
        }
    }
}

/// Workflow phase, ordered along the lifecycle pipeline. The ordering is used
/// only to assert phase monotonicity, never for risk or policy decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Watcher,
    Triage,
    Analyst,
    HilGate,
    Executor,
    Verifier,
    Completed,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Watcher => "watcher",
            Self::Triage => "triage",
            Self::Analyst => "analyst",
            Self::HilGate => "hil_gate",
            Self::Executor => "executor",
            Self::Verifier => "verifier",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "watcher" => Some(Self::Watcher),
            "triage" => Some(Self::Triage),
            "analyst" => Some(Self::Analyst),
            "hil_gate" => Some(Self::HilGate),
            "executor" => Some(Self::Executor),
            "verifier" => Some(Self::Verifier),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown enum value: {0}")]
pub struct UnknownEnumValue(pub String);
