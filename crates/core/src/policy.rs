//! Deterministic policy engine and executor safety gate.
//!
//! The engine decides whether recommended actions are auto-approved, require
//! human approval, or are denied outright. The safety gate re-checks the
//! same ground before any execution: the engine can be bypassed by invoking
//! the execute activity directly, the gate cannot.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::{ActionRiskLevel, ApprovalStatus, RecommendedAction, risk_score};

/// Approval outcome with a human-readable explanation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyDecision {
    pub approval: ApprovalStatus,
    pub details: String,
}

/// Risk-threshold policy. Thresholds are configurable per deployment;
/// defaults auto-approve up to low risk and deny at critical.
#[derive(Clone, Debug)]
pub struct PolicyEngine {
    pub auto_approve_max_risk: ActionRiskLevel,
    pub deny_min_risk: ActionRiskLevel,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self {
            auto_approve_max_risk: ActionRiskLevel::Low,
            deny_min_risk: ActionRiskLevel::Critical,
        }
    }
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest risk level present, determined by the explicit score table.
    /// Returns `None` for an empty action list.
    pub fn max_risk(&self, actions: &[RecommendedAction]) -> Option<ActionRiskLevel> {
        let mut max: Option<(ActionRiskLevel, u32)> = None;
        for action in actions {
            let score = risk_score(action.risk_level);
            if max.map_or(true, |(_, best)| score > best) {
                max = Some((action.risk_level, score));
            }
        }
        max.map(|(level, _)| level)
    }

    /// Evaluates the recommended actions.
    ///
    /// Rules:
    ///  1. No actions -> denied ("no recommended actions").
    ///  2. Max risk score >= deny threshold -> denied.
    ///  3. Max risk score <= auto-approve threshold -> auto-approved.
    ///  4. Otherwise -> pending (requires human approval).
    pub fn decide(&self, actions: &[RecommendedAction]) -> PolicyDecision {
        let Some(max_risk) = self.max_risk(actions) else {
            return PolicyDecision {
                approval: ApprovalStatus::Denied,
                details: "no recommended actions".to_string(),
            };
        };
        let max_score = risk_score(max_risk);

        if max_score >= risk_score(self.deny_min_risk) {
            return PolicyDecision {
                approval: ApprovalStatus::Denied,
                details: format!(
                    "critical-risk action(s) present: {}; manual-only",
                    max_risk.as_str()
                ),
            };
        }

        if max_score <= risk_score(self.auto_approve_max_risk) {
            return PolicyDecision {
                approval: ApprovalStatus::AutoApproved,
                details: format!("auto-approved; max risk={}", max_risk.as_str()),
            };
        }

        PolicyDecision {
            approval: ApprovalStatus::Pending,
            details: format!("requires human approval; max risk={}", max_risk.as_str()),
        }
    }
}

/// Refusals from the pre-execution safety gate.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SafetyRefusal {
    #[error("cannot execute: approval status is {0}")]
    NotApproved(&'static str),
    #[error("refuse to execute critical action {action_id}")]
    CriticalAction { action_id: String },
    #[error("refuse to execute on tagged resource {resource}: {tags:?}")]
    ProtectedResource { resource: String, tags: BTreeMap<String, String> },
}

/// Hard gate invoked before any action execution. Errors when:
///   - the approval status is not approved or auto_approved,
///   - any action carries critical risk,
///   - any action targets a resource tagged `do-not-modify` or `manual-only`.
pub fn enforce_executor_safety(
    approval: ApprovalStatus,
    actions: &[RecommendedAction],
    resource_tags: &BTreeMap<String, BTreeMap<String, String>>,
) -> Result<(), SafetyRefusal> {
    if approval != ApprovalStatus::Approved && approval != ApprovalStatus::AutoApproved {
        return Err(SafetyRefusal::NotApproved(approval.as_str()));
    }

    for action in actions {
        if action.risk_level == ActionRiskLevel::Critical {
            return Err(SafetyRefusal::CriticalAction { action_id: action.action_id.clone() });
        }

        if action.target_resource.is_empty() {
            continue;
        }
        if let Some(tags) = resource_tags.get(&action.target_resource) {
            let protected = tags.get("do-not-modify").map(String::as_str) == Some("true")
                || tags.get("manual-only").map(String::as_str) == Some("true");
            if protected {
                return Err(SafetyRefusal::ProtectedResource {
                    resource: action.target_resource.clone(),
                    tags: tags.clone(),
                });
            }
        }
    }

    Ok(())
}
