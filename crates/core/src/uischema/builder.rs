use super::components;
use super::{Action, ActionType, ConfirmConfig, UISchema};
use crate::domain::{
    ActionRiskLevel, ApprovalStatus, FinOpsState, RecommendedAction, VerificationRecommendation,
    risk_score,
};

const HIGH_RISK_ACKNOWLEDGE: &str = "I understand these actions include high-risk changes";

/// Constructs a UISchema from the current workflow state.
pub fn build(state: &FinOpsState) -> UISchema {
    let mut schema = UISchema {
        version: super::SCHEMA_VERSION.to_string(),
        workflow_id: state.workflow_id.clone(),
        phase: state.current_phase.as_str().to_string(),
        components: Vec::new(),
        actions: Vec::new(),
    };

    if let Some(summary) = components::anomaly_summary(state) {
        schema.components.push(summary);
    }

    // After triage: classification plus category-specific evidence.
    if let Some(triage) = &state.triage {
        schema.components.push(components::triage_card(triage));
        schema.components.push(components::category_evidence(triage));
    }

    // After analysis: plan plus per-action editors, once approval is settled.
    if let Some(analysis) = &state.analysis {
        if state.approval != ApprovalStatus::Pending {
            schema.components.push(components::action_plan(analysis));
            schema.components.extend(components::action_editors(analysis));
        }
    }

    // At the HIL gate with a pending decision: approval queue + approve/deny.
    if state.approval == ApprovalStatus::Pending && state.analysis.is_some() {
        schema.components.push(components::approval_queue(state));

        let mut approve =
            Action { action_type: ActionType::Approve, label: "Approve Actions".to_string(), confirm: None };
        if let Some(analysis) = &state.analysis {
            if has_high_risk(&analysis.recommended_actions) {
                approve.confirm = Some(ConfirmConfig {
                    required: true,
                    acknowledge_text: HIGH_RISK_ACKNOWLEDGE.to_string(),
                });
            }
        }
        schema.actions.push(approve);
        schema.actions.push(Action {
            action_type: ActionType::Deny,
            label: "Deny Actions".to_string(),
            confirm: None,
        });
    }

    if !state.executions.is_empty() {
        schema.components.push(components::execution_results(&state.executions));
    }

    if let Some(verification) = &state.verification {
        schema.components.push(components::verification_dashboard(verification));
        if verification.recommendation == VerificationRecommendation::Rollback {
            schema.actions.push(Action {
                action_type: ActionType::Rollback,
                label: "Rollback Changes".to_string(),
                confirm: Some(ConfirmConfig {
                    required: true,
                    acknowledge_text: "I want to rollback the executed changes".to_string(),
                }),
            });
        }
        if verification.recommendation == VerificationRecommendation::Escalate {
            schema.actions.push(Action {
                action_type: ActionType::Escalate,
                label: "Escalate to Engineering".to_string(),
                confirm: None,
            });
        }
    }

    schema
}

fn has_high_risk(actions: &[RecommendedAction]) -> bool {
    actions
        .iter()
        .any(|a| risk_score(a.risk_level) >= risk_score(ActionRiskLevel::High))
}

#[cfg(test)]
mod tests {
    use super::build;
    use crate::domain::{
        ActionRiskLevel, AnalysisResult, AnomalyCategory, AnomalySeverity, ApprovalStatus,
        CostAnomaly, ExecutionResult, FinOpsState, RecommendedAction, TenantContext,
        TriageEvidence, TriageResult, VerificationRecommendation, VerificationResult,
        WorkflowPhase,
    };
    use crate::uischema::{ActionType, ComponentType};

    fn state_with_anomaly() -> FinOpsState {
        let mut state = FinOpsState::new(TenantContext::new("acme"));
        let mut anomaly = CostAnomaly::new();
        anomaly.service = "EC2".to_string();
        anomaly.account_id = "123456789012".to_string();
        anomaly.delta_dollars = 750.0;
        state.anomaly = Some(anomaly);
        state
    }

    fn triage(category: AnomalyCategory) -> TriageResult {
        TriageResult {
            category,
            severity: AnomalySeverity::Medium,
            confidence: 0.8,
            summary: "test".to_string(),
            evidence: TriageEvidence::default(),
        }
    }

    fn analysis(risk: ActionRiskLevel) -> AnalysisResult {
        AnalysisResult {
            root_cause_narrative: "narrative".to_string(),
            affected_resources: vec![],
            recommended_actions: vec![RecommendedAction::new(
                "do the thing",
                "do_thing",
                risk,
                "undo the thing",
            )],
            estimated_monthly_savings: 0.0,
            confidence: 0.4,
        }
    }

    #[test]
    fn empty_state_has_no_components() {
        let state = FinOpsState::new(TenantContext::new("acme"));
        let schema = build(&state);
        assert!(schema.components.is_empty());
        assert!(schema.actions.is_empty());
        assert_eq!(schema.phase, "watcher");
    }

    #[test]
    fn anomaly_summary_is_always_first() {
        let schema = build(&state_with_anomaly());
        assert_eq!(schema.components.len(), 1);
        assert_eq!(schema.components[0].component_type, ComponentType::AnomalySummary);
        assert_eq!(schema.components[0].priority, 0);
    }

    #[test]
    fn triage_adds_card_and_category_evidence() {
        let mut state = state_with_anomaly();
        state.triage = Some(triage(AnomalyCategory::CommitmentCoverageDrift));
        let schema = build(&state);

        let types: Vec<ComponentType> =
            schema.components.iter().map(|c| c.component_type).collect();
        assert!(types.contains(&ComponentType::TriageCard));
        assert!(types.contains(&ComponentType::CommitmentDrift));
    }

    #[test]
    fn unknown_category_gets_generic_evidence_panel() {
        let mut state = state_with_anomaly();
        state.triage = Some(triage(AnomalyCategory::Unknown));
        let schema = build(&state);

        let types: Vec<ComponentType> =
            schema.components.iter().map(|c| c.component_type).collect();
        assert!(types.contains(&ComponentType::EvidencePanel));
    }

    #[test]
    fn pending_approval_shows_queue_with_approve_and_deny() {
        let mut state = state_with_anomaly();
        state.triage = Some(triage(AnomalyCategory::Unknown));
        state.analysis = Some(analysis(ActionRiskLevel::Medium));
        state.approval = ApprovalStatus::Pending;
        state.current_phase = WorkflowPhase::HilGate;

        let schema = build(&state);
        let types: Vec<ComponentType> =
            schema.components.iter().map(|c| c.component_type).collect();
        assert!(types.contains(&ComponentType::ApprovalQueue));
        // Plan and editors are withheld until the approval decision lands.
        assert!(!types.contains(&ComponentType::ActionPlan));

        assert_eq!(schema.actions.len(), 2);
        assert_eq!(schema.actions[0].action_type, ActionType::Approve);
        assert!(schema.actions[0].confirm.is_none());
        assert_eq!(schema.actions[1].action_type, ActionType::Deny);
    }

    #[test]
    fn high_risk_pending_approval_requires_confirmation() {
        let mut state = state_with_anomaly();
        state.analysis = Some(analysis(ActionRiskLevel::High));
        state.approval = ApprovalStatus::Pending;

        let schema = build(&state);
        let confirm = schema.actions[0].confirm.as_ref().expect("confirm required");
        assert!(confirm.required);
        assert_eq!(
            confirm.acknowledge_text,
            "I understand these actions include high-risk changes"
        );
    }

    #[test]
    fn settled_approval_shows_plan_and_editors() {
        let mut state = state_with_anomaly();
        state.analysis = Some(analysis(ActionRiskLevel::Low));
        state.approval = ApprovalStatus::AutoApproved;

        let schema = build(&state);
        let types: Vec<ComponentType> =
            schema.components.iter().map(|c| c.component_type).collect();
        assert!(types.contains(&ComponentType::ActionPlan));
        assert!(types.contains(&ComponentType::ActionEditor));
        assert!(schema.actions.is_empty());
    }

    #[test]
    fn executions_and_verification_append_dashboards() {
        let mut state = state_with_anomaly();
        state.executions = vec![ExecutionResult {
            action_id: "a1".to_string(),
            executed_at: "2026-02-16T00:00:00Z".to_string(),
            success: true,
            details: "ok".to_string(),
            rollback_available: true,
            pre_action_snapshot: Default::default(),
            post_action_snapshot: Default::default(),
        }];
        state.verification = Some(VerificationResult {
            verified_at: "2026-02-16T00:05:00Z".to_string(),
            cost_reduction_observed: false,
            observed_savings_daily: 0.0,
            service_health_ok: true,
            health_check_details: "ok".to_string(),
            recommendation: VerificationRecommendation::Monitor,
        });

        let schema = build(&state);
        let types: Vec<ComponentType> =
            schema.components.iter().map(|c| c.component_type).collect();
        assert!(types.contains(&ComponentType::ExecutionResults));
        assert!(types.contains(&ComponentType::VerificationDashboard));
        assert!(schema.actions.is_empty());
    }

    #[test]
    fn rollback_recommendation_adds_confirmed_rollback_action() {
        let mut state = state_with_anomaly();
        state.verification = Some(VerificationResult {
            verified_at: "2026-02-16T00:05:00Z".to_string(),
            cost_reduction_observed: false,
            observed_savings_daily: 0.0,
            service_health_ok: false,
            health_check_details: "errors elevated".to_string(),
            recommendation: VerificationRecommendation::Rollback,
        });

        let schema = build(&state);
        assert_eq!(schema.actions.len(), 1);
        assert_eq!(schema.actions[0].action_type, ActionType::Rollback);
        assert!(schema.actions[0].confirm.as_ref().expect("confirm").required);
    }

    #[test]
    fn escalate_recommendation_adds_escalate_action() {
        let mut state = state_with_anomaly();
        state.verification = Some(VerificationResult {
            verified_at: "2026-02-16T00:05:00Z".to_string(),
            cost_reduction_observed: false,
            observed_savings_daily: 0.0,
            service_health_ok: false,
            health_check_details: "unclear".to_string(),
            recommendation: VerificationRecommendation::Escalate,
        });

        let schema = build(&state);
        assert_eq!(schema.actions.len(), 1);
        assert_eq!(schema.actions[0].action_type, ActionType::Escalate);
        assert!(schema.actions[0].confirm.is_none());
    }

    #[test]
    fn components_are_priority_ordered() {
        let mut state = state_with_anomaly();
        state.triage = Some(triage(AnomalyCategory::DataTransfer));
        state.analysis = Some(analysis(ActionRiskLevel::Low));
        state.approval = ApprovalStatus::AutoApproved;

        let schema = build(&state);
        let priorities: Vec<i32> = schema.components.iter().map(|c| c.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted);
    }
}
