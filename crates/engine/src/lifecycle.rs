//! The anomaly lifecycle workflow:
//!
//! ```text
//! watcher -> triage -> analyst -> hil_gate -> executor -> verifier -> END
//! ```
//!
//! Each step may short-circuit to a terminal reason via early return. The
//! policy decision runs in-workflow (pure function, no I/O); everything
//! else crosses the activity boundary. Activities get one attempt each:
//! a failed activity terminates the workflow rather than retrying a
//! potentially unsafe operation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use finops_core::domain::{
    AnomalyCategory, ApprovalStatus, CostAnomaly, FinOpsState, TenantContext, WorkflowPhase,
};
use finops_core::policy::PolicyEngine;

use crate::activities::{
    ExecuteActionsInput, PlanActionsInput, TriageInput, VerifyOutcomeInput,
};
use crate::runtime::WorkflowCtx;

/// How long the workflow waits for human approval at the HIL gate.
pub const HIL_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Start-to-close timeout for lifecycle activities. No automatic retries.
pub const ACTIVITY_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Expected-growth triage at or above this confidence ends the workflow:
/// the system refuses to act when costs are explainably growing.
pub const EXPECTED_GROWTH_EXIT_CONFIDENCE: f64 = 0.85;

/// Why the workflow ended. Every terminal state has a stable name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Completed,
    NoAnomaly,
    ExpectedGrowthHighConfidence,
    NoActions,
    PolicyDenied,
    HumanDenied,
    ApprovalTimedOut,
    TriageError,
    PlanError,
    ExecutionError,
    VerifyError,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NoAnomaly => "no_anomaly",
            Self::ExpectedGrowthHighConfidence => "expected_growth_high_confidence",
            Self::NoActions => "no_actions",
            Self::PolicyDenied => "policy_denied",
            Self::HumanDenied => "human_denied",
            Self::ApprovalTimedOut => "approval_timed_out",
            Self::TriageError => "triage_error",
            Self::PlanError => "plan_error",
            Self::ExecutionError => "execution_error",
            Self::VerifyError => "verify_error",
        }
    }
}

/// Input to the anomaly lifecycle workflow. IDs and timestamps inside are
/// supplied by the caller; the workflow body generates nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub tenant: TenantContext,
    pub anomaly: Option<CostAnomaly>,
    #[serde(default)]
    pub window_start: String,
    #[serde(default)]
    pub window_end: String,
}

/// The workflow's queryable result. `reason` is set on termination; running
/// workflows expose their current state with `reason: null`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub state: FinOpsState,
    pub reason: Option<TerminationReason>,
}

impl WorkflowResult {
    pub fn in_progress(state: FinOpsState) -> Self {
        Self { state, reason: None }
    }

    pub fn finished(state: FinOpsState, reason: TerminationReason) -> Self {
        Self { state, reason: Some(reason) }
    }
}

fn terminal(
    mut state: FinOpsState,
    reason: TerminationReason,
    error: Option<String>,
) -> WorkflowResult {
    state.should_terminate = true;
    state.error = error;
    WorkflowResult::finished(state, reason)
}

/// Drives one anomaly through triage, planning, the policy/HIL gate,
/// execution, and verification. Returns a result on every path; the caller
/// persists terminal snapshots.
pub async fn anomaly_lifecycle(
    ctx: &WorkflowCtx,
    mut state: FinOpsState,
    input: WorkflowInput,
) -> WorkflowResult {
    // Watcher: validate anomaly input.
    let Some(anomaly) = input.anomaly else {
        tracing::info!(workflow_id = %ctx.workflow_id, "no anomaly provided, exiting");
        return terminal(state, TerminationReason::NoAnomaly, None);
    };
    state.anomaly = Some(anomaly.clone());
    ctx.persist(&WorkflowResult::in_progress(state.clone())).await;

    // Triage: classify the anomaly.
    state.current_phase = WorkflowPhase::Triage;
    ctx.persist(&WorkflowResult::in_progress(state.clone())).await;

    let triage_out = ctx
        .execute(
            "triage",
            ACTIVITY_TIMEOUT,
            ctx.activities().triage_anomaly(TriageInput {
                tenant: input.tenant.clone(),
                anomaly: anomaly.clone(),
                window_start: input.window_start.clone(),
                window_end: input.window_end.clone(),
            }),
        )
        .await;
    let triage_out = match triage_out {
        Ok(output) => output,
        Err(error) => {
            return terminal(
                state,
                TerminationReason::TriageError,
                Some(format!("triage failed: {error}")),
            );
        }
    };
    state.triage = Some(triage_out.result.clone());
    ctx.persist(&WorkflowResult::in_progress(state.clone())).await;
    tracing::info!(
        workflow_id = %ctx.workflow_id,
        category = triage_out.result.category.as_str(),
        confidence = triage_out.result.confidence,
        "triage complete"
    );

    // Early exit: expected growth with high confidence.
    if triage_out.result.category == AnomalyCategory::ExpectedGrowth
        && triage_out.result.confidence >= EXPECTED_GROWTH_EXIT_CONFIDENCE
    {
        tracing::info!(workflow_id = %ctx.workflow_id, "expected growth with high confidence, exiting early");
        return terminal(state, TerminationReason::ExpectedGrowthHighConfidence, None);
    }

    // Analyst: plan actions.
    state.current_phase = WorkflowPhase::Analyst;
    ctx.persist(&WorkflowResult::in_progress(state.clone())).await;

    let plan_out = ctx
        .execute(
            "analyst",
            ACTIVITY_TIMEOUT,
            ctx.activities().plan_actions(PlanActionsInput {
                tenant: input.tenant.clone(),
                account_id: anomaly.account_id.clone(),
                service: anomaly.service.clone(),
                window_start: input.window_start.clone(),
                window_end: input.window_end.clone(),
                waste_findings: triage_out.result.evidence.waste_findings.clone(),
            }),
        )
        .await;
    let plan_out = match plan_out {
        Ok(output) => output,
        Err(error) => {
            return terminal(
                state,
                TerminationReason::PlanError,
                Some(format!("plan actions failed: {error}")),
            );
        }
    };
    state.analysis = Some(plan_out.result.clone());
    ctx.persist(&WorkflowResult::in_progress(state.clone())).await;

    // Early exit: nothing to do. The engine never invents fallback actions.
    if plan_out.result.recommended_actions.is_empty() {
        tracing::info!(workflow_id = %ctx.workflow_id, "no actions recommended, exiting");
        return terminal(state, TerminationReason::NoActions, None);
    }

    // HIL gate: policy decision plus optional human approval.
    state.current_phase = WorkflowPhase::HilGate;
    let decision = PolicyEngine::new().decide(&plan_out.result.recommended_actions);
    state.approval_details = decision.details;

    match decision.approval {
        ApprovalStatus::AutoApproved => {
            state.approval = ApprovalStatus::AutoApproved;
            ctx.persist(&WorkflowResult::in_progress(state.clone())).await;
        }
        ApprovalStatus::Denied => {
            state.approval = ApprovalStatus::Denied;
            return terminal(state, TerminationReason::PolicyDenied, None);
        }
        _ => {
            let gate = ctx.register_approval_gate().await;
            state.approval = ApprovalStatus::Pending;
            ctx.persist(&WorkflowResult::in_progress(state.clone())).await;

            match ctx.wait_for_approval(gate, HIL_TIMEOUT).await {
                ApprovalStatus::Approved => {
                    state.approval = ApprovalStatus::Approved;
                    ctx.persist(&WorkflowResult::in_progress(state.clone())).await;
                }
                ApprovalStatus::Denied => {
                    state.approval = ApprovalStatus::Denied;
                    return terminal(state, TerminationReason::HumanDenied, None);
                }
                _ => {
                    state.approval = ApprovalStatus::TimedOut;
                    return terminal(state, TerminationReason::ApprovalTimedOut, None);
                }
            }
        }
    }

    // Executor: run approved actions. No retries for safety.
    state.current_phase = WorkflowPhase::Executor;
    ctx.persist(&WorkflowResult::in_progress(state.clone())).await;

    let exec_out = ctx
        .execute(
            "executor",
            ACTIVITY_TIMEOUT,
            ctx.activities().execute_actions(ExecuteActionsInput {
                tenant: input.tenant.clone(),
                approval: state.approval,
                actions: plan_out.result.recommended_actions.clone(),
            }),
        )
        .await;
    let exec_out = match exec_out {
        Ok(output) => output,
        Err(error) => {
            return terminal(
                state,
                TerminationReason::ExecutionError,
                Some(format!("execution failed: {error}")),
            );
        }
    };
    state.executions = exec_out.results;
    ctx.persist(&WorkflowResult::in_progress(state.clone())).await;

    // Verifier: check outcomes.
    state.current_phase = WorkflowPhase::Verifier;
    ctx.persist(&WorkflowResult::in_progress(state.clone())).await;

    let verify_out = ctx
        .execute(
            "verifier",
            ACTIVITY_TIMEOUT,
            ctx.activities().verify_outcome(VerifyOutcomeInput {
                tenant: input.tenant.clone(),
                service: anomaly.service.clone(),
                account_id: anomaly.account_id.clone(),
                window_start: input.window_start.clone(),
                window_end: input.window_end.clone(),
            }),
        )
        .await;
    let verify_out = match verify_out {
        Ok(output) => output,
        Err(error) => {
            return terminal(
                state,
                TerminationReason::VerifyError,
                Some(format!("verification failed: {error}")),
            );
        }
    };
    state.verification = Some(verify_out.result);
    state.current_phase = WorkflowPhase::Completed;
    state.should_terminate = true;
    tracing::info!(workflow_id = %ctx.workflow_id, "workflow completed");

    WorkflowResult::finished(state, TerminationReason::Completed)
}
