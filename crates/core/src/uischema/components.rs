use serde_json::{Map, Value, json};

use super::{Component, ComponentType, Visibility};
use crate::domain::{
    AnalysisResult, AnomalyCategory, ExecutionResult, FinOpsState, TriageResult,
    VerificationResult,
};

fn component(
    component_type: ComponentType,
    title: &str,
    priority: i32,
    data: Map<String, Value>,
) -> Component {
    Component {
        component_type,
        title: title.to_string(),
        priority,
        visibility: Visibility::Visible,
        data,
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// The always-present anomaly overview. Callers ensure `anomaly` is set.
pub fn anomaly_summary(state: &FinOpsState) -> Option<Component> {
    let anomaly = state.anomaly.as_ref()?;
    Some(component(
        ComponentType::AnomalySummary,
        "Anomaly Summary",
        0,
        object(json!({
            "service": anomaly.service,
            "account_id": anomaly.account_id,
            "delta_dollars": anomaly.delta_dollars,
            "delta_percent": anomaly.delta_percent,
            "detected_at": anomaly.detected_at,
        })),
    ))
}

pub fn triage_card(triage: &TriageResult) -> Component {
    component(
        ComponentType::TriageCard,
        "Triage Classification",
        10,
        object(json!({
            "category": triage.category.as_str(),
            "severity": triage.severity.as_str(),
            "confidence": triage.confidence,
            "summary": triage.summary,
        })),
    )
}

/// Category-specific evidence component; unknown categories fall back to
/// the generic evidence panel.
pub fn category_evidence(triage: &TriageResult) -> Component {
    match triage.category {
        AnomalyCategory::CommitmentCoverageDrift => commitment_drift(triage),
        AnomalyCategory::CreditsRefundsFees => {
            credit_breakdown(triage, "Credits / Refunds / Fees")
        }
        AnomalyCategory::Marketplace => credit_breakdown(triage, "Marketplace Charges"),
        AnomalyCategory::K8sCostShift => k8s_namespace_deltas(triage),
        AnomalyCategory::DeployRelated => deploy_correlation(triage),
        AnomalyCategory::DataTransfer => data_transfer_spike(triage),
        AnomalyCategory::ResourceWaste => waste_findings(triage),
        AnomalyCategory::ExpectedGrowth => cost_timeseries(triage),
        _ => evidence_panel(triage),
    }
}

fn commitment_drift(triage: &TriageResult) -> Component {
    let mut data = object(json!({ "category": triage.category.as_str() }));
    if let Some(delta) = triage.evidence.ri_coverage_delta {
        data.insert("ri_coverage_delta".to_string(), json!(delta));
    }
    if let Some(delta) = triage.evidence.sp_coverage_delta {
        data.insert("sp_coverage_delta".to_string(), json!(delta));
    }
    component(ComponentType::CommitmentDrift, "Commitment Coverage Drift", 20, data)
}

fn credit_breakdown(triage: &TriageResult, title: &str) -> Component {
    let mut data = object(json!({ "category": triage.category.as_str() }));
    if let Some(delta) = triage.evidence.credits_delta {
        data.insert("credits_delta".to_string(), json!(delta));
    }
    if let Some(delta) = triage.evidence.refunds_delta {
        data.insert("refunds_delta".to_string(), json!(delta));
    }
    if let Some(delta) = triage.evidence.fees_delta {
        data.insert("fees_delta".to_string(), json!(delta));
    }
    if let Some(delta) = triage.evidence.marketplace_delta {
        data.insert("marketplace_delta".to_string(), json!(delta));
    }
    component(ComponentType::CreditBreakdown, title, 20, data)
}

fn k8s_namespace_deltas(triage: &TriageResult) -> Component {
    component(
        ComponentType::K8sNamespaceDeltas,
        "Kubernetes Namespace Cost Deltas",
        20,
        object(json!({
            "category": triage.category.as_str(),
            "namespace_deltas": triage.evidence.k8s_namespace_deltas,
        })),
    )
}

fn deploy_correlation(triage: &TriageResult) -> Component {
    component(
        ComponentType::DeployCorrelation,
        "Deploy Correlation",
        20,
        object(json!({
            "category": triage.category.as_str(),
            "deploy_correlation": triage.evidence.deploy_correlation,
        })),
    )
}

fn data_transfer_spike(triage: &TriageResult) -> Component {
    let mut data = object(json!({ "category": triage.category.as_str() }));
    if let Some(delta) = triage.evidence.data_transfer_delta {
        data.insert("data_transfer_delta".to_string(), json!(delta));
    }
    component(ComponentType::DataTransferSpike, "Data Transfer Spike", 20, data)
}

fn waste_findings(triage: &TriageResult) -> Component {
    let findings: Vec<Value> = triage
        .evidence
        .waste_findings
        .iter()
        .map(|f| {
            json!({
                "resource_type": f.resource_type,
                "resource_id": f.resource_id,
                "reason": f.reason,
                "estimated_monthly_savings": f.estimated_monthly_savings,
            })
        })
        .collect();
    component(
        ComponentType::WasteFindings,
        "Resource Waste Findings",
        20,
        object(json!({
            "category": triage.category.as_str(),
            "findings": findings,
            "total_savings": triage.evidence.waste_savings,
        })),
    )
}

fn cost_timeseries(triage: &TriageResult) -> Component {
    component(
        ComponentType::CostTimeseries,
        "Cost vs Usage Overlay",
        20,
        object(json!({
            "category": triage.category.as_str(),
            "usage_correlation": triage.evidence.usage_correlation,
        })),
    )
}

fn evidence_panel(triage: &TriageResult) -> Component {
    component(
        ComponentType::EvidencePanel,
        "Evidence",
        20,
        object(json!({
            "category": triage.category.as_str(),
            "deploy_correlation": triage.evidence.deploy_correlation,
            "usage_correlation": triage.evidence.usage_correlation,
            "infra_correlation": triage.evidence.infra_correlation,
        })),
    )
}

pub fn action_plan(analysis: &AnalysisResult) -> Component {
    let actions: Vec<Value> = analysis
        .recommended_actions
        .iter()
        .map(|a| {
            json!({
                "action_id": a.action_id,
                "description": a.description,
                "action_type": a.action_type,
                "risk_level": a.risk_level.as_str(),
                "savings": a.estimated_savings_monthly,
            })
        })
        .collect();
    component(
        ComponentType::ActionPlan,
        "Action Plan",
        30,
        object(json!({
            "root_cause": analysis.root_cause_narrative,
            "actions": actions,
            "estimated_savings": analysis.estimated_monthly_savings,
            "affected_resources": analysis.affected_resources,
        })),
    )
}

/// One editor per recommended action so operators can adjust parameters
/// before approving.
pub fn action_editors(analysis: &AnalysisResult) -> Vec<Component> {
    analysis
        .recommended_actions
        .iter()
        .enumerate()
        .map(|(i, a)| {
            component(
                ComponentType::ActionEditor,
                &a.description,
                35 + i as i32,
                object(json!({
                    "action_id": a.action_id,
                    "action_type": a.action_type,
                    "risk_level": a.risk_level.as_str(),
                    "parameters": a.parameters,
                    "rollback_procedure": a.rollback_procedure,
                    "target_resource": a.target_resource,
                })),
            )
        })
        .collect()
}

pub fn approval_queue(state: &FinOpsState) -> Component {
    component(
        ComponentType::ApprovalQueue,
        "Approval Required",
        40,
        object(json!({
            "approval_status": state.approval.as_str(),
            "approval_details": state.approval_details,
        })),
    )
}

pub fn execution_results(executions: &[ExecutionResult]) -> Component {
    let results: Vec<Value> = executions
        .iter()
        .map(|e| {
            json!({
                "action_id": e.action_id,
                "success": e.success,
                "details": e.details,
                "executed_at": e.executed_at,
                "rollback": e.rollback_available,
            })
        })
        .collect();
    component(
        ComponentType::ExecutionResults,
        "Execution Results",
        50,
        object(json!({ "results": results })),
    )
}

pub fn verification_dashboard(verification: &VerificationResult) -> Component {
    component(
        ComponentType::VerificationDashboard,
        "Verification",
        60,
        object(json!({
            "cost_reduction_observed": verification.cost_reduction_observed,
            "observed_savings_daily": verification.observed_savings_daily,
            "service_health_ok": verification.service_health_ok,
            "health_check_details": verification.health_check_details,
            "recommendation": verification.recommendation.as_str(),
        })),
    )
}
