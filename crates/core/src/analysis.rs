//! Template-driven action planner.
//!
//! Deterministic by design: actions come from fixed per-waste-type templates
//! plus a budget-alert recurrence guard. Narrative text may later be
//! enriched by an LLM, but planned actions always pass through the policy
//! engine unchanged.

use serde_json::json;

use crate::domain::{ActionRiskLevel, AnalysisResult, RecommendedAction, WasteFinding};
use crate::errors::ApplicationError;
use crate::triage::CostFetcher;

/// Reviews CUR line items for the service and window, then returns a
/// root-cause narrative and recommended actions. One templated action per
/// waste finding, plus a low-risk budget alert to catch recurrence.
pub async fn analyze_and_recommend(
    account_id: &str,
    service: &str,
    window_start: &str,
    window_end: &str,
    waste_findings: &[WasteFinding],
    cost: &dyn CostFetcher,
) -> Result<AnalysisResult, ApplicationError> {
    cost.get_cur_line_items(account_id, window_start, window_end, service).await?;

    let narrative = format!(
        "cur line items reviewed for {service} {window_start}..{window_end}; further attribution required"
    );

    let mut actions = Vec::new();
    let mut affected = Vec::new();
    let mut estimated_savings = 0.0;

    for finding in waste_findings {
        let Some(mut action) = action_for_waste(finding) else { continue };
        action.estimated_savings_monthly = finding.estimated_monthly_savings;
        estimated_savings += finding.estimated_monthly_savings;
        affected.push(finding.resource_arn.clone());
        actions.push(action);
    }

    let mut alert = RecommendedAction::new(
        format!("create/update budget alert for {service} to catch recurrence"),
        "create_budget_alert",
        ActionRiskLevel::Low,
        "disable alert / delete budget rule",
    );
    alert.target_resource = format!("budget:{service}:{account_id}");
    alert.parameters.insert("amount".to_string(), json!(0.0));
    alert.parameters.insert("threshold_percent".to_string(), json!(20.0));
    actions.push(alert);

    let confidence = if waste_findings.is_empty() { 0.4 } else { 0.7 };

    Ok(AnalysisResult {
        root_cause_narrative: narrative,
        affected_resources: affected,
        recommended_actions: actions,
        estimated_monthly_savings: estimated_savings,
        confidence,
    })
}

/// One remediation template per waste resource type. Findings with no
/// matching template produce no action (the budget alert still covers them).
fn action_for_waste(finding: &WasteFinding) -> Option<RecommendedAction> {
    let (description, action_type, risk, rollback) = match finding.resource_type.as_str() {
        "EBS" => (
            format!("delete unattached EBS volume {}", finding.resource_id),
            "delete_unused_volume",
            ActionRiskLevel::LowMedium,
            "restore volume from final snapshot",
        ),
        "ElasticIP" => (
            format!("release unassociated Elastic IP {}", finding.resource_id),
            "release_elastic_ip",
            ActionRiskLevel::Low,
            "allocate a replacement address and update DNS",
        ),
        "Snapshot" => (
            format!("delete orphaned snapshot {}", finding.resource_id),
            "delete_snapshot",
            ActionRiskLevel::LowMedium,
            "snapshots are unrecoverable; copy to archive tier before delete",
        ),
        "EC2" => (
            format!("terminate long-stopped instance {}", finding.resource_id),
            "stop_instance_cleanup",
            ActionRiskLevel::Medium,
            "relaunch from AMI captured before termination",
        ),
        _ => return None,
    };

    let mut action = RecommendedAction::new(description, action_type, risk, rollback);
    action.target_resource = finding.resource_arn.clone();
    action.parameters.insert("region".to_string(), json!(finding.region));
    action.parameters.insert("reason".to_string(), json!(finding.reason));
    Some(action)
}
