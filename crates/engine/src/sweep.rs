//! Waste sweep workflow: scans accounts with the waste scanner and spawns a
//! child anomaly lifecycle for every account with enough recoverable spend.
//! Scan failures and child failures are counted, never fatal: one bad
//! account must not starve the rest of the fleet.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use finops_core::domain::{CostAnomaly, TenantContext};

use crate::activities::WasteScanInput;
use crate::lifecycle::WorkflowInput;
use crate::runtime::WorkflowCtx;

/// Monthly savings (dollars) above which a scan spawns a child lifecycle.
pub const WASTE_SAVINGS_THRESHOLD: f64 = 100.0;

/// Waste scans shell out to an external binary; give them room.
pub const SWEEP_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepAccount {
    pub account_id: String,
    pub region: String,
    #[serde(default)]
    pub profile: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepInput {
    pub accounts: Vec<SweepAccount>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResult {
    pub accounts_scanned: u32,
    pub waste_anomalies: u32,
    pub child_workflows_run: u32,
    pub scan_errors: u32,
}

/// Runs waste scans across the configured accounts. For each account whose
/// total savings clear the threshold, synthesizes a [`CostAnomaly`] and
/// starts a child lifecycle workflow with the deterministic ID
/// `waste-{account}-{anomaly_id}`.
pub async fn awsdoc_sweep(ctx: &WorkflowCtx, input: SweepInput) -> SweepResult {
    let mut result = SweepResult::default();

    for account in &input.accounts {
        result.accounts_scanned += 1;

        let scan = ctx
            .execute(
                &format!("waste-scan-{}", account.account_id),
                SWEEP_ACTIVITY_TIMEOUT,
                ctx.activities().run_waste_scan(WasteScanInput {
                    account_id: account.account_id.clone(),
                    region: account.region.clone(),
                    profile: account.profile.clone(),
                }),
            )
            .await;
        let scan = match scan {
            Ok(output) => output,
            Err(error) => {
                tracing::warn!(
                    account = %account.account_id,
                    %error,
                    "waste scan failed, continuing sweep"
                );
                result.scan_errors += 1;
                continue;
            }
        };

        tracing::info!(
            account = %account.account_id,
            findings = scan.findings.len(),
            total_savings = scan.total_savings,
            "waste scan complete"
        );

        if scan.total_savings < WASTE_SAVINGS_THRESHOLD {
            continue;
        }
        result.waste_anomalies += 1;

        // Waste is absolute, not relative, so delta_percent stays zero.
        let mut anomaly = CostAnomaly::new();
        anomaly.service = "MultiService".to_string();
        anomaly.account_id = account.account_id.clone();
        anomaly.region = account.region.clone();
        anomaly.delta_dollars = scan.total_savings;
        anomaly.delta_percent = 0.0;

        let child_id = format!("waste-{}-{}", account.account_id, anomaly.anomaly_id);
        let child = ctx
            .start_child_lifecycle(
                child_id.clone(),
                WorkflowInput {
                    tenant: TenantContext::new(account.account_id.clone()),
                    anomaly: Some(anomaly),
                    window_start: String::new(),
                    window_end: String::new(),
                },
            )
            .await;
        let done = match child {
            Ok(done) => done,
            Err(error) => {
                tracing::warn!(account = %account.account_id, %error, "child workflow start failed");
                continue;
            }
        };

        match done.await {
            Ok(child_result) => {
                result.child_workflows_run += 1;
                tracing::info!(
                    account = %account.account_id,
                    child_workflow = %child_id,
                    reason = ?child_result.reason,
                    "child workflow completed"
                );
            }
            Err(_) => {
                tracing::warn!(account = %account.account_id, "child workflow failed");
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::watch;

    use finops_core::domain::WasteFinding;
    use finops_core::ratelimit::ServiceLimiter;
    use finops_core::triage::testing::{StubCost, StubInfra, StubWaste};

    use super::{SweepAccount, SweepInput, SweepResult};
    use crate::activities::Activities;
    use crate::queues::{QUEUE_ANOMALY, parse_queues};
    use crate::runtime::WorkflowRuntime;
    use crate::worker::WorkerPool;

    fn runtime_with_waste(
        waste: Option<StubWaste>,
    ) -> (Arc<WorkflowRuntime>, watch::Sender<bool>) {
        let activities = Activities {
            cost: Arc::new(StubCost::default()),
            infra: Arc::new(StubInfra::default()),
            kubecost: None,
            waste: waste.map(|w| Arc::new(w) as _),
            tenants: None,
            limiter: Arc::new(ServiceLimiter::default()),
            budget: None,
        };
        let selected = parse_queues("anomaly").expect("parse");
        let pool = Arc::new(WorkerPool::new(&selected).expect("pool"));
        let (tx, rx) = watch::channel(false);
        (WorkflowRuntime::new(Arc::new(activities), pool, rx), tx)
    }

    fn finding(savings: f64) -> WasteFinding {
        WasteFinding {
            resource_type: "EBS".to_string(),
            resource_id: "vol-1".to_string(),
            resource_arn: "arn:aws:ec2:us-east-1:123456789012:volume/vol-1".to_string(),
            reason: "unattached EBS volume".to_string(),
            estimated_monthly_savings: savings,
            region: "us-east-1".to_string(),
        }
    }

    fn account(id: &str) -> SweepAccount {
        SweepAccount {
            account_id: id.to_string(),
            region: "us-east-1".to_string(),
            profile: String::new(),
        }
    }

    async fn run_sweep(runtime: &Arc<WorkflowRuntime>, input: SweepInput) -> SweepResult {
        runtime
            .start_sweep(QUEUE_ANOMALY, "sweep-test".to_string(), input)
            .await
            .expect("sweep should start")
            .done
            .await
            .expect("sweep result")
    }

    // Savings above the threshold spawn exactly one child workflow with a
    // deterministic waste- ID.
    #[tokio::test]
    async fn savings_above_threshold_spawn_child() {
        let waste =
            StubWaste { findings: vec![finding(150.0)], ..StubWaste::default() };
        let (runtime, _tx) = runtime_with_waste(Some(waste));

        let result =
            run_sweep(&runtime, SweepInput { accounts: vec![account("123456789012")] }).await;

        assert_eq!(
            result,
            SweepResult {
                accounts_scanned: 1,
                waste_anomalies: 1,
                child_workflows_run: 1,
                scan_errors: 0,
            }
        );

        // Exactly one child with the waste- ID prefix was registered.
        let children: Vec<_> = runtime
            .store
            .list(QUEUE_ANOMALY, "")
            .await
            .into_iter()
            .filter(|summary| summary.workflow_id.starts_with("waste-123456789012-"))
            .collect();
        assert_eq!(children.len(), 1);
    }

    #[tokio::test]
    async fn savings_below_threshold_do_not_spawn() {
        let waste = StubWaste { findings: vec![finding(99.0)], ..StubWaste::default() };
        let (runtime, _tx) = runtime_with_waste(Some(waste));

        let result =
            run_sweep(&runtime, SweepInput { accounts: vec![account("123456789012")] }).await;

        assert_eq!(result.accounts_scanned, 1);
        assert_eq!(result.waste_anomalies, 0);
        assert_eq!(result.child_workflows_run, 0);
    }

    #[tokio::test]
    async fn scan_errors_are_counted_and_sweep_continues() {
        // Scanner unconfigured: every scan fails, none abort the sweep.
        let (runtime, _tx) = runtime_with_waste(None);

        let result = run_sweep(
            &runtime,
            SweepInput {
                accounts: vec![account("111111111111"), account("222222222222")],
            },
        )
        .await;

        assert_eq!(
            result,
            SweepResult {
                accounts_scanned: 2,
                waste_anomalies: 0,
                child_workflows_run: 0,
                scan_errors: 2,
            }
        );
    }

    #[tokio::test]
    async fn empty_account_list_is_a_noop() {
        let (runtime, _tx) = runtime_with_waste(None);
        let result = run_sweep(&runtime, SweepInput { accounts: vec![] }).await;
        assert_eq!(result, SweepResult::default());
    }
}
