//! Deterministic triage classifier.
//!
//! A priority-ordered sequence of evidence checks maps a cost anomaly to a
//! root-cause category with a fixed confidence. No LLM, no randomness: the
//! same anomaly and fetcher data always produce the same result.

pub mod values;

use async_trait::async_trait;

use crate::domain::{
    AnomalyCategory, AnomalySeverity, CostAnomaly, TriageEvidence, TriageResult, WasteFinding,
};
use crate::errors::ApplicationError;
use values::{ValueMap, get_f64, get_map, get_str, pct_change};

pub type FetchResult<T> = Result<T, ApplicationError>;

/// Cost data needed by the classifier, the planner, and the verifier.
#[async_trait]
pub trait CostFetcher: Send + Sync {
    async fn get_ri_coverage(&self, account_id: &str, start: &str, end: &str)
        -> FetchResult<ValueMap>;
    async fn get_sp_coverage(&self, account_id: &str, start: &str, end: &str)
        -> FetchResult<ValueMap>;
    async fn get_cur_line_items(
        &self,
        account_id: &str,
        start: &str,
        end: &str,
        service: &str,
    ) -> FetchResult<Vec<ValueMap>>;
    async fn get_cost_timeseries(
        &self,
        service: &str,
        account_id: &str,
        start: &str,
        end: &str,
    ) -> FetchResult<ValueMap>;
}

/// Infrastructure data needed by the classifier.
#[async_trait]
pub trait InfraFetcher: Send + Sync {
    async fn recent_deploys(&self, service: &str) -> FetchResult<Vec<ValueMap>>;
    async fn cloudwatch_metrics(
        &self,
        resource_id: &str,
        metric_name: &str,
        namespace: &str,
    ) -> FetchResult<ValueMap>;
}

/// KubeCost allocation data. Optional: tenants without a KubeCost endpoint
/// skip the namespace-shift check.
#[async_trait]
pub trait KubeCostFetcher: Send + Sync {
    async fn allocation(&self, window: &str, aggregate: &str) -> FetchResult<ValueMap>;
}

/// Waste-scan findings. Optional: the check is skipped when no scanner is
/// configured.
#[async_trait]
pub trait WasteFetcher: Send + Sync {
    async fn waste(
        &self,
        account_id: &str,
        region: &str,
        profile: &str,
    ) -> FetchResult<Vec<WasteFinding>>;
}

/// Maps an absolute daily dollar delta to a severity level.
pub fn severity_from_delta(delta_dollars_daily: f64) -> AnomalySeverity {
    let magnitude = delta_dollars_daily.abs();
    if magnitude >= 5000.0 {
        return AnomalySeverity::Critical;
    }
    if magnitude >= 1000.0 {
        return AnomalySeverity::High;
    }
    if magnitude >= 200.0 {
        return AnomalySeverity::Medium;
    }
    AnomalySeverity::Low
}

const DEFAULT_WINDOW_START: &str = "2026-02-01";
const DEFAULT_WINDOW_END: &str = "2026-02-16";

fn finish(
    category: AnomalyCategory,
    severity: AnomalySeverity,
    confidence: f64,
    summary: &str,
    evidence: TriageEvidence,
) -> TriageResult {
    TriageResult { category, severity, confidence, summary: summary.to_string(), evidence }
}

/// Classifies a cost anomaly using a priority-ordered sequence of
/// deterministic evidence checks.
///
/// Priority order (a contract; tests assert it):
///  1. RI/SP commitment coverage drift
///  2. Credits / refunds / fees
///  3. Resource waste (when a waste fetcher is configured)
///  4. Marketplace charges
///  5. Data transfer spike
///  6. KubeCost namespace allocation shift (when configured)
///  7. Deploy correlation
///  8. Expected growth (usage vs cost pct change)
///  9. Unknown (default)
#[allow(clippy::too_many_arguments)]
pub async fn triage(
    anomaly: &CostAnomaly,
    cost: &dyn CostFetcher,
    infra: &dyn InfraFetcher,
    kubecost: Option<&dyn KubeCostFetcher>,
    waste: Option<&dyn WasteFetcher>,
    window_start: &str,
    window_end: &str,
) -> Result<TriageResult, ApplicationError> {
    let window_start =
        if window_start.is_empty() { DEFAULT_WINDOW_START } else { window_start };
    let window_end = if window_end.is_empty() { DEFAULT_WINDOW_END } else { window_end };

    let mut ev = TriageEvidence::default();
    let severity = severity_from_delta(anomaly.delta_dollars);
    let threshold = 0.2 * anomaly.delta_dollars.max(1.0);

    // 1) Commitment coverage drift (RI / SP)
    let ri_cov = cost.get_ri_coverage(&anomaly.account_id, window_start, window_end).await?;
    let sp_cov = cost.get_sp_coverage(&anomaly.account_id, window_start, window_end).await?;

    let ri_delta = get_f64(&ri_cov, "coverage_delta", 0.0);
    let sp_delta = get_f64(&sp_cov, "coverage_delta", 0.0);
    ev.ri_coverage_delta = Some(ri_delta);
    ev.sp_coverage_delta = Some(sp_delta);

    if ri_delta.abs() >= 0.05 || sp_delta.abs() >= 0.05 {
        return Ok(finish(
            AnomalyCategory::CommitmentCoverageDrift,
            severity,
            0.80,
            "ri/sp coverage shifted materially; investigate commitment coverage/utilization",
            ev,
        ));
    }

    // 2) Credits / refunds / fees (CUR line-item types)
    let cur = cost
        .get_cur_line_items(&anomaly.account_id, window_start, window_end, &anomaly.service)
        .await?;

    let mut credits = 0.0;
    let mut refunds = 0.0;
    let mut fees = 0.0;
    for item in &cur {
        let line_type = get_str(item, "line_item_line_item_type", "").to_ascii_lowercase();
        let amount = get_f64(item, "unblended_cost", 0.0);
        match line_type.as_str() {
            "credit" => credits += amount,
            "refund" => refunds += amount,
            "fee" | "rifee" => fees += amount,
            _ => {}
        }
    }
    ev.credits_delta = Some(credits);
    ev.refunds_delta = Some(refunds);
    ev.fees_delta = Some(fees);

    if credits.abs() >= threshold || refunds.abs() >= threshold {
        return Ok(finish(
            AnomalyCategory::CreditsRefundsFees,
            severity,
            0.75,
            "net spend change driven by credits/refunds/fees movement (not usage)",
            ev,
        ));
    }

    // 3) Resource waste (optional scanner)
    if let Some(waste) = waste {
        let findings =
            waste.waste(&anomaly.account_id, &anomaly.region, "").await?;
        let total: f64 = findings.iter().map(|f| f.estimated_monthly_savings).sum();
        // Findings stay in evidence even below the firing threshold.
        ev.waste_findings = findings;
        ev.waste_savings = Some(total);

        if total >= threshold {
            return Ok(finish(
                AnomalyCategory::ResourceWaste,
                severity,
                0.85,
                "idle-resource waste findings account for the spend delta",
                ev,
            ));
        }
    }

    // 4) Marketplace charges
    let mut marketplace = 0.0;
    for item in &cur {
        let product_name = get_str(item, "product_product_name", "").to_ascii_lowercase();
        let product_code = get_str(item, "line_item_product_code", "").to_ascii_lowercase();
        if product_name.contains("marketplace") || product_code.contains("aws marketplace") {
            marketplace += get_f64(item, "unblended_cost", 0.0);
        }
    }
    ev.marketplace_delta = Some(marketplace);

    if marketplace >= threshold {
        return Ok(finish(
            AnomalyCategory::Marketplace,
            severity,
            0.80,
            "spend appears dominated by marketplace charges (subscription/usage)",
            ev,
        ));
    }

    // 5) Data transfer spike
    let mut data_transfer = 0.0;
    for item in &cur {
        let usage_type = get_str(item, "line_item_usage_type", "").to_ascii_lowercase();
        if usage_type.contains("datatransfer") {
            data_transfer += get_f64(item, "unblended_cost", 0.0);
        }
    }
    ev.data_transfer_delta = Some(data_transfer);

    if data_transfer >= threshold {
        return Ok(finish(
            AnomalyCategory::DataTransfer,
            severity,
            0.85,
            "spike primarily in data transfer usage types",
            ev,
        ));
    }

    // 6) KubeCost namespace allocation shift (optional)
    if let Some(kubecost) = kubecost {
        let alloc = kubecost.allocation("24h", "namespace").await?;

        let mut max_delta = 0.0_f64;
        if let Some(allocations) = get_map(&alloc, "allocations") {
            for (namespace, raw) in allocations {
                let Some(ns_map) = raw.as_object() else { continue };
                if !ns_map.contains_key("delta") {
                    continue;
                }
                let delta = get_f64(ns_map, "delta", 0.0);
                ev.k8s_namespace_deltas.insert(namespace.clone(), delta);
                if delta > max_delta {
                    max_delta = delta;
                }
            }
        }

        if !ev.k8s_namespace_deltas.is_empty() && max_delta >= threshold {
            return Ok(finish(
                AnomalyCategory::K8sCostShift,
                severity,
                0.70,
                "k8s namespace allocation shifted materially (kubecost)",
                ev,
            ));
        }
    }

    // 7) Deploy correlation
    let deploys = infra.recent_deploys(&anomaly.service).await?;
    if !deploys.is_empty() {
        ev.deploy_correlation =
            deploys.iter().map(|d| get_str(d, "id", "deploy").to_string()).collect();
        return Ok(finish(
            AnomalyCategory::DeployRelated,
            severity,
            0.70,
            "recent deploys detected near anomaly window",
            ev,
        ));
    }

    // 8) Expected growth (usage pct vs cost pct)
    let metrics = infra.cloudwatch_metrics(&anomaly.service, "Requests", "Service").await?;
    let baseline = get_f64(&metrics, "baseline", 0.0);
    let current = get_f64(&metrics, "current", 0.0);
    let usage_pct = pct_change(current, baseline);
    let cost_pct = anomaly.delta_percent / 100.0;

    if baseline > 0.0 && usage_pct > 0.0 && (usage_pct - cost_pct).abs() <= 0.15 {
        ev.usage_correlation =
            vec![format!("usage pct ~{usage_pct:.2} vs cost pct ~{cost_pct:.2}")];
        return Ok(finish(
            AnomalyCategory::ExpectedGrowth,
            severity,
            0.80,
            "usage increase roughly explains cost increase",
            ev,
        ));
    }

    // 9) Unknown (default)
    Ok(finish(
        AnomalyCategory::Unknown,
        severity,
        0.40,
        "no strong deterministic signal; requires deeper analysis",
        ev,
    ))
}

pub mod testing {
    //! In-memory fetcher stubs shared by classifier, workflow, and server
    //! tests across the workspace.

    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::{
        CostFetcher, FetchResult, InfraFetcher, KubeCostFetcher, ValueMap, WasteFetcher,
    };
    use crate::domain::WasteFinding;
    use crate::errors::ApplicationError;

    fn object(value: Value) -> ValueMap {
        value.as_object().expect("fixture must be a JSON object").clone()
    }

    #[derive(Clone, Debug, Default)]
    pub struct StubCost {
        pub ri_coverage_delta: f64,
        pub sp_coverage_delta: f64,
        pub cur_line_items: Vec<Value>,
        pub observed_savings_daily: f64,
        pub fail_with: Option<String>,
    }

    #[async_trait]
    impl CostFetcher for StubCost {
        async fn get_ri_coverage(&self, _: &str, _: &str, _: &str) -> FetchResult<ValueMap> {
            if let Some(message) = &self.fail_with {
                return Err(ApplicationError::Fetch(message.clone()));
            }
            Ok(object(json!({ "coverage_delta": self.ri_coverage_delta })))
        }

        async fn get_sp_coverage(&self, _: &str, _: &str, _: &str) -> FetchResult<ValueMap> {
            Ok(object(json!({ "coverage_delta": self.sp_coverage_delta })))
        }

        async fn get_cur_line_items(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &str,
        ) -> FetchResult<Vec<ValueMap>> {
            if let Some(message) = &self.fail_with {
                return Err(ApplicationError::Fetch(message.clone()));
            }
            Ok(self.cur_line_items.iter().cloned().map(object).collect())
        }

        async fn get_cost_timeseries(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &str,
        ) -> FetchResult<ValueMap> {
            if let Some(message) = &self.fail_with {
                return Err(ApplicationError::Fetch(message.clone()));
            }
            Ok(object(json!({ "observed_savings_daily": self.observed_savings_daily })))
        }
    }

    #[derive(Clone, Debug, Default)]
    pub struct StubInfra {
        pub deploys: Vec<Value>,
        pub metrics_baseline: f64,
        pub metrics_current: f64,
        pub tags: BTreeMap<String, BTreeMap<String, String>>,
    }

    #[async_trait]
    impl InfraFetcher for StubInfra {
        async fn recent_deploys(&self, _: &str) -> FetchResult<Vec<ValueMap>> {
            Ok(self.deploys.iter().cloned().map(object).collect())
        }

        async fn cloudwatch_metrics(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> FetchResult<ValueMap> {
            Ok(object(json!({
                "baseline": self.metrics_baseline,
                "current": self.metrics_current,
            })))
        }
    }

    #[async_trait]
    impl crate::executor::TagFetcher for StubInfra {
        async fn resource_tags(&self, arn: &str) -> FetchResult<BTreeMap<String, String>> {
            Ok(self.tags.get(arn).cloned().unwrap_or_default())
        }
    }

    #[derive(Clone, Debug, Default)]
    pub struct StubKubeCost {
        pub namespace_deltas: BTreeMap<String, f64>,
    }

    #[async_trait]
    impl KubeCostFetcher for StubKubeCost {
        async fn allocation(&self, _: &str, _: &str) -> FetchResult<ValueMap> {
            let allocations: serde_json::Map<String, Value> = self
                .namespace_deltas
                .iter()
                .map(|(ns, delta)| (ns.clone(), json!({ "delta": delta })))
                .collect();
            Ok(object(json!({ "allocations": allocations })))
        }
    }

    #[derive(Clone, Debug, Default)]
    pub struct StubWaste {
        pub findings: Vec<WasteFinding>,
        pub fail_with: Option<String>,
    }

    #[async_trait]
    impl WasteFetcher for StubWaste {
        async fn waste(&self, _: &str, _: &str, _: &str) -> FetchResult<Vec<WasteFinding>> {
            if let Some(message) = &self.fail_with {
                return Err(ApplicationError::Fetch(message.clone()));
            }
            Ok(self.findings.clone())
        }
    }
}
