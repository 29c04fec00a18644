//! Runs the native triage/analysis/policy pipeline directly over fixture
//! fetchers, producing the same top-level JSON keys as the Python CLI's
//! `--json-output` so the two can be diffed phase by phase.

use std::path::PathBuf;

use serde_json::json;

use finops_connectors::{FixtureCost, FixtureInfra, FixtureKubeCost, FixtureWaste};
use finops_core::analysis;
use finops_core::domain::CostAnomaly;
use finops_core::policy::PolicyEngine;
use finops_core::triage::{self, KubeCostFetcher, WasteFetcher};

use crate::ShadowError;

pub struct NativeRunner {
    pub fixtures_dir: PathBuf,
}

impl NativeRunner {
    pub fn new(fixtures_dir: impl Into<PathBuf>) -> Self {
        Self { fixtures_dir: fixtures_dir.into() }
    }

    /// Executes the pipeline on the fixtures and returns
    /// `{"triage": {...}, "analysis": {...}, "approval": {...}}`.
    pub async fn run(&self, service: &str, delta: f64) -> Result<String, ShadowError> {
        let cost = FixtureCost::new(&self.fixtures_dir);
        let infra = FixtureInfra::new(&self.fixtures_dir);
        let kubecost = FixtureKubeCost::new(&self.fixtures_dir);
        let waste = FixtureWaste::new(&self.fixtures_dir);

        // Fixed identity and timestamps so repeated runs stay comparable.
        let anomaly = CostAnomaly {
            anomaly_id: "shadow-run".to_string(),
            detected_at: String::new(),
            service: service.to_string(),
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
            team: String::new(),
            expected_daily_cost: delta * 3.0,
            actual_daily_cost: delta * 3.0 + delta,
            delta_dollars: delta,
            delta_percent: 25.0,
            z_score: 0.0,
            lookback_days: 30,
        };

        let triage_result = triage::triage(
            &anomaly,
            &cost,
            &infra,
            Some(&kubecost as &dyn KubeCostFetcher),
            Some(&waste as &dyn WasteFetcher),
            "",
            "",
        )
        .await?;

        let analysis_result = analysis::analyze_and_recommend(
            &anomaly.account_id,
            &anomaly.service,
            "2026-02-01",
            "2026-02-16",
            &triage_result.evidence.waste_findings,
            &cost,
        )
        .await?;

        let decision = PolicyEngine::new().decide(&analysis_result.recommended_actions);

        let output = json!({
            "triage": triage_result,
            "analysis": analysis_result,
            "approval": {
                "status": decision.approval,
                "details": decision.details,
            },
        });

        serde_json::to_string_pretty(&output)
            .map_err(|err| ShadowError::Encode(err.to_string()))
    }
}
