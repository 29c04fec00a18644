//! Fixture-backed stub fetchers for stub mode. Each fetcher reads a named
//! JSON document from the fixtures directory on every call; the on-disk
//! layout mirrors what the real connectors return, so workflow behavior is
//! identical across modes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use finops_core::domain::WasteFinding;
use finops_core::errors::ApplicationError;
use finops_core::executor::TagFetcher;
use finops_core::triage::values::ValueMap;
use finops_core::triage::{CostFetcher, FetchResult, InfraFetcher, KubeCostFetcher, WasteFetcher};

use crate::awsdoctor::{WasteReport, map_waste_findings};

async fn load<T: DeserializeOwned>(dir: &Path, name: &str) -> FetchResult<T> {
    let path = dir.join(name);
    let raw = tokio::fs::read(&path)
        .await
        .map_err(|err| ApplicationError::Fetch(format!("read fixture {}: {err}", path.display())))?;
    serde_json::from_slice(&raw)
        .map_err(|err| ApplicationError::Fetch(format!("parse fixture {}: {err}", path.display())))
}

#[derive(Clone, Debug)]
pub struct FixtureCost {
    fixtures_dir: PathBuf,
}

impl FixtureCost {
    pub fn new(fixtures_dir: impl Into<PathBuf>) -> Self {
        Self { fixtures_dir: fixtures_dir.into() }
    }
}

#[async_trait]
impl CostFetcher for FixtureCost {
    async fn get_ri_coverage(&self, _: &str, _: &str, _: &str) -> FetchResult<ValueMap> {
        load(&self.fixtures_dir, "ri_coverage.json").await
    }

    async fn get_sp_coverage(&self, _: &str, _: &str, _: &str) -> FetchResult<ValueMap> {
        load(&self.fixtures_dir, "sp_coverage.json").await
    }

    async fn get_cur_line_items(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
    ) -> FetchResult<Vec<ValueMap>> {
        load(&self.fixtures_dir, "cur_line_items.json").await
    }

    async fn get_cost_timeseries(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
    ) -> FetchResult<ValueMap> {
        load(&self.fixtures_dir, "cost_timeseries.json").await
    }
}

#[derive(Clone, Debug)]
pub struct FixtureInfra {
    fixtures_dir: PathBuf,
}

impl FixtureInfra {
    pub fn new(fixtures_dir: impl Into<PathBuf>) -> Self {
        Self { fixtures_dir: fixtures_dir.into() }
    }
}

#[async_trait]
impl InfraFetcher for FixtureInfra {
    async fn recent_deploys(&self, _: &str) -> FetchResult<Vec<ValueMap>> {
        load(&self.fixtures_dir, "deploys.json").await
    }

    async fn cloudwatch_metrics(&self, _: &str, _: &str, _: &str) -> FetchResult<ValueMap> {
        load(&self.fixtures_dir, "cloudwatch_metrics.json").await
    }
}

#[async_trait]
impl TagFetcher for FixtureInfra {
    async fn resource_tags(&self, arn: &str) -> FetchResult<BTreeMap<String, String>> {
        // The fixture maps ARN -> tag map; unknown resources have no tags.
        let all: BTreeMap<String, BTreeMap<String, String>> =
            load(&self.fixtures_dir, "resource_tags.json").await?;
        Ok(all.get(arn).cloned().unwrap_or_default())
    }
}

#[derive(Clone, Debug)]
pub struct FixtureKubeCost {
    fixtures_dir: PathBuf,
}

impl FixtureKubeCost {
    pub fn new(fixtures_dir: impl Into<PathBuf>) -> Self {
        Self { fixtures_dir: fixtures_dir.into() }
    }
}

#[async_trait]
impl KubeCostFetcher for FixtureKubeCost {
    async fn allocation(&self, _: &str, _: &str) -> FetchResult<ValueMap> {
        load(&self.fixtures_dir, "kubecost_allocation.json").await
    }
}

/// Waste scanner stub: loads the scanner's native report format and maps it
/// to domain findings, exactly as the subprocess runner does.
#[derive(Clone, Debug)]
pub struct FixtureWaste {
    fixtures_dir: PathBuf,
}

impl FixtureWaste {
    pub fn new(fixtures_dir: impl Into<PathBuf>) -> Self {
        Self { fixtures_dir: fixtures_dir.into() }
    }
}

#[async_trait]
impl WasteFetcher for FixtureWaste {
    async fn waste(
        &self,
        account_id: &str,
        region: &str,
        _profile: &str,
    ) -> FetchResult<Vec<WasteFinding>> {
        let report: WasteReport = load(&self.fixtures_dir, "waste_report.json").await?;
        let account = if report.account_id.is_empty() { account_id } else { &report.account_id };
        Ok(map_waste_findings(&report, account, region))
    }
}
