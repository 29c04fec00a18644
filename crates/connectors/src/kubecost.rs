//! HTTP client for the KubeCost allocation API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use finops_core::errors::ApplicationError;
use finops_core::triage::values::ValueMap;
use finops_core::triage::{FetchResult, KubeCostFetcher};

#[derive(Clone, Debug)]
pub struct KubeCostClient {
    endpoint: String,
    http: reqwest::Client,
}

impl KubeCostClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ApplicationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| ApplicationError::Configuration(format!("kubecost client: {err}")))?;
        Ok(Self { endpoint: endpoint.into(), http })
    }
}

#[async_trait]
impl KubeCostFetcher for KubeCostClient {
    async fn allocation(&self, window: &str, aggregate: &str) -> FetchResult<ValueMap> {
        let url = format!("{}/model/allocation", self.endpoint.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[("window", window), ("aggregate", aggregate)])
            .send()
            .await
            .map_err(|err| ApplicationError::Fetch(format!("kubecost: request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApplicationError::Fetch(format!(
                "kubecost: unexpected status {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| ApplicationError::Fetch(format!("kubecost: decode response: {err}")))?;
        match body {
            Value::Object(map) => Ok(map),
            other => Err(ApplicationError::Fetch(format!(
                "kubecost: expected JSON object, got {other}"
            ))),
        }
    }
}
