//! HTTP-backed [`WorkflowQuerier`]: the MCP server runs as a sidecar to the
//! finops API process and reads workflow state through the same versioned
//! routes operators use.

use async_trait::async_trait;
use serde_json::Value;

use finops_engine::activities::ApprovalResponse;
use finops_engine::lifecycle::WorkflowResult;
use finops_engine::querier::{ListOptions, QueryError, WorkflowQuerier};
use finops_engine::store::WorkflowSummary;

pub struct HttpQuerier {
    base_url: String,
    http: reqwest::Client,
}

impl HttpQuerier {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self { base_url: base_url.trim_end_matches('/').to_string(), http: reqwest::Client::new() }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, QueryError> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|err| QueryError::Internal(format!("invalid response body: {err}")))?;

        if !status.is_success() {
            let detail = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            return Err(QueryError::Internal(format!("{status}: {detail}")));
        }
        serde_json::from_value(body)
            .map_err(|err| QueryError::Internal(format!("decode response: {err}")))
    }
}

#[async_trait]
impl WorkflowQuerier for HttpQuerier {
    async fn list_workflows(&self, opts: ListOptions) -> Result<Vec<WorkflowSummary>, QueryError> {
        let response = self
            .http
            .get(format!("{}/api/v1/workflows", self.base_url))
            .query(&[("status", opts.status_filter.as_str())])
            .send()
            .await
            .map_err(|err| QueryError::Internal(format!("list workflows: {err}")))?;
        Self::decode(response).await
    }

    async fn get_workflow_state(&self, workflow_id: &str) -> Result<WorkflowResult, QueryError> {
        let response = self
            .http
            .get(format!("{}/api/v1/workflows/{workflow_id}", self.base_url))
            .send()
            .await
            .map_err(|err| QueryError::Internal(format!("get workflow state: {err}")))?;
        Self::decode(response).await
    }

    async fn submit_approval(
        &self,
        workflow_id: &str,
        response: ApprovalResponse,
    ) -> Result<String, QueryError> {
        let verb = if response.approved { "approve" } else { "deny" };
        let reply = self
            .http
            .post(format!("{}/api/v1/workflows/{workflow_id}/{verb}", self.base_url))
            .json(&serde_json::json!({ "by": response.by, "reason": response.reason }))
            .send()
            .await
            .map_err(|err| QueryError::Internal(format!("submit approval: {err}")))?;

        let body: Value = Self::decode(reply).await?;
        body.get("result")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| QueryError::Internal("approval response missing result".to_string()))
    }
}
