//! Read-side interface over workflow state: listings, state queries, and
//! approval submission. The server depends on the trait so tests can stand
//! in a fake without a running runtime.

use async_trait::async_trait;
use thiserror::Error;

use crate::activities::ApprovalResponse;
use crate::lifecycle::WorkflowResult;
use crate::queues::QUEUE_ANOMALY;
use crate::store::{StoreError, UpdateRejected, WorkflowStore, WorkflowSummary};

#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    pub task_queue: String,
    pub status_filter: String,
}

impl ListOptions {
    pub fn anomaly_queue() -> Self {
        Self { task_queue: QUEUE_ANOMALY.to_string(), status_filter: String::new() }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("workflow {0} not found")]
    NotFound(String),
    #[error("workflow {0} does not expose lifecycle state")]
    NotLifecycle(String),
    #[error(transparent)]
    Rejected(#[from] UpdateRejected),
    #[error("query failed: {0}")]
    Internal(String),
}

impl From<StoreError> for QueryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Workflow read/approval surface consumed by the HTTP API and the SSE
/// streamer.
#[async_trait]
pub trait WorkflowQuerier: Send + Sync {
    async fn list_workflows(&self, opts: ListOptions) -> Result<Vec<WorkflowSummary>, QueryError>;
    async fn get_workflow_state(&self, workflow_id: &str) -> Result<WorkflowResult, QueryError>;
    async fn submit_approval(
        &self,
        workflow_id: &str,
        response: ApprovalResponse,
    ) -> Result<String, QueryError>;
}

/// Querier backed by the in-process workflow store.
#[derive(Clone)]
pub struct RuntimeQuerier {
    store: WorkflowStore,
}

impl RuntimeQuerier {
    pub fn new(store: WorkflowStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl WorkflowQuerier for RuntimeQuerier {
    async fn list_workflows(&self, opts: ListOptions) -> Result<Vec<WorkflowSummary>, QueryError> {
        Ok(self.store.list(&opts.task_queue, &opts.status_filter).await)
    }

    async fn get_workflow_state(&self, workflow_id: &str) -> Result<WorkflowResult, QueryError> {
        let snapshot = self.store.snapshot(workflow_id).await?;
        serde_json::from_value(snapshot)
            .map_err(|_| QueryError::NotLifecycle(workflow_id.to_string()))
    }

    async fn submit_approval(
        &self,
        workflow_id: &str,
        response: ApprovalResponse,
    ) -> Result<String, QueryError> {
        Ok(self.store.submit_approval(workflow_id, response).await?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use finops_core::domain::{FinOpsState, TenantContext};

    use super::{ListOptions, QueryError, RuntimeQuerier, WorkflowQuerier};
    use crate::lifecycle::WorkflowResult;
    use crate::store::WorkflowStore;

    #[tokio::test]
    async fn state_round_trips_through_the_querier() {
        let store = WorkflowStore::new();
        let state = FinOpsState::new(TenantContext::new("acme"));
        let result = WorkflowResult::in_progress(state.clone());
        store
            .register("wf-1", "finops-anomaly", serde_json::to_value(&result).expect("encode"))
            .await
            .expect("register");

        let querier = RuntimeQuerier::new(store);
        let fetched = querier.get_workflow_state("wf-1").await.expect("state");
        assert_eq!(fetched.state.tenant.tenant_id, "acme");
        assert!(fetched.reason.is_none());

        let listed =
            querier.list_workflows(ListOptions::anomaly_queue()).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].workflow_id, "wf-1");
    }

    #[tokio::test]
    async fn unknown_workflow_maps_to_not_found() {
        let querier = RuntimeQuerier::new(WorkflowStore::new());
        let error = querier.get_workflow_state("wf-404").await.expect_err("missing");
        assert!(matches!(error, QueryError::NotFound(_)));
    }

    #[tokio::test]
    async fn non_lifecycle_snapshot_is_rejected() {
        let store = WorkflowStore::new();
        store
            .register("sweep-1", "finops-anomaly", json!({"accounts_scanned": 3}))
            .await
            .expect("register");

        let querier = RuntimeQuerier::new(store);
        let error = querier.get_workflow_state("sweep-1").await.expect_err("not lifecycle");
        assert!(matches!(error, QueryError::NotLifecycle(_)));
    }
}
