//! Workflow store: the durable registry behind the state-query handler.
//!
//! Every phase transition persists a full snapshot here, and activity
//! outputs are journaled by `(workflow_id, phase)` so a re-driven workflow
//! re-uses completed work instead of re-invoking it. Snapshots are stored as
//! JSON values; the codec is deliberately opaque to callers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc, oneshot};
use uuid::Uuid;

use crate::activities::ApprovalResponse;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Visibility row for workflow listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_id: String,
    pub run_id: String,
    pub status: WorkflowStatus,
    pub start_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub task_queue: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("workflow {0} already exists")]
    Duplicate(String),
    #[error("workflow {0} not found")]
    NotFound(String),
}

/// Rejections from the approval update validator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UpdateRejected {
    #[error("approval 'by' field is required")]
    MissingBy,
    #[error("approval already received")]
    AlreadyReceived,
    #[error("workflow {0} is not awaiting approval")]
    NotAwaiting(String),
    #[error("workflow {0} not found")]
    WorkflowNotFound(String),
}

/// One submission travelling through the named "approval" update handler.
/// The `ack` channel gives the submitter a synchronous completion wait.
pub struct ApprovalSubmission {
    pub response: ApprovalResponse,
    pub ack: oneshot::Sender<Result<String, UpdateRejected>>,
}

/// Sender half of an installed approval gate.
#[derive(Clone)]
pub struct ApprovalGate {
    tx: mpsc::Sender<ApprovalSubmission>,
}

struct Entry {
    run_id: String,
    task_queue: String,
    status: WorkflowStatus,
    start_time: DateTime<Utc>,
    close_time: Option<DateTime<Utc>>,
    snapshot: Value,
    approval: Option<ApprovalGate>,
    /// Outlives the gate: once a submission has been accepted, every later
    /// submission is rejected with "already received" even after the gate
    /// is torn down.
    approval_accepted: Option<Arc<AtomicBool>>,
    journal: HashMap<String, Value>,
}

/// Shared workflow registry. Reads take the read lock; registration,
/// persistence, and gate changes take the write lock.
#[derive(Clone, Default)]
pub struct WorkflowStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new workflow and returns its run id.
    pub async fn register(
        &self,
        workflow_id: &str,
        task_queue: &str,
        snapshot: Value,
    ) -> Result<String, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.contains_key(workflow_id) {
            return Err(StoreError::Duplicate(workflow_id.to_string()));
        }
        let run_id = Uuid::new_v4().to_string();
        inner.insert(
            workflow_id.to_string(),
            Entry {
                run_id: run_id.clone(),
                task_queue: task_queue.to_string(),
                status: WorkflowStatus::Running,
                start_time: Utc::now(),
                close_time: None,
                snapshot,
                approval: None,
                approval_accepted: None,
                journal: HashMap::new(),
            },
        );
        Ok(run_id)
    }

    /// Persists the latest state snapshot for a running workflow.
    pub async fn persist(&self, workflow_id: &str, snapshot: Value) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(workflow_id)
            .ok_or_else(|| StoreError::NotFound(workflow_id.to_string()))?;
        entry.snapshot = snapshot;
        Ok(())
    }

    /// Marks a workflow closed with its final snapshot.
    pub async fn close(
        &self,
        workflow_id: &str,
        status: WorkflowStatus,
        snapshot: Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(workflow_id)
            .ok_or_else(|| StoreError::NotFound(workflow_id.to_string()))?;
        entry.snapshot = snapshot;
        entry.status = status;
        entry.close_time = Some(Utc::now());
        entry.approval = None;
        Ok(())
    }

    pub async fn snapshot(&self, workflow_id: &str) -> Result<Value, StoreError> {
        let inner = self.inner.read().await;
        inner
            .get(workflow_id)
            .map(|entry| entry.snapshot.clone())
            .ok_or_else(|| StoreError::NotFound(workflow_id.to_string()))
    }

    pub async fn status(&self, workflow_id: &str) -> Result<WorkflowStatus, StoreError> {
        let inner = self.inner.read().await;
        inner
            .get(workflow_id)
            .map(|entry| entry.status)
            .ok_or_else(|| StoreError::NotFound(workflow_id.to_string()))
    }

    /// Lists workflows, newest first, optionally filtered by queue and status.
    pub async fn list(&self, task_queue: &str, status_filter: &str) -> Vec<WorkflowSummary> {
        let inner = self.inner.read().await;
        let mut summaries: Vec<WorkflowSummary> = inner
            .iter()
            .filter(|(_, entry)| task_queue.is_empty() || entry.task_queue == task_queue)
            .filter(|(_, entry)| {
                status_filter.is_empty()
                    || entry.status.as_str().eq_ignore_ascii_case(status_filter)
            })
            .map(|(workflow_id, entry)| WorkflowSummary {
                workflow_id: workflow_id.clone(),
                run_id: entry.run_id.clone(),
                status: entry.status,
                start_time: entry.start_time,
                close_time: entry.close_time,
                task_queue: entry.task_queue.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        summaries
    }

    pub async fn journal_get(&self, workflow_id: &str, phase_key: &str) -> Option<Value> {
        let inner = self.inner.read().await;
        inner.get(workflow_id).and_then(|entry| entry.journal.get(phase_key).cloned())
    }

    pub async fn journal_put(&self, workflow_id: &str, phase_key: &str, output: Value) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.get_mut(workflow_id) {
            entry.journal.insert(phase_key.to_string(), output);
        }
    }

    /// Installs the named "approval" update handler for a workflow and
    /// returns the receiving half. At most one gate exists per workflow.
    pub async fn install_approval_gate(
        &self,
        workflow_id: &str,
    ) -> Result<(mpsc::Receiver<ApprovalSubmission>, Arc<AtomicBool>), StoreError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(workflow_id)
            .ok_or_else(|| StoreError::NotFound(workflow_id.to_string()))?;
        let (tx, rx) = mpsc::channel(8);
        let accepted = Arc::new(AtomicBool::new(false));
        entry.approval = Some(ApprovalGate { tx });
        entry.approval_accepted = Some(Arc::clone(&accepted));
        Ok((rx, accepted))
    }

    pub async fn clear_approval_gate(&self, workflow_id: &str) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.get_mut(workflow_id) {
            entry.approval = None;
        }
    }

    /// Validates and submits an approval, waiting synchronously for the
    /// workflow to take (or reject) it. Concurrent submissions serialize
    /// through the gate channel; all but the first see "already received".
    pub async fn submit_approval(
        &self,
        workflow_id: &str,
        response: ApprovalResponse,
    ) -> Result<String, UpdateRejected> {
        if response.by.is_empty() {
            return Err(UpdateRejected::MissingBy);
        }

        let gate = {
            let inner = self.inner.read().await;
            let entry = inner
                .get(workflow_id)
                .ok_or_else(|| UpdateRejected::WorkflowNotFound(workflow_id.to_string()))?;
            if let Some(accepted) = &entry.approval_accepted {
                if accepted.load(Ordering::SeqCst) {
                    return Err(UpdateRejected::AlreadyReceived);
                }
            }
            entry
                .approval
                .clone()
                .ok_or_else(|| UpdateRejected::NotAwaiting(workflow_id.to_string()))?
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        gate.tx
            .send(ApprovalSubmission { response, ack: ack_tx })
            .await
            .map_err(|_| UpdateRejected::NotAwaiting(workflow_id.to_string()))?;

        ack_rx
            .await
            .map_err(|_| UpdateRejected::NotAwaiting(workflow_id.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{StoreError, UpdateRejected, WorkflowStatus, WorkflowStore};
    use crate::activities::ApprovalResponse;

    #[tokio::test]
    async fn register_persist_and_close_round_trip() {
        let store = WorkflowStore::new();
        let run_id = store
            .register("wf-1", "finops-anomaly", json!({"phase": "watcher"}))
            .await
            .expect("register");
        assert_eq!(run_id.len(), 36);

        store.persist("wf-1", json!({"phase": "triage"})).await.expect("persist");
        assert_eq!(
            store.snapshot("wf-1").await.expect("snapshot"),
            json!({"phase": "triage"})
        );

        store
            .close("wf-1", WorkflowStatus::Completed, json!({"phase": "completed"}))
            .await
            .expect("close");
        assert_eq!(store.status("wf-1").await.expect("status"), WorkflowStatus::Completed);

        let listed = store.list("finops-anomaly", "completed").await;
        assert_eq!(listed.len(), 1);
        assert!(listed[0].close_time.is_some());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let store = WorkflowStore::new();
        store.register("wf-1", "finops-anomaly", json!({})).await.expect("first");
        let error = store
            .register("wf-1", "finops-anomaly", json!({}))
            .await
            .expect_err("duplicate must fail");
        assert_eq!(error, StoreError::Duplicate("wf-1".to_string()));
    }

    #[tokio::test]
    async fn list_filters_by_status_and_queue() {
        let store = WorkflowStore::new();
        store.register("wf-1", "finops-anomaly", json!({})).await.expect("register");
        store.register("wf-2", "finops-detect", json!({})).await.expect("register");
        store
            .close("wf-1", WorkflowStatus::Completed, json!({}))
            .await
            .expect("close");

        assert_eq!(store.list("", "").await.len(), 2);
        assert_eq!(store.list("finops-anomaly", "").await.len(), 1);
        assert_eq!(store.list("", "Running").await.len(), 1);
        assert_eq!(store.list("", "running").await[0].workflow_id, "wf-2");
    }

    #[tokio::test]
    async fn journal_is_keyed_by_phase() {
        let store = WorkflowStore::new();
        store.register("wf-1", "finops-anomaly", json!({})).await.expect("register");

        assert!(store.journal_get("wf-1", "triage").await.is_none());
        store.journal_put("wf-1", "triage", json!({"category": "unknown"})).await;
        assert_eq!(
            store.journal_get("wf-1", "triage").await,
            Some(json!({"category": "unknown"}))
        );
        assert!(store.journal_get("wf-1", "analyst").await.is_none());
    }

    #[tokio::test]
    async fn approval_requires_by_and_installed_gate() {
        let store = WorkflowStore::new();
        store.register("wf-1", "finops-anomaly", json!({})).await.expect("register");

        let missing_by = store
            .submit_approval(
                "wf-1",
                ApprovalResponse { approved: true, by: String::new(), reason: String::new() },
            )
            .await
            .expect_err("empty by must be rejected");
        assert_eq!(missing_by, UpdateRejected::MissingBy);

        let not_awaiting = store
            .submit_approval(
                "wf-1",
                ApprovalResponse {
                    approved: true,
                    by: "ops".to_string(),
                    reason: String::new(),
                },
            )
            .await
            .expect_err("no gate installed");
        assert_eq!(not_awaiting, UpdateRejected::NotAwaiting("wf-1".to_string()));

        let not_found = store
            .submit_approval(
                "wf-404",
                ApprovalResponse {
                    approved: true,
                    by: "ops".to_string(),
                    reason: String::new(),
                },
            )
            .await
            .expect_err("unknown workflow");
        assert_eq!(not_found, UpdateRejected::WorkflowNotFound("wf-404".to_string()));
    }

    #[tokio::test]
    async fn submission_reaches_installed_gate_and_acks() {
        let store = WorkflowStore::new();
        store.register("wf-1", "finops-anomaly", json!({})).await.expect("register");
        let (mut rx, accepted) =
            store.install_approval_gate("wf-1").await.expect("install gate");

        let submit_store = store.clone();
        let submit = tokio::spawn(async move {
            submit_store
                .submit_approval(
                    "wf-1",
                    ApprovalResponse {
                        approved: true,
                        by: "ops-engineer".to_string(),
                        reason: String::new(),
                    },
                )
                .await
        });

        let submission = rx.recv().await.expect("submission should arrive");
        assert!(submission.response.approved);
        accepted.store(true, std::sync::atomic::Ordering::SeqCst);
        submission.ack.send(Ok("approved".to_string())).expect("ack");

        let result = submit.await.expect("join").expect("submission accepted");
        assert_eq!(result, "approved");

        // Second submission is rejected without reaching the workflow.
        let error = store
            .submit_approval(
                "wf-1",
                ApprovalResponse {
                    approved: false,
                    by: "late".to_string(),
                    reason: String::new(),
                },
            )
            .await
            .expect_err("second submission must be rejected");
        assert_eq!(error, UpdateRejected::AlreadyReceived);
    }
}
