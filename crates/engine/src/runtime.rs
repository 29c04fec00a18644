//! Workflow runtime: drives workflow bodies as explicit state machines.
//!
//! There is no replaying history here. Durability comes from persisting the
//! full state snapshot after every phase transition and journaling activity
//! outputs by `(workflow_id, phase)` so re-driven workflows never re-invoke
//! completed work. Workflow bodies suspend only at activity calls, timers,
//! and the approval gate; everything non-deterministic stays behind the
//! activity boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Notify, mpsc, oneshot, watch};

use finops_core::domain::{ApprovalStatus, FinOpsState};
use finops_core::errors::ApplicationError;

use crate::activities::Activities;
use crate::detection::{self, DetectionResult};
use crate::lifecycle::{self, WorkflowInput, WorkflowResult};
use crate::store::{ApprovalSubmission, StoreError, UpdateRejected, WorkflowStatus, WorkflowStore};
use crate::sweep::{self, SweepInput, SweepResult};
use crate::worker::WorkerPool;

/// Failures of a single activity invocation, as seen by the workflow body.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ActivityError {
    #[error("activity timed out after {0:?}")]
    Timeout(Duration),
    #[error("activity cancelled by shutdown")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("queue `{0}` is not hosted by this worker process")]
    QueueNotHosted(String),
    #[error("workflow `{workflow}` is not registered on queue `{queue}`")]
    NotRegisteredOnQueue { workflow: &'static str, queue: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Handle returned from a workflow start: the run id plus a completion
/// receiver for callers that need the final result (child workflows do).
pub struct WorkflowHandle<T> {
    pub run_id: String,
    pub done: oneshot::Receiver<T>,
}

pub struct WorkflowRuntime {
    pub store: WorkflowStore,
    activities: Arc<Activities>,
    pool: Arc<WorkerPool>,
    shutdown: watch::Receiver<bool>,
    active: AtomicUsize,
    drained: Notify,
}

impl WorkflowRuntime {
    pub fn new(
        activities: Arc<Activities>,
        pool: Arc<WorkerPool>,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store: WorkflowStore::new(),
            activities,
            pool,
            shutdown,
            active: AtomicUsize::new(0),
            drained: Notify::new(),
        })
    }

    /// Starts an anomaly lifecycle workflow on the given queue.
    pub async fn start_anomaly_lifecycle(
        self: &Arc<Self>,
        queue: &str,
        workflow_id: String,
        input: WorkflowInput,
    ) -> Result<WorkflowHandle<WorkflowResult>, StartError> {
        let worker = self
            .pool
            .worker(queue)
            .ok_or_else(|| StartError::QueueNotHosted(queue.to_string()))?;
        if !worker.config.hosts_lifecycle {
            return Err(StartError::NotRegisteredOnQueue {
                workflow: "AnomalyLifecycleWorkflow",
                queue: queue.to_string(),
            });
        }

        let mut initial = FinOpsState::new(input.tenant.clone());
        initial.workflow_id = workflow_id.clone();
        let snapshot = to_snapshot(&WorkflowResult::in_progress(initial.clone()));
        let run_id = self.store.register(&workflow_id, queue, snapshot).await?;

        let permits = Arc::clone(&worker.workflow_permits);
        let runtime = Arc::clone(self);
        let queue = queue.to_string();
        let (done_tx, done_rx) = oneshot::channel();

        self.task_started();
        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await;
            let ctx = WorkflowCtx {
                runtime: Arc::clone(&runtime),
                queue,
                workflow_id: initial.workflow_id.clone(),
            };
            let result = lifecycle::anomaly_lifecycle(&ctx, initial, input).await;
            runtime.finish(&ctx.workflow_id, &result).await;
            let _ = done_tx.send(result);
            runtime.task_finished();
        });

        Ok(WorkflowHandle { run_id, done: done_rx })
    }

    /// Starts the waste sweep workflow. Child lifecycle workflows are spawned
    /// through the same runtime onto the same queue.
    pub async fn start_sweep(
        self: &Arc<Self>,
        queue: &str,
        workflow_id: String,
        input: SweepInput,
    ) -> Result<WorkflowHandle<SweepResult>, StartError> {
        let worker = self
            .pool
            .worker(queue)
            .ok_or_else(|| StartError::QueueNotHosted(queue.to_string()))?;
        if !worker.config.hosts_sweep {
            return Err(StartError::NotRegisteredOnQueue {
                workflow: "AWSDocSweepWorkflow",
                queue: queue.to_string(),
            });
        }

        let run_id =
            self.store.register(&workflow_id, queue, to_snapshot(&SweepResult::default())).await?;

        let permits = Arc::clone(&worker.workflow_permits);
        let runtime = Arc::clone(self);
        let queue = queue.to_string();
        let (done_tx, done_rx) = oneshot::channel();

        self.task_started();
        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await;
            let ctx =
                WorkflowCtx { runtime: Arc::clone(&runtime), queue, workflow_id: workflow_id.clone() };
            let result = sweep::awsdoc_sweep(&ctx, input).await;
            runtime.finish(&workflow_id, &result).await;
            let _ = done_tx.send(result);
            runtime.task_finished();
        });

        Ok(WorkflowHandle { run_id, done: done_rx })
    }

    /// Starts the scheduled detection workflow on the detect queue.
    pub async fn start_detection(
        self: &Arc<Self>,
        queue: &str,
        workflow_id: String,
    ) -> Result<WorkflowHandle<DetectionResult>, StartError> {
        let worker = self
            .pool
            .worker(queue)
            .ok_or_else(|| StartError::QueueNotHosted(queue.to_string()))?;
        if !worker.config.hosts_detection {
            return Err(StartError::NotRegisteredOnQueue {
                workflow: "ScheduledDetectionWorkflow",
                queue: queue.to_string(),
            });
        }

        let run_id = self
            .store
            .register(&workflow_id, queue, to_snapshot(&DetectionResult::default()))
            .await?;

        let permits = Arc::clone(&worker.workflow_permits);
        let runtime = Arc::clone(self);
        let (done_tx, done_rx) = oneshot::channel();

        self.task_started();
        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await;
            let result = detection::scheduled_detection().await;
            runtime.finish(&workflow_id, &result).await;
            let _ = done_tx.send(result);
            runtime.task_finished();
        });

        Ok(WorkflowHandle { run_id, done: done_rx })
    }

    async fn finish<T: Serialize>(&self, workflow_id: &str, result: &T) {
        if let Err(error) =
            self.store.close(workflow_id, WorkflowStatus::Completed, to_snapshot(result)).await
        {
            tracing::error!(workflow_id, %error, "failed to close workflow entry");
        }
    }

    fn task_started(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    fn task_finished(&self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }

    /// Waits until every in-flight workflow task has finished. Used by the
    /// process shutdown path after the cancellation signal fires.
    pub async fn drain(&self) {
        loop {
            let pending = self.drained.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            pending.await;
        }
    }
}

fn to_snapshot<T: Serialize>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(snapshot) => snapshot,
        Err(error) => {
            tracing::error!(%error, "failed to encode workflow snapshot");
            Value::Null
        }
    }
}

/// Per-workflow execution context handed to workflow bodies. All suspension
/// points (activities, timers, the approval gate) go through here.
pub struct WorkflowCtx {
    pub(crate) runtime: Arc<WorkflowRuntime>,
    pub(crate) queue: String,
    pub workflow_id: String,
}

impl WorkflowCtx {
    pub fn activities(&self) -> &Activities {
        &self.runtime.activities
    }

    /// Persists the current state snapshot. Called after every transition.
    pub async fn persist<T: Serialize>(&self, result: &T) {
        if let Err(error) = self.runtime.store.persist(&self.workflow_id, to_snapshot(result)).await
        {
            tracing::error!(workflow_id = %self.workflow_id, %error, "failed to persist snapshot");
        }
    }

    /// Executes an activity with a start-to-close timeout and no automatic
    /// retries. Outputs are journaled under `phase_key`: a re-driven
    /// workflow returns the journaled output without re-invoking the
    /// activity.
    pub async fn execute<T, F>(
        &self,
        phase_key: &str,
        timeout: Duration,
        activity: F,
    ) -> Result<T, ActivityError>
    where
        T: Serialize + DeserializeOwned,
        F: std::future::Future<Output = Result<T, ApplicationError>>,
    {
        if let Some(journaled) =
            self.runtime.store.journal_get(&self.workflow_id, phase_key).await
        {
            if let Ok(output) = serde_json::from_value(journaled) {
                return Ok(output);
            }
        }

        let worker = self
            .runtime
            .pool
            .worker(&self.queue)
            .ok_or_else(|| ActivityError::Failed(format!("queue {} not hosted", self.queue)))?;
        let Ok(_permit) = Arc::clone(&worker.activity_permits).acquire_owned().await else {
            return Err(ActivityError::Cancelled);
        };

        let mut shutdown = self.runtime.shutdown.clone();
        if *shutdown.borrow() {
            return Err(ActivityError::Cancelled);
        }

        let output = tokio::select! {
            outcome = tokio::time::timeout(timeout, activity) => match outcome {
                Err(_) => return Err(ActivityError::Timeout(timeout)),
                Ok(Err(error)) => return Err(ActivityError::Failed(error.to_string())),
                Ok(Ok(output)) => output,
            },
            _ = shutdown.changed() => return Err(ActivityError::Cancelled),
        };

        self.runtime.store.journal_put(&self.workflow_id, phase_key, to_snapshot(&output)).await;
        Ok(output)
    }

    /// Registers the named "approval" update handler. Registration happens
    /// before the pending state becomes visible, so a submission can never
    /// race the handler installation.
    pub async fn register_approval_gate(&self) -> Option<ApprovalWait> {
        match self.runtime.store.install_approval_gate(&self.workflow_id).await {
            Ok((rx, accepted)) => Some(ApprovalWait { rx, accepted }),
            Err(error) => {
                tracing::error!(workflow_id = %self.workflow_id, %error, "approval gate install failed");
                None
            }
        }
    }

    /// Races the first accepted submission against the HIL timer. Exactly
    /// one submission is ever accepted; the rest are rejected with
    /// "already received".
    pub async fn wait_for_approval(
        &self,
        gate: Option<ApprovalWait>,
        timeout: Duration,
    ) -> ApprovalStatus {
        let Some(ApprovalWait { mut rx, accepted }) = gate else {
            return ApprovalStatus::TimedOut;
        };

        let sleep = tokio::time::sleep(timeout);
        tokio::pin!(sleep);

        let decision = loop {
            tokio::select! {
                submission = rx.recv() => {
                    let Some(submission) = submission else {
                        break ApprovalStatus::TimedOut;
                    };
                    match take_submission(&accepted, submission) {
                        Some(status) => break status,
                        None => continue,
                    }
                }
                _ = &mut sleep => {
                    tracing::info!(workflow_id = %self.workflow_id, "approval timed out");
                    break ApprovalStatus::TimedOut;
                }
            }
        };

        self.runtime.store.clear_approval_gate(&self.workflow_id).await;
        decision
    }

    /// Starts a child anomaly lifecycle on this workflow's queue and returns
    /// a receiver for its final result.
    pub async fn start_child_lifecycle(
        &self,
        workflow_id: String,
        input: WorkflowInput,
    ) -> Result<oneshot::Receiver<WorkflowResult>, StartError> {
        let handle =
            self.runtime.start_anomaly_lifecycle(&self.queue, workflow_id, input).await?;
        Ok(handle.done)
    }
}

/// Receiving half of an installed approval gate.
pub struct ApprovalWait {
    rx: mpsc::Receiver<ApprovalSubmission>,
    accepted: Arc<AtomicBool>,
}

/// Takes one submission off the gate: accepts the first, rejects the rest.
fn take_submission(
    accepted: &Arc<AtomicBool>,
    submission: ApprovalSubmission,
) -> Option<ApprovalStatus> {
    if accepted.swap(true, Ordering::SeqCst) {
        let _ = submission.ack.send(Err(UpdateRejected::AlreadyReceived));
        return None;
    }
    let status = if submission.response.approved {
        tracing::info!(by = %submission.response.by, "human approved");
        ApprovalStatus::Approved
    } else {
        tracing::info!(
            by = %submission.response.by,
            reason = %submission.response.reason,
            "human denied"
        );
        ApprovalStatus::Denied
    };
    let _ = submission.ack.send(Ok(status.as_str().to_string()));
    Some(status)
}
