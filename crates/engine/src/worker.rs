//! Per-queue workers. Each selected queue gets semaphore pairs bounding
//! concurrent workflow tasks and activity executions; all workers share one
//! shutdown watch channel fed by SIGINT/SIGTERM.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Semaphore, watch};

use crate::queues::{QueueConfig, UnknownQueue, config_for};

/// Concurrency state for one queue's worker.
pub struct Worker {
    pub config: QueueConfig,
    pub workflow_permits: Arc<Semaphore>,
    pub activity_permits: Arc<Semaphore>,
}

impl Worker {
    fn new(config: QueueConfig) -> Self {
        Self {
            workflow_permits: Arc::new(Semaphore::new(config.max_concurrent_workflow_tasks)),
            activity_permits: Arc::new(Semaphore::new(config.max_concurrent_activities)),
            config,
        }
    }
}

/// The set of workers this process hosts, keyed by canonical queue name.
pub struct WorkerPool {
    workers: HashMap<&'static str, Worker>,
}

impl WorkerPool {
    /// Builds workers for the selected canonical queue names.
    pub fn new(selected: &[String]) -> Result<Self, UnknownQueue> {
        let mut workers = HashMap::new();
        for name in selected {
            let config =
                config_for(name).ok_or_else(|| UnknownQueue(name.clone()))?;
            workers.insert(config.name, Worker::new(config));
        }
        Ok(Self { workers })
    }

    pub fn worker(&self, queue: &str) -> Option<&Worker> {
        self.workers.get(queue)
    }

    pub fn hosted_queues(&self) -> Vec<&'static str> {
        let mut queues: Vec<&'static str> = self.workers.keys().copied().collect();
        queues.sort_unstable();
        queues
    }
}

/// Creates the process-wide shutdown channel. Flip it with
/// [`trigger_shutdown`] or by awaiting [`shutdown_on_signal`].
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

pub fn trigger_shutdown(tx: &watch::Sender<bool>) {
    let _ = tx.send(true);
}

/// Waits for SIGINT or SIGTERM, then flips the shutdown channel so every
/// worker drains its current tasks and exits.
#[cfg(unix)]
pub async fn shutdown_on_signal(tx: watch::Sender<bool>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(%error, "failed to install SIGTERM handler");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    tracing::info!("shutdown signal received, draining workers");
    trigger_shutdown(&tx);
}

#[cfg(not(unix))]
pub async fn shutdown_on_signal(tx: watch::Sender<bool>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining workers");
    trigger_shutdown(&tx);
}

#[cfg(test)]
mod tests {
    use super::{WorkerPool, shutdown_channel, trigger_shutdown};
    use crate::queues::{QUEUE_ANOMALY, QUEUE_EXEC, parse_queues};

    #[test]
    fn pool_builds_workers_for_selected_queues() {
        let selected = parse_queues("anomaly,exec").expect("parse");
        let pool = WorkerPool::new(&selected).expect("pool");

        assert_eq!(pool.hosted_queues(), vec![QUEUE_ANOMALY, QUEUE_EXEC]);
        let anomaly = pool.worker(QUEUE_ANOMALY).expect("anomaly worker");
        assert_eq!(anomaly.workflow_permits.available_permits(), 10);
        assert_eq!(anomaly.activity_permits.available_permits(), 10);

        let exec = pool.worker(QUEUE_EXEC).expect("exec worker");
        assert_eq!(exec.workflow_permits.available_permits(), 1);
        assert_eq!(exec.activity_permits.available_permits(), 3);

        assert!(pool.worker("finops-detect").is_none());
    }

    #[tokio::test]
    async fn shutdown_channel_propagates() {
        let (tx, mut rx) = shutdown_channel();
        assert!(!*rx.borrow());
        trigger_shutdown(&tx);
        rx.changed().await.expect("changed");
        assert!(*rx.borrow());
    }
}
