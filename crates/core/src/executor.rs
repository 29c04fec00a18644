//! Deterministic action executor.
//!
//! Takes pre/post snapshots, runs the policy safety gate before touching
//! anything, executes approved actions sequentially, and halts on the first
//! failure. Cloud mutation calls are stubbed behind the snapshot boundary.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use crate::domain::{ApprovalStatus, ExecutionResult, RecommendedAction};
use crate::errors::ApplicationError;
use crate::policy::enforce_executor_safety;
use crate::triage::FetchResult;

/// Resource tag lookup, implemented by the infra connector.
#[async_trait]
pub trait TagFetcher: Send + Sync {
    async fn resource_tags(&self, arn: &str) -> FetchResult<BTreeMap<String, String>>;
}

#[async_trait]
impl<T: TagFetcher + ?Sized> TagFetcher for std::sync::Arc<T> {
    async fn resource_tags(&self, arn: &str) -> FetchResult<BTreeMap<String, String>> {
        (**self).resource_tags(arn).await
    }
}

pub struct Executor<T> {
    tags: T,
}

impl<T> Executor<T>
where
    T: TagFetcher,
{
    pub fn new(tags: T) -> Self {
        Self { tags }
    }

    /// Captures the pre- or post-action state for the given action. Actions
    /// with a target resource record its tags; untargeted actions snapshot
    /// empty.
    pub async fn snapshot(
        &self,
        action: &RecommendedAction,
    ) -> Result<BTreeMap<String, Value>, ApplicationError> {
        if action.target_resource.is_empty() {
            return Ok(BTreeMap::new());
        }
        let tags = self.tags.resource_tags(&action.target_resource).await.map_err(|err| {
            ApplicationError::Fetch(format!(
                "snapshot tags for {}: {err}",
                action.target_resource
            ))
        })?;
        Ok(BTreeMap::from([("tags".to_string(), json!(tags))]))
    }

    /// Runs each approved action sequentially with pre/post snapshots,
    /// enforcing the safety gate up front. Stops on the first failure.
    pub async fn execute_actions(
        &self,
        approval: ApprovalStatus,
        actions: &[RecommendedAction],
        resource_tags: &BTreeMap<String, BTreeMap<String, String>>,
    ) -> Result<Vec<ExecutionResult>, ApplicationError> {
        enforce_executor_safety(approval, actions, resource_tags)
            .map_err(|refusal| ApplicationError::Integration(refusal.to_string()))?;

        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            let pre = self.snapshot(action).await?;

            // TODO: production impl should apply the change and capture real post state
            results.push(ExecutionResult {
                action_id: action.action_id.clone(),
                executed_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                success: true,
                details: format!(
                    "stub executed {} on {}",
                    action.action_type, action.target_resource
                ),
                rollback_available: true,
                pre_action_snapshot: pre.clone(),
                post_action_snapshot: pre,
            });
        }
        Ok(results)
    }
}
