//! SSE state streamer.
//!
//! Mirrors workflow state to clients: `RUN_STARTED`, then a full
//! `STATE_SNAPSHOT`, then polled `STATE_DELTA`s with phase-transition
//! events, ending in `RUN_FINISHED` (with the termination reason) or
//! `RUN_ERROR`. A client can reconstruct current state from any snapshot
//! plus all subsequent deltas. Today each delta carries a fresh schema and
//! an empty patch list.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::{DateTime, Utc};
use futures::Stream;
use futures::stream;
use serde::Serialize;
use serde_json::{Value, json};

use finops_core::uischema;
use finops_engine::querier::WorkflowQuerier;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EventType {
    #[serde(rename = "RUN_STARTED")]
    RunStarted,
    #[serde(rename = "RUN_FINISHED")]
    RunFinished,
    #[serde(rename = "RUN_ERROR")]
    RunError,
    #[serde(rename = "STEP_STARTED")]
    StepStarted,
    #[serde(rename = "STEP_FINISHED")]
    StepFinished,
    #[serde(rename = "STATE_SNAPSHOT")]
    StateSnapshot,
    #[serde(rename = "STATE_DELTA")]
    StateDelta,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunStarted => "RUN_STARTED",
            Self::RunFinished => "RUN_FINISHED",
            Self::RunError => "RUN_ERROR",
            Self::StepStarted => "STEP_STARTED",
            Self::StepFinished => "STEP_FINISHED",
            Self::StateSnapshot => "STATE_SNAPSHOT",
            Self::StateDelta => "STATE_DELTA",
        }
    }
}

/// One SSE frame payload.
#[derive(Clone, Debug, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub workflow_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Event {
    fn new(event_type: EventType, workflow_id: &str, data: Option<Value>) -> Self {
        Self { event_type, timestamp: Utc::now(), workflow_id: workflow_id.to_string(), data }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StreamConfig {
    pub poll_interval: Duration,
    pub max_duration: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(2), max_duration: Duration::from_secs(30 * 60) }
    }
}

struct StreamState {
    querier: Arc<dyn WorkflowQuerier>,
    workflow_id: String,
    config: StreamConfig,
    deadline: tokio::time::Instant,
    pending: VecDeque<Event>,
    last_phase: Option<String>,
    opened: bool,
    closed: bool,
}

/// Produces the ordered event sequence for one subscriber. Delta ordering is
/// per-subscriber; nothing is promised across subscribers.
pub fn event_stream(
    querier: Arc<dyn WorkflowQuerier>,
    workflow_id: String,
    config: StreamConfig,
) -> impl Stream<Item = Event> {
    let state = StreamState {
        querier,
        workflow_id,
        deadline: tokio::time::Instant::now() + config.max_duration,
        config,
        pending: VecDeque::new(),
        last_phase: None,
        opened: false,
        closed: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.closed {
                return None;
            }

            if !state.opened {
                state.opened = true;
                state.queue_open().await;
                continue;
            }

            if tokio::time::Instant::now() >= state.deadline {
                return None; // stream lifetime exhausted
            }
            tokio::time::sleep(state.config.poll_interval).await;
            state.queue_tick().await;
        }
    })
}

impl StreamState {
    fn push(&mut self, event_type: EventType, data: Option<Value>) {
        self.pending.push_back(Event::new(event_type, &self.workflow_id, data));
    }

    fn push_error(&mut self, message: String) {
        self.push(EventType::RunError, Some(json!({ "message": message })));
        self.closed = true;
    }

    fn push_finished(&mut self, reason: Option<&str>) {
        self.push(EventType::RunFinished, Some(json!({ "reason": reason })));
        self.closed = true;
    }

    /// Connect sequence: RUN_STARTED then the full snapshot (or RUN_ERROR).
    async fn queue_open(&mut self) {
        self.push(EventType::RunStarted, None);

        let result = match self.querier.get_workflow_state(&self.workflow_id).await {
            Ok(result) => result,
            Err(error) => {
                self.push_error(error.to_string());
                return;
            }
        };

        let schema = uischema::build(&result.state);
        let phase = result.state.current_phase.as_str().to_string();
        self.push(
            EventType::StateSnapshot,
            Some(json!({
                "phase": phase,
                "state": result.state,
                "ui_schema": schema,
            })),
        );
        self.last_phase = Some(phase);

        if result.state.should_terminate {
            self.push_finished(result.reason.map(|reason| reason.as_str()));
        }
    }

    /// One poll tick: phase-transition events, a delta, and termination.
    async fn queue_tick(&mut self) {
        let result = match self.querier.get_workflow_state(&self.workflow_id).await {
            Ok(result) => result,
            Err(error) => {
                self.push_error(error.to_string());
                return;
            }
        };

        let current_phase = result.state.current_phase.as_str().to_string();
        let phase_changed = self.last_phase.as_deref() != Some(current_phase.as_str());

        if phase_changed {
            if let Some(previous) = self.last_phase.take() {
                self.push(EventType::StepFinished, Some(json!({ "phase": previous })));
            }
            self.push(EventType::StepStarted, Some(json!({ "phase": current_phase })));

            // Patch computation is stubbed: clients re-render from the
            // schema carried on every delta.
            let schema = uischema::build(&result.state);
            self.push(
                EventType::StateDelta,
                Some(json!({
                    "phase": current_phase,
                    "patches": [],
                    "ui_schema": schema,
                })),
            );
            self.last_phase = Some(current_phase);
        }

        if result.state.should_terminate {
            self.push_finished(result.reason.map(|reason| reason.as_str()));
        }
    }
}

/// Adapts the event stream to axum's SSE response with
/// `event: <type>\ndata: <json>\n\n` frames.
pub fn sse_response(
    querier: Arc<dyn WorkflowQuerier>,
    workflow_id: String,
    config: StreamConfig,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let events = event_stream(querier, workflow_id, config);
    let frames = futures::StreamExt::map(events, |event| {
        let frame = SseEvent::default().event(event.event_type.as_str());
        let frame = match serde_json::to_string(&event) {
            Ok(payload) => frame.data(payload),
            Err(error) => {
                tracing::error!(%error, "failed to encode SSE event");
                frame.data("{}")
            }
        };
        Ok(frame)
    });
    Sse::new(frames).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::sync::Mutex;

    use finops_core::domain::{ApprovalStatus, FinOpsState, TenantContext, WorkflowPhase};
    use finops_engine::activities::ApprovalResponse;
    use finops_engine::lifecycle::{TerminationReason, WorkflowResult};
    use finops_engine::querier::{ListOptions, QueryError, WorkflowQuerier};
    use finops_engine::store::WorkflowSummary;

    use super::{EventType, StreamConfig, event_stream};

    /// Querier fake with a scripted sequence of states; the final entry
    /// repeats forever.
    struct ScriptedQuerier {
        script: Mutex<Vec<Result<WorkflowResult, String>>>,
    }

    impl ScriptedQuerier {
        fn new(script: Vec<Result<WorkflowResult, String>>) -> Self {
            Self { script: Mutex::new(script) }
        }
    }

    #[async_trait]
    impl WorkflowQuerier for ScriptedQuerier {
        async fn list_workflows(
            &self,
            _: ListOptions,
        ) -> Result<Vec<WorkflowSummary>, QueryError> {
            Ok(vec![])
        }

        async fn get_workflow_state(&self, id: &str) -> Result<WorkflowResult, QueryError> {
            let mut script = self.script.lock().await;
            let next = if script.len() > 1 { script.remove(0) } else { script[0].clone() };
            next.map_err(|_| QueryError::NotFound(id.to_string()))
        }

        async fn submit_approval(
            &self,
            _: &str,
            _: ApprovalResponse,
        ) -> Result<String, QueryError> {
            unreachable!("stream never submits approvals")
        }
    }

    fn state(phase: WorkflowPhase, terminated: bool) -> FinOpsState {
        let mut state = FinOpsState::new(TenantContext::new("acme"));
        state.workflow_id = "wf-1".to_string();
        state.current_phase = phase;
        state.should_terminate = terminated;
        state.approval = ApprovalStatus::Pending;
        state
    }

    fn config() -> StreamConfig {
        StreamConfig {
            poll_interval: Duration::from_millis(10),
            max_duration: Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn terminated_workflow_gets_snapshot_then_finished() {
        let querier = Arc::new(ScriptedQuerier::new(vec![Ok(WorkflowResult::finished(
            state(WorkflowPhase::Completed, true),
            TerminationReason::Completed,
        ))]));

        let events: Vec<_> =
            event_stream(querier, "wf-1".to_string(), config()).collect().await;
        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![EventType::RunStarted, EventType::StateSnapshot, EventType::RunFinished]
        );

        let finished = events.last().expect("finished frame");
        assert_eq!(
            finished.data.as_ref().expect("data")["reason"],
            serde_json::json!("completed")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn phase_transition_emits_step_events_and_delta() {
        let querier = Arc::new(ScriptedQuerier::new(vec![
            Ok(WorkflowResult::in_progress(state(WorkflowPhase::Triage, false))),
            Ok(WorkflowResult::in_progress(state(WorkflowPhase::Analyst, false))),
            Ok(WorkflowResult::finished(
                state(WorkflowPhase::Completed, true),
                TerminationReason::Completed,
            )),
        ]));

        let events: Vec<_> =
            event_stream(querier, "wf-1".to_string(), config()).collect().await;
        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                EventType::RunStarted,
                EventType::StateSnapshot,
                // triage -> analyst
                EventType::StepFinished,
                EventType::StepStarted,
                EventType::StateDelta,
                // analyst -> completed
                EventType::StepFinished,
                EventType::StepStarted,
                EventType::StateDelta,
                EventType::RunFinished,
            ]
        );

        // Deltas carry an empty patch list plus a full schema.
        let delta = events
            .iter()
            .find(|e| e.event_type == EventType::StateDelta)
            .expect("delta frame");
        let data = delta.data.as_ref().expect("data");
        assert_eq!(data["patches"], serde_json::json!([]));
        assert!(data["ui_schema"].is_object());
    }

    #[tokio::test(start_paused = true)]
    async fn read_error_on_connect_is_run_started_then_run_error() {
        let querier = Arc::new(ScriptedQuerier::new(vec![Err("boom".to_string())]));
        let events: Vec<_> =
            event_stream(querier, "wf-404".to_string(), config()).collect().await;
        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::RunStarted, EventType::RunError]);
    }

    #[tokio::test(start_paused = true)]
    async fn mid_stream_read_error_closes_with_run_error() {
        let querier = Arc::new(ScriptedQuerier::new(vec![
            Ok(WorkflowResult::in_progress(state(WorkflowPhase::Triage, false))),
            Err("gone".to_string()),
        ]));

        let events: Vec<_> =
            event_stream(querier, "wf-1".to_string(), config()).collect().await;
        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![EventType::RunStarted, EventType::StateSnapshot, EventType::RunError]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stream_lifetime_is_bounded() {
        // A workflow that never terminates: the stream closes at the
        // configured max duration without a finished frame.
        let querier = Arc::new(ScriptedQuerier::new(vec![Ok(WorkflowResult::in_progress(
            state(WorkflowPhase::HilGate, false),
        ))]));

        let events: Vec<_> = event_stream(
            querier,
            "wf-1".to_string(),
            StreamConfig {
                poll_interval: Duration::from_millis(10),
                max_duration: Duration::from_millis(35),
            },
        )
        .collect()
        .await;

        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(types[0], EventType::RunStarted);
        assert_eq!(types[1], EventType::StateSnapshot);
        assert!(!types.contains(&EventType::RunFinished));
    }
}
