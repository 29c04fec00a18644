//! Versioned HTTP API under `/api/v1`.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;

use finops_core::domain::{CostAnomaly, TenantContext, validate_anomaly, validate_tenant};
use finops_core::uischema;
use finops_engine::activities::ApprovalResponse;
use finops_engine::lifecycle::WorkflowInput;
use finops_engine::querier::{ListOptions, WorkflowQuerier};
use finops_engine::queues::QUEUE_ANOMALY;
use finops_engine::runtime::WorkflowRuntime;

use crate::auth::{TokenVerifier, bearer_auth};
use crate::middleware::{cors, request_id, request_logging};
use crate::stream::{StreamConfig, sse_response};

#[derive(Clone)]
pub struct AppState {
    pub querier: Arc<dyn WorkflowQuerier>,
    pub runtime: Arc<WorkflowRuntime>,
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    pub cors_origins: Vec<String>,
    pub stream: StreamConfig,
}

pub fn router(state: AppState) -> Router {
    let verifier = state.verifier.clone();
    let origins = state.cors_origins.clone();

    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/workflows", get(handle_list_workflows).post(handle_trigger))
        .route("/api/v1/workflows/:id", get(handle_get_workflow))
        .route("/api/v1/workflows/:id/ui", get(handle_get_workflow_ui))
        .route("/api/v1/workflows/:id/stream", get(handle_stream))
        .route("/api/v1/workflows/:id/approve", post(handle_approve))
        .route("/api/v1/workflows/:id/deny", post(handle_deny))
        .layer(middleware::from_fn_with_state(verifier, bearer_auth))
        .layer(middleware::from_fn_with_state(origins, cors))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message.into() }))).into_response()
}

fn internal_error(message: impl Into<String>) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message.into() })))
        .into_response()
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    status: String,
}

async fn handle_list_workflows(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let opts = ListOptions {
        task_queue: QUEUE_ANOMALY.to_string(),
        status_filter: query.status,
    };
    match state.querier.list_workflows(opts).await {
        Ok(workflows) => Json(workflows).into_response(),
        Err(error) => internal_error(error.to_string()),
    }
}

async fn handle_get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.querier.get_workflow_state(&id).await {
        Ok(result) => Json(result).into_response(),
        Err(error) => internal_error(error.to_string()),
    }
}

async fn handle_get_workflow_ui(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.querier.get_workflow_state(&id).await {
        Ok(result) => Json(uischema::build(&result.state)).into_response(),
        Err(error) => internal_error(error.to_string()),
    }
}

async fn handle_stream(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    sse_response(Arc::clone(&state.querier), id, state.stream).into_response()
}

#[derive(Debug, Deserialize)]
struct ApprovalBody {
    #[serde(default)]
    by: String,
    #[serde(default)]
    reason: String,
}

async fn handle_approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Json<ApprovalBody>,
) -> Response {
    handle_approval_action(state, id, body.0, true).await
}

async fn handle_deny(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Json<ApprovalBody>,
) -> Response {
    handle_approval_action(state, id, body.0, false).await
}

async fn handle_approval_action(
    state: AppState,
    id: String,
    body: ApprovalBody,
    approved: bool,
) -> Response {
    if body.by.is_empty() {
        return bad_request("'by' field is required");
    }

    let response = ApprovalResponse { approved, by: body.by, reason: body.reason };
    match state.querier.submit_approval(&id, response).await {
        Ok(result) => Json(json!({ "result": result })).into_response(),
        Err(error) => internal_error(error.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct TriggerRequest {
    tenant_id: String,
    service: String,
    #[serde(default)]
    account_id: String,
    delta_dollars: f64,
    #[serde(default)]
    delta_percent: f64,
    #[serde(default)]
    window_start: String,
    #[serde(default)]
    window_end: String,
}

async fn handle_trigger(
    State(state): State<AppState>,
    Json(request): Json<TriggerRequest>,
) -> Response {
    let tenant = TenantContext::new(request.tenant_id.clone());
    if let Err(failure) = validate_tenant(&tenant) {
        return bad_request(failure.to_string());
    }

    let mut anomaly = CostAnomaly::new();
    anomaly.service = request.service;
    anomaly.account_id = request.account_id;
    anomaly.delta_dollars = request.delta_dollars;
    anomaly.delta_percent = request.delta_percent;
    if let Err(failure) = validate_anomaly(&anomaly) {
        return bad_request(failure.to_string());
    }

    let workflow_id = format!("finops-anomaly-{}-{}", tenant.tenant_id, anomaly.anomaly_id);
    let input = WorkflowInput {
        tenant,
        anomaly: Some(anomaly),
        window_start: request.window_start,
        window_end: request.window_end,
    };

    match state.runtime.start_anomaly_lifecycle(QUEUE_ANOMALY, workflow_id.clone(), input).await {
        Ok(handle) => Json(json!({ "workflow_id": workflow_id, "run_id": handle.run_id }))
            .into_response(),
        Err(error) => internal_error(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tokio::sync::watch;
    use tower::ServiceExt;

    use finops_core::ratelimit::ServiceLimiter;
    use finops_core::triage::testing::{StubCost, StubInfra};
    use finops_engine::activities::Activities;
    use finops_engine::querier::RuntimeQuerier;
    use finops_engine::queues::parse_queues;
    use finops_engine::runtime::WorkflowRuntime;
    use finops_engine::worker::WorkerPool;

    use super::{AppState, router};
    use crate::stream::StreamConfig;

    fn test_app() -> (Router, watch::Sender<bool>) {
        let activities = Activities {
            cost: Arc::new(StubCost {
                cur_line_items: vec![
                    json!({"line_item_usage_type": "DataTransfer-Out", "unblended_cost": 250.0}),
                ],
                ..StubCost::default()
            }),
            infra: Arc::new(StubInfra::default()),
            kubecost: None,
            waste: None,
            tenants: None,
            limiter: Arc::new(ServiceLimiter::default()),
            budget: None,
        };
        let selected = parse_queues("anomaly").expect("parse");
        let pool = Arc::new(WorkerPool::new(&selected).expect("pool"));
        let (tx, rx) = watch::channel(false);
        let runtime = WorkflowRuntime::new(Arc::new(activities), pool, rx);
        let state = AppState {
            querier: Arc::new(RuntimeQuerier::new(runtime.store.clone())),
            runtime,
            verifier: None,
            cors_origins: vec!["*".to_string()],
            stream: StreamConfig::default(),
        };
        (router(state), tx)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _tx) = test_app();
        let response = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn trigger_starts_workflow_with_id_scheme() {
        let (app, _tx) = test_app();
        let response = app
            .oneshot(post_json(
                "/api/v1/workflows",
                json!({
                    "tenant_id": "acme",
                    "service": "EC2",
                    "account_id": "123456789012",
                    "delta_dollars": 750.0,
                    "delta_percent": 25.0,
                }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let workflow_id = body["workflow_id"].as_str().expect("workflow id");
        assert!(workflow_id.starts_with("finops-anomaly-acme-"));
        assert!(body["run_id"].as_str().expect("run id").len() == 36);
    }

    #[tokio::test]
    async fn trigger_rejects_invalid_account() {
        let (app, _tx) = test_app();
        let response = app
            .oneshot(post_json(
                "/api/v1/workflows",
                json!({
                    "tenant_id": "acme",
                    "service": "EC2",
                    "account_id": "12345",
                    "delta_dollars": 750.0,
                }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn workflow_state_and_ui_are_queryable_after_trigger() {
        let (app, _tx) = test_app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/workflows",
                json!({
                    "tenant_id": "acme",
                    "service": "EC2",
                    "account_id": "123456789012",
                    "delta_dollars": 750.0,
                    "delta_percent": 25.0,
                }),
            ))
            .await
            .expect("trigger response");
        let workflow_id =
            body_json(response).await["workflow_id"].as_str().expect("id").to_string();

        // The stub workflow runs to completion quickly; poll until the
        // snapshot reports termination.
        let state = loop {
            let response = app
                .clone()
                .oneshot(
                    Request::get(format!("/api/v1/workflows/{workflow_id}"))
                        .body(Body::empty())
                        .expect("request"),
                )
                .await
                .expect("state response");
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            if body["state"]["should_terminate"] == json!(true) {
                break body;
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(state["reason"], json!("completed"));

        let ui = app
            .clone()
            .oneshot(
                Request::get(format!("/api/v1/workflows/{workflow_id}/ui"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("ui response");
        assert_eq!(ui.status(), StatusCode::OK);
        let schema = body_json(ui).await;
        assert_eq!(schema["ui_schema_version"], json!("v1"));
        assert_eq!(schema["workflow_id"], json!(workflow_id));
        assert!(schema["components"].as_array().expect("components").len() >= 2);

        let listed = app
            .oneshot(
                Request::get("/api/v1/workflows?status=completed")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("list response");
        let workflows = body_json(listed).await;
        assert_eq!(workflows.as_array().expect("array").len(), 1);
    }

    #[tokio::test]
    async fn unknown_workflow_is_a_500_with_error_text() {
        let (app, _tx) = test_app();
        let response = app
            .oneshot(
                Request::get("/api/v1/workflows/wf-404").body(Body::empty()).expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body_json(response).await["error"]
                .as_str()
                .expect("error text")
                .contains("wf-404")
        );
    }

    #[tokio::test]
    async fn approve_requires_by_field() {
        let (app, _tx) = test_app();
        let response = app
            .oneshot(post_json("/api/v1/workflows/wf-1/approve", json!({ "reason": "go" })))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn approve_on_non_pending_workflow_surfaces_rejection() {
        let (app, _tx) = test_app();
        let response = app
            .oneshot(post_json(
                "/api/v1/workflows/wf-404/approve",
                json!({ "by": "ops", "reason": "" }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
