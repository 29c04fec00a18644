//! Request middleware: request IDs, CORS, and request logging.

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

fn short_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

/// Adds a unique `X-Request-ID` to every response.
pub async fn request_id(request: Request, next: Next) -> Response {
    let id = short_id();
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Applies the configured CORS origin list and answers preflight requests.
pub async fn cors(
    State(origins): State<Vec<String>>,
    request: Request,
    next: Next,
) -> Response {
    let allowed = origins.join(", ");
    let preflight = request.method() == Method::OPTIONS;

    let mut response = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&allowed) {
        headers.insert("access-control-allow-origin", value);
    }
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

/// Logs each request with method, path, status, and duration.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();
    let response = next.run(request).await;
    tracing::info!(
        %method,
        path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    response
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::middleware;
    use axum::routing::get;
    use tower::ServiceExt;

    use super::{REQUEST_ID_HEADER, cors, request_id};

    fn app() -> Router {
        Router::new()
            .route("/api/v1/health", get(|| async { "ok" }))
            .layer(middleware::from_fn(request_id))
            .layer(middleware::from_fn_with_state(
                vec!["https://console.example".to_string()],
                cors,
            ))
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let response = app()
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        let id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .expect("request id header")
            .to_str()
            .expect("ascii");
        assert_eq!(id.len(), 16);
    }

    #[tokio::test]
    async fn request_ids_are_unique_per_request() {
        let app = app();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..8 {
            let response = app
                .clone()
                .oneshot(Request::get("/api/v1/health").body(Body::empty()).expect("request"))
                .await
                .expect("response");
            let id = response.headers()[REQUEST_ID_HEADER].to_str().expect("ascii").to_string();
            assert!(seen.insert(id), "request id repeated");
        }
    }

    #[tokio::test]
    async fn cors_headers_use_configured_origins() {
        let response = app()
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://console.example"
        );
        assert_eq!(
            response.headers()["access-control-allow-methods"],
            "GET, POST, OPTIONS"
        );
    }

    #[tokio::test]
    async fn preflight_short_circuits_with_no_content() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().contains_key("access-control-allow-origin"));
    }
}
