//! Bearer-token authentication middleware.
//!
//! Verification itself lives behind [`TokenVerifier`]; production wires an
//! OIDC-discovery verifier for the configured issuer and audience, tests use
//! [`StaticTokenVerifier`]. When no verifier is configured every request
//! passes. The health endpoint always bypasses auth.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Claims extracted from a verified bearer token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Claims {
    pub subject: String,
    pub tenant_id: String,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Claims, String>;
}

/// Accepts exactly one token. Test double for the OIDC verifier.
pub struct StaticTokenVerifier {
    token: String,
    claims: Claims,
}

impl StaticTokenVerifier {
    pub fn new(token: impl Into<String>, claims: Claims) -> Self {
        Self { token: token.into(), claims }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, String> {
        if token == self.token {
            Ok(self.claims.clone())
        } else {
            Err("token signature mismatch".to_string())
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

pub async fn bearer_auth(
    State(verifier): State<Option<Arc<dyn TokenVerifier>>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(verifier) = verifier else {
        return next.run(request).await;
    };
    if request.uri().path() == "/api/v1/health" {
        return next.run(request).await;
    }

    let Some(header) = request.headers().get(axum::http::header::AUTHORIZATION) else {
        return unauthorized("missing Authorization header");
    };
    let Ok(header) = header.to_str() else {
        return unauthorized("invalid Authorization header format");
    };
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return unauthorized("invalid Authorization header format");
    }

    match verifier.verify(token).await {
        Ok(claims) => {
            let mut request = request;
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(error) => unauthorized(&format!("invalid token: {error}")),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::middleware;
    use axum::routing::get;
    use tower::ServiceExt;

    use super::{Claims, StaticTokenVerifier, TokenVerifier, bearer_auth};

    fn app(verifier: Option<Arc<dyn TokenVerifier>>) -> Router {
        Router::new()
            .route("/api/v1/health", get(|| async { "ok" }))
            .route("/api/v1/workflows", get(|| async { "list" }))
            .layer(middleware::from_fn_with_state(verifier, bearer_auth))
    }

    fn static_verifier() -> Option<Arc<dyn TokenVerifier>> {
        Some(Arc::new(StaticTokenVerifier::new(
            "valid-token",
            Claims { subject: "ops@acme".to_string(), tenant_id: "acme".to_string() },
        )))
    }

    #[tokio::test]
    async fn no_verifier_means_open_access() {
        let response = app(None)
            .oneshot(Request::get("/api/v1/workflows").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_bypasses_auth() {
        let response = app(static_verifier())
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let response = app(static_verifier())
            .oneshot(Request::get("/api/v1/workflows").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_scheme_is_unauthorized() {
        let response = app(static_verifier())
            .oneshot(
                Request::get("/api/v1/workflows")
                    .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_token_is_unauthorized_and_right_token_passes() {
        let app = app(static_verifier());

        let denied = app
            .clone()
            .oneshot(
                Request::get("/api/v1/workflows")
                    .header(header::AUTHORIZATION, "Bearer forged")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .oneshot(
                Request::get("/api/v1/workflows")
                    .header(header::AUTHORIZATION, "Bearer valid-token")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(allowed.status(), StatusCode::OK);
    }
}
