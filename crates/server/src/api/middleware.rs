//! Authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use spotlight_core::{AuthError, AuthRequest, Identity};

use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Run the configured gate and attach the resulting [`Identity`].
///
/// Rejected requests get 401 and never reach a handler.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    match state
        .authenticator()
        .authenticate(&AuthRequest { headers })
        .await
    {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(AuthError::NotAuthenticated) => {
            AUTH_FAILURES_TOTAL.with_label_values(&["not_authenticated"]).inc();
            Err(StatusCode::UNAUTHORIZED)
        }
        Err(AuthError::InvalidCredentials(_)) => {
            AUTH_FAILURES_TOTAL.with_label_values(&["invalid_credentials"]).inc();
            Err(StatusCode::UNAUTHORIZED)
        }
        Err(e) => {
            tracing::error!(error = %e, "Authenticator failed");
            AUTH_FAILURES_TOTAL.with_label_values(&["internal_error"]).inc();
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Admin name of the authenticated caller.
///
/// Falls back to "anonymous" if no identity is present (only when a route
/// is mounted without the auth middleware).
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let admin = parts
            .extensions
            .get::<Identity>()
            .map(|id| id.admin.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        std::future::ready(Ok(AuthUser(admin)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::header,
        middleware,
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use spotlight_core::{
        create_audit_system, AdminKeyGate, AuditStore, Authenticator, CampaignEngine, Config,
        OpenGate, PackageCatalog, SqliteAuditStore, SqliteCampaignStore, SqliteOrderSetStore,
        SqliteOrderStore, SqlitePlaylistDirectory, SqlitePurchaseLogStore, SubmissionService,
    };
    use tower::ServiceExt;

    async fn user_handler(AuthUser(admin): AuthUser) -> String {
        admin
    }

    fn create_test_state(authenticator: Arc<dyn Authenticator>) -> Arc<AppState> {
        let config: Config = toml_config();
        let audit_store =
            Arc::new(SqliteAuditStore::in_memory().unwrap()) as Arc<dyn AuditStore>;
        let (audit_handle, _writer) = create_audit_system(audit_store.clone(), 100);
        let submissions = SubmissionService::new(
            None,
            Arc::new(SqliteOrderSetStore::in_memory().unwrap()),
            Arc::new(SqlitePurchaseLogStore::in_memory().unwrap()),
        );
        let engine = CampaignEngine::new(
            config.engine.clone(),
            Arc::new(SqliteCampaignStore::in_memory().unwrap()),
            Arc::new(SqliteOrderStore::in_memory().unwrap()),
            Arc::new(SqlitePlaylistDirectory::in_memory().unwrap()),
            PackageCatalog::defaults_only(),
            submissions,
        )
        .with_audit(audit_handle);

        Arc::new(AppState::new(
            config,
            authenticator,
            audit_store,
            Arc::new(engine),
        ))
    }

    fn toml_config() -> Config {
        spotlight_core::load_config_from_str("[auth]\nmethod = \"none\"\n").unwrap()
    }

    fn app(authenticator: Arc<dyn Authenticator>) -> Router {
        let state = create_test_state(authenticator);
        Router::new()
            .route("/test", get(user_handler))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    fn key_gate() -> Arc<dyn Authenticator> {
        Arc::new(AdminKeyGate::new("secret-key", "ops"))
    }

    async fn body_text(response: Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_open_gate_uses_console_identity() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(Arc::new(OpenGate)).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "console");
    }

    #[tokio::test]
    async fn test_api_key_bearer() {
        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer secret-key")
            .body(Body::empty())
            .unwrap();
        let response = app(key_gate()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ops");
    }

    #[tokio::test]
    async fn test_x_api_key_header() {
        let request = Request::builder()
            .uri("/test")
            .header("X-API-Key", "secret-key")
            .body(Body::empty())
            .unwrap();
        let response = app(key_gate()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_key_invalid() {
        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer wrong-key")
            .body(Body::empty())
            .unwrap();
        let response = app(key_gate()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_api_key_missing() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(key_gate()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
