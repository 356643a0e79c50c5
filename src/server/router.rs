use super::service::AuthorizationService;
use crate::metrics::exporter::CONTENT_TYPE;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Join the base path and a route, tolerating a trailing slash or an empty
/// base path.
pub fn route_path(base_path: &str, route: &str) -> String {
    format!("{}/{}", base_path.trim_end_matches('/'), route)
}

/// Build the bouncer routes. Health check routes are left out of access logging.
pub fn build_router(service: Arc<AuthorizationService>, base_path: &str) -> Router {
    let traced = Router::new()
        .route(&route_path(base_path, "forwardAuth"), get(forward_auth))
        .route(&route_path(base_path, "metrics"), get(metrics))
        .layer(TraceLayer::new_for_http());

    Router::new()
        .route(&route_path(base_path, "ping"), get(ping))
        .route(&route_path(base_path, "healthz"), get(healthz))
        .merge(traced)
        .with_state(service)
}

async fn ping(State(service): State<Arc<AuthorizationService>>) -> &'static str {
    service.ping()
}

async fn healthz(State(service): State<Arc<AuthorizationService>>) -> StatusCode {
    service.healthz()
}

async fn forward_auth(
    State(service): State<Arc<AuthorizationService>>,
    headers: HeaderMap,
) -> StatusCode {
    service.forward_auth(&headers)
}

async fn metrics(State(service): State<Arc<AuthorizationService>>) -> Response {
    match service.metrics() {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to export metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
