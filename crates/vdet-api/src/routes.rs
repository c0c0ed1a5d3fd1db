//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    admin_me, annotated_video, create_user, current_user, delete_user, health, list_alerts,
    list_users, login, predict, ready, root, send_alert,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let inference_routes = Router::new()
        .route("/predict", post(predict))
        .route("/annotated/:filename", get(annotated_video));

    let auth_routes = Router::new()
        .route("/token", post(login))
        .route("/users/me/", get(current_user))
        .route("/api/protected", get(current_user));

    let admin_routes = Router::new()
        .route("/admin/users", get(list_users).post(create_user))
        .route("/admin/users/me", get(admin_me))
        .route("/admin/users/:user_id", delete(delete_user));

    let alert_routes = Router::new()
        .route("/send_alert_email", post(send_alert))
        .route("/alerts", get(list_alerts));

    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(inference_routes)
        .merge(auth_routes)
        .merge(admin_routes)
        .merge(alert_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Uploads are bounded by the configured limit rather than axum's default.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
