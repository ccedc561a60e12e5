//! Application builder: wires router, middleware and state into an Axum app.

use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware as axum_middleware;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::cors::build_cors_layer;
use crate::middleware::logging::request_logging;
use crate::router::build_router;
use crate::state::AppState;

/// Room for multipart boundaries and text fields on top of the archive.
const MULTIPART_SLACK_BYTES: u64 = 1024 * 1024;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    let config = &state.config;
    let body_limit = usize::try_from(
        config
            .intake
            .max_archive_bytes
            .saturating_add(MULTIPART_SLACK_BYTES),
    )
    .unwrap_or(usize::MAX);
    let timeout = Duration::from_secs(config.server.request_timeout_seconds);
    let cors = build_cors_layer(&config.server.cors);

    build_router(state)
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(body_limit)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(request_logging))
                .layer(cors)
                .layer(TimeoutLayer::new(timeout)),
        )
}
