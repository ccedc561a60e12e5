//! Route definitions for the FarmHub HTTP API.
//!
//! All routes are mounted under `/api`. Everything except the health check
//! sits behind the API key guard.

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the API router and thread `AppState` through every route.
pub fn build_router(state: AppState) -> Router {
    let guarded = revision_routes().route_layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::api_key::require_api_key,
    ));

    let api_routes = Router::new().merge(health_routes()).merge(guarded);

    Router::new().nest("/api", api_routes).with_state(state)
}

/// Liveness and backend checks
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

/// Revision lifecycle and photo management
fn revision_routes() -> Router<AppState> {
    Router::new()
        .route("/revisions", post(handlers::revision::create_revision))
        .route("/revisions/inspect", post(handlers::revision::inspect_archive))
        .route(
            "/revisions/{id}",
            get(handlers::revision::get_revision).delete(handlers::revision::delete_revision),
        )
        .route(
            "/revisions/{id}/photos",
            get(handlers::revision::list_photos).post(handlers::revision::add_photos),
        )
        .route(
            "/revisions/{id}/photos/archive",
            put(handlers::revision::replace_photos),
        )
        .route(
            "/revisions/{id}/photos/{photo_id}",
            delete(handlers::revision::delete_photo),
        )
        .route(
            "/revisions/{id}/validate",
            post(handlers::revision::validate_count),
        )
        .route("/revisions/{id}/reindex", post(handlers::revision::reindex))
        .route("/revisions/{id}/finalize", post(handlers::revision::finalize))
}
