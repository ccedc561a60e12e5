//! # farmhub-api
//!
//! HTTP API layer for FarmHub built on Axum.
//!
//! Exposes the revision photo intake pipeline under `/api`, guarded by a
//! static API key, with CORS, tracing and request logging middleware.

pub mod app;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::build_app;
pub use error::ApiError;
pub use state::AppState;
