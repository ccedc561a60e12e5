//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use farmhub_core::config::AppConfig;
use farmhub_service::RevisionService;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Revision photo pipeline
    pub revisions: Arc<RevisionService>,
}

impl AppState {
    /// Bundle the configuration and the revision service.
    pub fn new(config: AppConfig, revisions: RevisionService) -> Self {
        Self {
            config: Arc::new(config),
            revisions: Arc::new(revisions),
        }
    }
}
