//! Static API key guard.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use farmhub_core::error::AppError;

use crate::error::ApiError;
use crate::state::AppState;

/// Rejects requests whose key header does not match the configured key.
///
/// An empty configured key turns the guard off.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = &state.config.auth;
    if !auth.is_enabled() {
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(auth.header_name.as_str())
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(key) if key == auth.api_key => Ok(next.run(request).await),
        Some(_) => Err(AppError::authentication("Invalid API key").into()),
        None => Err(AppError::authentication(format!("Missing {} header", auth.header_name)).into()),
    }
}
