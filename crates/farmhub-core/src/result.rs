//! Convenience result type alias for FarmHub.

use crate::error::AppError;

/// A specialized `Result` type for FarmHub operations.
pub type AppResult<T> = Result<T, AppError>;
