//! Farm repository implementation.

use sqlx::PgPool;

use farmhub_core::error::{AppError, ErrorKind};
use farmhub_core::result::AppResult;
use farmhub_core::types::FarmId;
use farmhub_entity::catalog::Farm;

/// Read-only access to the `farms` table.
#[derive(Debug, Clone)]
pub struct FarmRepository {
    pool: PgPool,
}

impl FarmRepository {
    /// Create a new farm repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a farm by ID.
    pub async fn find_by_id(&self, id: FarmId) -> AppResult<Option<Farm>> {
        sqlx::query_as::<_, Farm>("SELECT id, name FROM farms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find farm", e))
    }

    /// Check whether a farm exists.
    pub async fn exists(&self, id: FarmId) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM farms WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check farm", e))
    }
}
