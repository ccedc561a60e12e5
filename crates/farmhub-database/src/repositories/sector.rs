//! Sector repository implementation.

use sqlx::PgPool;

use farmhub_core::error::{AppError, ErrorKind};
use farmhub_core::result::AppResult;
use farmhub_core::types::SectorId;
use farmhub_entity::catalog::Sector;

/// Read-only access to the `sectors` table.
#[derive(Debug, Clone)]
pub struct SectorRepository {
    pool: PgPool,
}

impl SectorRepository {
    /// Create a new sector repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a sector by ID.
    pub async fn find_by_id(&self, id: SectorId) -> AppResult<Option<Sector>> {
        sqlx::query_as::<_, Sector>(
            "SELECT id, farm_id, name, plant_count FROM sectors WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find sector", e))
    }
}
