//! Revision repository implementation.

use sqlx::PgPool;

use farmhub_core::error::{AppError, ErrorKind};
use farmhub_core::result::AppResult;
use farmhub_core::types::RevisionId;
use farmhub_entity::revision::{NewPhoto, NewRevision, PhotoFinalUpdate, Revision, RevisionPhoto};

use super::photo::{PhotoRepository, begin_failed, commit_failed};

/// Repository for the `revisions` table and the operations that change a
/// revision together with its photos.
#[derive(Debug, Clone)]
pub struct RevisionRepository {
    pool: PgPool,
}

impl RevisionRepository {
    /// Create a new revision repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Take the next value of the revision id sequence without inserting.
    ///
    /// Photos are written under the reserved id before the row exists.
    pub async fn reserve_id(&self) -> AppResult<RevisionId> {
        sqlx::query_scalar::<_, i64>("SELECT nextval(pg_get_serial_sequence('revisions', 'id'))")
            .fetch_one(&self.pool)
            .await
            .map(RevisionId)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reserve revision id", e))
    }

    /// Find a revision by ID.
    pub async fn find_by_id(&self, id: RevisionId) -> AppResult<Option<Revision>> {
        sqlx::query_as::<_, Revision>("SELECT * FROM revisions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find revision", e))
    }

    /// Insert a revision and its photos atomically.
    pub async fn create_with_photos(
        &self,
        revision: &NewRevision,
        photos: &[NewPhoto],
    ) -> AppResult<(Revision, Vec<RevisionPhoto>)> {
        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        let created = sqlx::query_as::<_, Revision>(
            "INSERT INTO revisions \
             (id, farm_id, sector_id, revision_date, revision_type, expected_photo_count) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(revision.id)
        .bind(revision.farm_id)
        .bind(revision.sector_id)
        .bind(revision.revision_date)
        .bind(&revision.revision_type)
        .bind(revision.expected_photo_count)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create revision", e))?;

        let photos = PhotoRepository::insert_in_tx(&mut *tx, created.id, photos).await?;

        tx.commit().await.map_err(commit_failed)?;
        Ok((created, photos))
    }

    /// Label every photo, move it to its final key, and mark the revision
    /// `FINALIZADA`, all in one transaction.
    pub async fn finalize(
        &self,
        revision_id: RevisionId,
        updates: &[PhotoFinalUpdate],
    ) -> AppResult<Revision> {
        let ids: Vec<i64> = updates.iter().map(|u| u.photo_id.get()).collect();
        let labels: Vec<String> = updates.iter().map(|u| u.plant_label.clone()).collect();
        let keys: Vec<String> = updates.iter().map(|u| u.storage_key.clone()).collect();

        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        let result = sqlx::query(
            "UPDATE revision_photos AS p \
             SET plant_label = u.plant_label, storage_key = u.storage_key, state = 'FINAL' \
             FROM UNNEST($2::BIGINT[], $3::TEXT[], $4::TEXT[]) AS u(id, plant_label, storage_key) \
             WHERE p.id = u.id AND p.revision_id = $1",
        )
        .bind(revision_id)
        .bind(&ids)
        .bind(&labels)
        .bind(&keys)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to label photos", e))?;

        if result.rows_affected() != updates.len() as u64 {
            return Err(AppError::conflict(format!(
                "Finalize of revision {revision_id} touched {} of {} photos",
                result.rows_affected(),
                updates.len()
            )));
        }

        let revision = sqlx::query_as::<_, Revision>(
            "UPDATE revisions SET state = 'FINALIZADA', updated_at = NOW() \
             WHERE id = $1 AND state = 'STAGING' RETURNING *",
        )
        .bind(revision_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to finalize revision", e))?
        .ok_or_else(|| {
            AppError::conflict(format!("Revision {revision_id} is no longer in STAGING"))
        })?;

        tx.commit().await.map_err(commit_failed)?;
        Ok(revision)
    }

    /// Delete a revision; its photo rows cascade. Returns `false` if absent.
    pub async fn delete(&self, id: RevisionId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM revisions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete revision", e))?;
        Ok(result.rows_affected() > 0)
    }
}
