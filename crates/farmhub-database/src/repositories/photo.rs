//! Revision photo repository implementation.

use sqlx::{PgConnection, PgPool};

use farmhub_core::error::{AppError, ErrorKind};
use farmhub_core::result::AppResult;
use farmhub_core::types::{PhotoId, RevisionId};
use farmhub_entity::revision::{NewPhoto, PhotoOrdinalUpdate, RevisionPhoto};

/// Repository for the `revision_photos` table.
#[derive(Debug, Clone)]
pub struct PhotoRepository {
    pool: PgPool,
}

impl PhotoRepository {
    /// Create a new photo repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List the photos of a revision ordered by ordinal.
    pub async fn list_by_revision(&self, revision_id: RevisionId) -> AppResult<Vec<RevisionPhoto>> {
        sqlx::query_as::<_, RevisionPhoto>(
            "SELECT * FROM revision_photos WHERE revision_id = $1 ORDER BY ordinal ASC",
        )
        .bind(revision_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list photos", e))
    }

    /// Count the photos of a revision.
    pub async fn count_by_revision(&self, revision_id: RevisionId) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM revision_photos WHERE revision_id = $1")
            .bind(revision_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count photos", e))
    }

    /// Insert staging photos in one transaction.
    pub async fn insert_many(
        &self,
        revision_id: RevisionId,
        photos: &[NewPhoto],
    ) -> AppResult<Vec<RevisionPhoto>> {
        let mut tx = self.pool.begin().await.map_err(begin_failed)?;
        let inserted = Self::insert_in_tx(&mut *tx, revision_id, photos).await?;
        Self::touch_revision(&mut *tx, revision_id).await?;
        tx.commit().await.map_err(commit_failed)?;
        Ok(inserted)
    }

    /// Delete a single photo of a revision. Returns `false` if no row matched.
    pub async fn delete(&self, revision_id: RevisionId, photo_id: PhotoId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM revision_photos WHERE id = $1 AND revision_id = $2")
            .bind(photo_id)
            .bind(revision_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete photo", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a reindex plan: every listed photo gets its new ordinal and key
    /// in a single transaction.
    pub async fn apply_ordinal_updates(
        &self,
        revision_id: RevisionId,
        updates: &[PhotoOrdinalUpdate],
    ) -> AppResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = updates.iter().map(|u| u.photo_id.get()).collect();
        let ordinals: Vec<i32> = updates.iter().map(|u| u.ordinal).collect();
        let keys: Vec<String> = updates.iter().map(|u| u.storage_key.clone()).collect();

        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        sqlx::query("SET CONSTRAINTS revision_photos_ordinal_key DEFERRED")
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to defer constraint", e))?;

        let result = sqlx::query(
            "UPDATE revision_photos AS p \
             SET ordinal = u.ordinal, storage_key = u.storage_key \
             FROM UNNEST($2::BIGINT[], $3::INT[], $4::TEXT[]) AS u(id, ordinal, storage_key) \
             WHERE p.id = u.id AND p.revision_id = $1",
        )
        .bind(revision_id)
        .bind(&ids)
        .bind(&ordinals)
        .bind(&keys)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update ordinals", e))?;

        if result.rows_affected() != updates.len() as u64 {
            return Err(AppError::conflict(format!(
                "Reindex of revision {revision_id} touched {} of {} photos",
                result.rows_affected(),
                updates.len()
            )));
        }

        Self::touch_revision(&mut *tx, revision_id).await?;
        tx.commit().await.map_err(commit_failed)?;
        Ok(())
    }

    /// Delete every photo row of a revision and insert `photos` in their place.
    pub async fn replace_all(
        &self,
        revision_id: RevisionId,
        photos: &[NewPhoto],
    ) -> AppResult<Vec<RevisionPhoto>> {
        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        sqlx::query("DELETE FROM revision_photos WHERE revision_id = $1")
            .bind(revision_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to clear photos", e))?;

        let inserted = Self::insert_in_tx(&mut *tx, revision_id, photos).await?;
        Self::touch_revision(&mut *tx, revision_id).await?;
        tx.commit().await.map_err(commit_failed)?;
        Ok(inserted)
    }

    /// Bump the owning revision's `updated_at` inside the photo-set change.
    async fn touch_revision(conn: &mut PgConnection, revision_id: RevisionId) -> AppResult<()> {
        sqlx::query("UPDATE revisions SET updated_at = NOW() WHERE id = $1")
            .bind(revision_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to touch revision", e))?;
        Ok(())
    }

    /// Insert staging photos on an open connection or transaction.
    pub async fn insert_in_tx(
        conn: &mut PgConnection,
        revision_id: RevisionId,
        photos: &[NewPhoto],
    ) -> AppResult<Vec<RevisionPhoto>> {
        if photos.is_empty() {
            return Ok(Vec::new());
        }

        let ordinals: Vec<i32> = photos.iter().map(|p| p.ordinal).collect();
        let keys: Vec<String> = photos.iter().map(|p| p.storage_key.clone()).collect();
        let names: Vec<String> = photos.iter().map(|p| p.original_filename.clone()).collect();

        let mut inserted = sqlx::query_as::<_, RevisionPhoto>(
            "INSERT INTO revision_photos (revision_id, ordinal, storage_key, original_filename) \
             SELECT $1, u.ordinal, u.storage_key, u.original_filename \
             FROM UNNEST($2::INT[], $3::TEXT[], $4::TEXT[]) \
                 WITH ORDINALITY AS u(ordinal, storage_key, original_filename, pos) \
             ORDER BY u.pos \
             RETURNING *",
        )
        .bind(revision_id)
        .bind(&ordinals)
        .bind(&keys)
        .bind(&names)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert photos", e))?;

        inserted.sort_by_key(|p| p.ordinal);
        Ok(inserted)
    }
}

pub(crate) fn begin_failed(e: sqlx::Error) -> AppError {
    AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
}

pub(crate) fn commit_failed(e: sqlx::Error) -> AppError {
    AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
}
