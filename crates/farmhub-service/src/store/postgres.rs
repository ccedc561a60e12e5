//! Store implementations backed by the `farmhub-database` repositories.

use async_trait::async_trait;
use sqlx::PgPool;

use farmhub_core::result::AppResult;
use farmhub_core::types::{FarmId, PhotoId, RevisionId, SectorId};
use farmhub_database::DatabasePool;
use farmhub_database::repositories::{
    FarmRepository, PhotoRepository, RevisionRepository, SectorRepository,
};
use farmhub_entity::catalog::Sector;
use farmhub_entity::revision::{
    NewPhoto, NewRevision, PhotoFinalUpdate, PhotoOrdinalUpdate, Revision, RevisionPhoto,
};

use super::{CatalogStore, RevisionStore};

/// Farms and sectors from Postgres.
#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    farms: FarmRepository,
    sectors: SectorRepository,
}

impl PgCatalogStore {
    /// Create the store over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            farms: FarmRepository::new(pool.clone()),
            sectors: SectorRepository::new(pool),
        }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn farm_exists(&self, farm_id: FarmId) -> AppResult<bool> {
        self.farms.exists(farm_id).await
    }

    async fn find_sector(&self, sector_id: SectorId) -> AppResult<Option<Sector>> {
        self.sectors.find_by_id(sector_id).await
    }
}

/// Revisions and photos in Postgres.
#[derive(Debug, Clone)]
pub struct PgRevisionStore {
    db: DatabasePool,
    revisions: RevisionRepository,
    photos: PhotoRepository,
}

impl PgRevisionStore {
    /// Create the store over a connected pool.
    pub fn new(db: DatabasePool) -> Self {
        let pool = db.pool().clone();
        Self {
            revisions: RevisionRepository::new(pool.clone()),
            photos: PhotoRepository::new(pool),
            db,
        }
    }
}

#[async_trait]
impl RevisionStore for PgRevisionStore {
    async fn reserve_revision_id(&self) -> AppResult<RevisionId> {
        self.revisions.reserve_id().await
    }

    async fn create_revision(
        &self,
        revision: &NewRevision,
        photos: &[NewPhoto],
    ) -> AppResult<(Revision, Vec<RevisionPhoto>)> {
        self.revisions.create_with_photos(revision, photos).await
    }

    async fn find_revision(&self, id: RevisionId) -> AppResult<Option<Revision>> {
        self.revisions.find_by_id(id).await
    }

    async fn list_photos(&self, id: RevisionId) -> AppResult<Vec<RevisionPhoto>> {
        self.photos.list_by_revision(id).await
    }

    async fn count_photos(&self, id: RevisionId) -> AppResult<usize> {
        let count = self.photos.count_by_revision(id).await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn insert_photos(
        &self,
        id: RevisionId,
        photos: &[NewPhoto],
    ) -> AppResult<Vec<RevisionPhoto>> {
        self.photos.insert_many(id, photos).await
    }

    async fn delete_photo(&self, id: RevisionId, photo_id: PhotoId) -> AppResult<bool> {
        self.photos.delete(id, photo_id).await
    }

    async fn apply_ordinals(
        &self,
        id: RevisionId,
        updates: &[PhotoOrdinalUpdate],
    ) -> AppResult<()> {
        self.photos.apply_ordinal_updates(id, updates).await
    }

    async fn finalize(&self, id: RevisionId, updates: &[PhotoFinalUpdate]) -> AppResult<Revision> {
        self.revisions.finalize(id, updates).await
    }

    async fn replace_photos(
        &self,
        id: RevisionId,
        photos: &[NewPhoto],
    ) -> AppResult<Vec<RevisionPhoto>> {
        self.photos.replace_all(id, photos).await
    }

    async fn delete_revision(&self, id: RevisionId) -> AppResult<bool> {
        self.revisions.delete(id).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.db.health_check().await
    }
}
