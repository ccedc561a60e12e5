//! Persistence contracts used by the revision pipeline.

pub mod postgres;

#[cfg(any(test, feature = "memory-store"))]
pub mod memory;

use async_trait::async_trait;

use farmhub_core::result::AppResult;
use farmhub_core::types::{FarmId, PhotoId, RevisionId, SectorId};
use farmhub_entity::catalog::Sector;
use farmhub_entity::revision::{
    NewPhoto, NewRevision, PhotoFinalUpdate, PhotoOrdinalUpdate, Revision, RevisionPhoto,
};

pub use postgres::{PgCatalogStore, PgRevisionStore};

/// Read access to farms and sectors, which another system owns.
#[async_trait]
pub trait CatalogStore: Send + Sync + std::fmt::Debug + 'static {
    /// Whether the farm exists.
    async fn farm_exists(&self, farm_id: FarmId) -> AppResult<bool>;

    /// Look up a sector, including its owner and registered plant count.
    async fn find_sector(&self, sector_id: SectorId) -> AppResult<Option<Sector>>;
}

/// Storage of revisions and their photo rows.
///
/// Every method that touches more than one row is atomic.
#[async_trait]
pub trait RevisionStore: Send + Sync + std::fmt::Debug + 'static {
    /// Allocate a revision id before the revision row exists.
    async fn reserve_revision_id(&self) -> AppResult<RevisionId>;

    /// Insert a revision with its initial photos.
    async fn create_revision(
        &self,
        revision: &NewRevision,
        photos: &[NewPhoto],
    ) -> AppResult<(Revision, Vec<RevisionPhoto>)>;

    /// Find a revision.
    async fn find_revision(&self, id: RevisionId) -> AppResult<Option<Revision>>;

    /// Photos of a revision ordered by ordinal.
    async fn list_photos(&self, id: RevisionId) -> AppResult<Vec<RevisionPhoto>>;

    /// Number of photos in a revision.
    async fn count_photos(&self, id: RevisionId) -> AppResult<usize>;

    /// Append staging photos.
    async fn insert_photos(
        &self,
        id: RevisionId,
        photos: &[NewPhoto],
    ) -> AppResult<Vec<RevisionPhoto>>;

    /// Delete one photo row. Returns `false` if it did not exist.
    async fn delete_photo(&self, id: RevisionId, photo_id: PhotoId) -> AppResult<bool>;

    /// Apply new ordinals and keys to the listed photos.
    async fn apply_ordinals(&self, id: RevisionId, updates: &[PhotoOrdinalUpdate])
    -> AppResult<()>;

    /// Label and relocate every photo and mark the revision `FINALIZADA`.
    async fn finalize(&self, id: RevisionId, updates: &[PhotoFinalUpdate]) -> AppResult<Revision>;

    /// Swap the revision's photo rows for a new set.
    async fn replace_photos(
        &self,
        id: RevisionId,
        photos: &[NewPhoto],
    ) -> AppResult<Vec<RevisionPhoto>>;

    /// Delete a revision and, by cascade, its photo rows.
    async fn delete_revision(&self, id: RevisionId) -> AppResult<bool>;

    /// Check the backing store is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
