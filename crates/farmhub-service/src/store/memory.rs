//! In-memory stores for tests and local experiments.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use farmhub_core::error::AppError;
use farmhub_core::result::AppResult;
use farmhub_core::types::{FarmId, PhotoId, RevisionId, SectorId};
use farmhub_entity::catalog::{Farm, Sector};
use farmhub_entity::revision::{
    NewPhoto, NewRevision, PhotoFinalUpdate, PhotoOrdinalUpdate, PhotoState, Revision,
    RevisionPhoto, RevisionState,
};

use super::{CatalogStore, RevisionStore};

/// Farms and sectors held in memory.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    farms: Mutex<HashMap<FarmId, Farm>>,
    sectors: Mutex<HashMap<SectorId, Sector>>,
}

impl MemoryCatalogStore {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a farm.
    pub async fn add_farm(&self, id: i64, name: &str) -> FarmId {
        let id = FarmId(id);
        self.farms.lock().await.insert(
            id,
            Farm {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    /// Register a sector of a farm.
    pub async fn add_sector(&self, id: i64, farm_id: FarmId, plant_count: i32) -> SectorId {
        let id = SectorId(id);
        self.sectors.lock().await.insert(
            id,
            Sector {
                id,
                farm_id,
                name: format!("Sector {id}"),
                plant_count,
            },
        );
        id
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn farm_exists(&self, farm_id: FarmId) -> AppResult<bool> {
        Ok(self.farms.lock().await.contains_key(&farm_id))
    }

    async fn find_sector(&self, sector_id: SectorId) -> AppResult<Option<Sector>> {
        Ok(self.sectors.lock().await.get(&sector_id).cloned())
    }
}

#[derive(Debug, Default)]
struct Tables {
    revisions: BTreeMap<RevisionId, Revision>,
    photos: BTreeMap<PhotoId, RevisionPhoto>,
}

impl Tables {
    fn photos_of(&self, id: RevisionId) -> Vec<RevisionPhoto> {
        let mut photos: Vec<_> = self
            .photos
            .values()
            .filter(|p| p.revision_id == id)
            .cloned()
            .collect();
        photos.sort_by_key(|p| p.ordinal);
        photos
    }

    fn insert(
        &mut self,
        id: RevisionId,
        photos: &[NewPhoto],
        next_id: &AtomicI64,
    ) -> Vec<RevisionPhoto> {
        let now = Utc::now();
        let mut inserted = Vec::with_capacity(photos.len());
        for photo in photos {
            let row = RevisionPhoto {
                id: PhotoId(next_id.fetch_add(1, Ordering::SeqCst)),
                revision_id: id,
                ordinal: photo.ordinal,
                state: PhotoState::Staging,
                plant_label: None,
                storage_key: photo.storage_key.clone(),
                original_filename: photo.original_filename.clone(),
                created_at: now,
            };
            self.photos.insert(row.id, row.clone());
            inserted.push(row);
        }
        inserted.sort_by_key(|p| p.ordinal);
        inserted
    }

    fn owns_all(&self, id: RevisionId, mut photo_ids: impl Iterator<Item = PhotoId>) -> bool {
        photo_ids.all(|photo_id| {
            self.photos
                .get(&photo_id)
                .is_some_and(|p| p.revision_id == id)
        })
    }

    fn touch(&mut self, id: RevisionId) {
        if let Some(revision) = self.revisions.get_mut(&id) {
            revision.updated_at = Utc::now();
        }
    }

    fn ordinals_unique(&self, id: RevisionId) -> bool {
        let photos = self.photos_of(id);
        photos.windows(2).all(|w| w[0].ordinal != w[1].ordinal)
    }
}

/// Revisions and photos held in memory, with the same atomicity as the
/// Postgres store: each call either applies fully or not at all.
#[derive(Debug)]
pub struct MemoryRevisionStore {
    tables: Mutex<Tables>,
    next_revision: AtomicI64,
    next_photo: AtomicI64,
    fail_next_write: AtomicBool,
}

impl Default for MemoryRevisionStore {
    fn default() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            next_revision: AtomicI64::new(1),
            next_photo: AtomicI64::new(1),
            fail_next_write: AtomicBool::new(false),
        }
    }
}

impl MemoryRevisionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next mutating call fail as a lost database commit would.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Number of revision rows.
    pub async fn revision_count(&self) -> usize {
        self.tables.lock().await.revisions.len()
    }

    fn check_write(&self) -> AppResult<()> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(AppError::database("Simulated commit failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RevisionStore for MemoryRevisionStore {
    async fn reserve_revision_id(&self) -> AppResult<RevisionId> {
        Ok(RevisionId(self.next_revision.fetch_add(1, Ordering::SeqCst)))
    }

    async fn create_revision(
        &self,
        revision: &NewRevision,
        photos: &[NewPhoto],
    ) -> AppResult<(Revision, Vec<RevisionPhoto>)> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        if tables.revisions.contains_key(&revision.id) {
            return Err(AppError::conflict(format!("Revision {} exists", revision.id)));
        }

        let now = Utc::now();
        let created = Revision {
            id: revision.id,
            farm_id: revision.farm_id,
            sector_id: revision.sector_id,
            revision_date: revision.revision_date,
            revision_type: revision.revision_type.clone(),
            expected_photo_count: revision.expected_photo_count,
            state: RevisionState::Staging,
            created_at: now,
            updated_at: now,
        };
        tables.revisions.insert(created.id, created.clone());
        let photos = tables.insert(created.id, photos, &self.next_photo);
        Ok((created, photos))
    }

    async fn find_revision(&self, id: RevisionId) -> AppResult<Option<Revision>> {
        Ok(self.tables.lock().await.revisions.get(&id).cloned())
    }

    async fn list_photos(&self, id: RevisionId) -> AppResult<Vec<RevisionPhoto>> {
        Ok(self.tables.lock().await.photos_of(id))
    }

    async fn count_photos(&self, id: RevisionId) -> AppResult<usize> {
        let tables = self.tables.lock().await;
        Ok(tables.photos.values().filter(|p| p.revision_id == id).count())
    }

    async fn insert_photos(
        &self,
        id: RevisionId,
        photos: &[NewPhoto],
    ) -> AppResult<Vec<RevisionPhoto>> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        if !tables.revisions.contains_key(&id) {
            return Err(AppError::not_found(format!("Revision {id} not found")));
        }
        let existing: Vec<i32> = tables.photos_of(id).iter().map(|p| p.ordinal).collect();
        if photos.iter().any(|p| existing.contains(&p.ordinal)) {
            return Err(AppError::conflict("Duplicate ordinal"));
        }
        let inserted = tables.insert(id, photos, &self.next_photo);
        tables.touch(id);
        Ok(inserted)
    }

    async fn delete_photo(&self, id: RevisionId, photo_id: PhotoId) -> AppResult<bool> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        match tables.photos.get(&photo_id) {
            Some(photo) if photo.revision_id == id => {
                tables.photos.remove(&photo_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_ordinals(
        &self,
        id: RevisionId,
        updates: &[PhotoOrdinalUpdate],
    ) -> AppResult<()> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        if !tables.owns_all(id, updates.iter().map(|u| u.photo_id)) {
            return Err(AppError::conflict("Reindex touched an unknown photo"));
        }

        let snapshot = tables.photos.clone();
        for update in updates {
            if let Some(photo) = tables.photos.get_mut(&update.photo_id) {
                photo.ordinal = update.ordinal;
                photo.storage_key = update.storage_key.clone();
            }
        }
        if !tables.ordinals_unique(id) {
            tables.photos = snapshot;
            return Err(AppError::conflict("Reindex produced duplicate ordinals"));
        }
        tables.touch(id);
        Ok(())
    }

    async fn finalize(&self, id: RevisionId, updates: &[PhotoFinalUpdate]) -> AppResult<Revision> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        let is_staging = tables
            .revisions
            .get(&id)
            .map(|r| r.state == RevisionState::Staging)
            .unwrap_or(false);
        if !is_staging {
            return Err(AppError::conflict(format!("Revision {id} is no longer in STAGING")));
        }

        if !tables.owns_all(id, updates.iter().map(|u| u.photo_id)) {
            return Err(AppError::conflict("Finalize touched an unknown photo"));
        }

        for update in updates {
            if let Some(photo) = tables.photos.get_mut(&update.photo_id) {
                photo.plant_label = Some(update.plant_label.clone());
                photo.storage_key = update.storage_key.clone();
                photo.state = PhotoState::Final;
            }
        }

        let revision = tables
            .revisions
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Revision {id} not found")))?;
        revision.state = RevisionState::Finalizada;
        revision.updated_at = Utc::now();
        Ok(revision.clone())
    }

    async fn replace_photos(
        &self,
        id: RevisionId,
        photos: &[NewPhoto],
    ) -> AppResult<Vec<RevisionPhoto>> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        tables.photos.retain(|_, p| p.revision_id != id);
        let inserted = tables.insert(id, photos, &self.next_photo);
        tables.touch(id);
        Ok(inserted)
    }

    async fn delete_revision(&self, id: RevisionId) -> AppResult<bool> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        let existed = tables.revisions.remove(&id).is_some();
        tables.photos.retain(|_, p| p.revision_id != id);
        Ok(existed)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
