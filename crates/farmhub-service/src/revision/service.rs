//! Revision service: every operation on a revision's photo set.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use bytes::Bytes;
use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use farmhub_core::config::IntakeConfig;
use farmhub_core::error::{AppError, ErrorKind};
use farmhub_core::traits::storage::StorageProvider;
use farmhub_core::types::{FarmId, PhotoId, RevisionId, SectorId};
use farmhub_entity::revision::{
    NewPhoto, NewRevision, PhotoFinalUpdate, Revision, RevisionPhoto,
};
use farmhub_storage::{RevisionLayout, sanitize_filename};

use crate::error::RevisionError;
use crate::intake::{IntakePipeline, IntakeReport, NormalizedImage, SourceImage};
use crate::store::{CatalogStore, RevisionStore};

use super::assignment::{LabelAssignment, validate_assignment};
use super::locks::RevisionLocks;
use super::ordinal::{next_ordinal, plan_reindex};
use super::relocate::{Relocation, relocate_all, restore_all, restore_dir, set_aside_dir};

/// Parameters for creating a revision from an archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRevisionRequest {
    /// Farm the sector belongs to.
    pub farm_id: FarmId,
    /// Inspected sector.
    pub sector_id: SectorId,
    /// Inspection date.
    pub revision_date: NaiveDate,
    /// Free-text inspection type.
    pub revision_type: Option<String>,
}

/// A loose file uploaded to an existing revision.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name as supplied by the client.
    pub filename: String,
    /// Encoded image bytes.
    pub data: Bytes,
}

/// Result of comparing a revision's photo count with its expected count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountCheck {
    pub actual: usize,
    pub expected: usize,
    pub matches: bool,
}

/// A revision together with its photos ordered by ordinal.
#[derive(Debug, Clone, Serialize)]
pub struct RevisionPhotos {
    pub revision: Revision,
    pub photos: Vec<RevisionPhoto>,
}

/// Outcome of ingesting an archive into a revision.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeOutcome {
    pub revision: Revision,
    pub photos: Vec<RevisionPhoto>,
    pub report: IntakeReport,
}

/// Outcome of a successful finalize.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    pub revision: Revision,
    /// Labels in the order they were submitted.
    pub labels: Vec<String>,
}

/// Reachability of the service's backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceHealth {
    pub database: bool,
    pub storage: bool,
}

/// Owns the lifecycle of revisions and their photo sets.
///
/// Cloning is cheap; clones share every collaborator and the lock registry.
#[derive(Clone)]
pub struct RevisionService {
    /// Farm and sector lookups.
    catalog: Arc<dyn CatalogStore>,
    /// Revision and photo rows.
    store: Arc<dyn RevisionStore>,
    /// Photo files.
    storage: Arc<dyn StorageProvider>,
    /// Archive validation and image normalization.
    intake: IntakePipeline,
    /// Per-revision mutual exclusion.
    locks: Arc<RevisionLocks>,
    /// Held shared by every running mutation; taken exclusively to drain.
    inflight: Arc<RwLock<()>>,
    /// Set once draining starts.
    closing: Arc<AtomicBool>,
}

impl std::fmt::Debug for RevisionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionService")
            .field("storage", &self.storage.provider_type())
            .field("locks", &self.locks.len())
            .finish()
    }
}

impl RevisionService {
    /// Creates a new revision service.
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        store: Arc<dyn RevisionStore>,
        storage: Arc<dyn StorageProvider>,
        config: &IntakeConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            storage,
            intake: IntakePipeline::new(config),
            locks: Arc::new(RevisionLocks::new()),
            inflight: Arc::new(RwLock::new(())),
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The intake pipeline in use.
    pub fn intake(&self) -> &IntakePipeline {
        &self.intake
    }

    /// Check that the revision store and the storage root are reachable.
    pub async fn health(&self) -> ServiceHealth {
        let database = self.store.health_check().await.unwrap_or_else(|e| {
            warn!(error = %e, "Revision store health check failed");
            false
        });
        let storage = self.storage.health_check().await.unwrap_or_else(|e| {
            warn!(error = %e, "Storage health check failed");
            false
        });
        ServiceHealth { database, storage }
    }

    // ── Mutations ────────────────────────────────────────────────────
    //
    // Each mutation runs to completion on its own task, including any
    // compensation, even if the caller stops waiting for it.

    /// Create a `STAGING` revision whose photos are the images of `archive`.
    ///
    /// The number of accepted images must equal the sector's plant count,
    /// both before and after decoding. Nothing is visible unless every
    /// file was written and the revision committed.
    pub async fn create_revision_from_archive(
        &self,
        request: NewRevisionRequest,
        archive: Bytes,
    ) -> Result<IntakeOutcome, RevisionError> {
        self.detached(move |svc| async move {
            svc.create_revision_from_archive_task(request, archive).await
        })
        .await
    }

    /// Append photos to a `STAGING` revision.
    ///
    /// Every file must decode; otherwise nothing is written.
    pub async fn add_photos(
        &self,
        id: RevisionId,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<RevisionPhoto>, RevisionError> {
        self.detached(move |svc| async move { svc.add_photos_task(id, files).await })
            .await
    }

    /// Replace every photo of a `STAGING` revision with the images of a new
    /// archive, which must hold exactly the expected number of images.
    pub async fn replace_photos_from_archive(
        &self,
        id: RevisionId,
        archive: Bytes,
    ) -> Result<IntakeOutcome, RevisionError> {
        self.detached(move |svc| async move {
            svc.replace_photos_from_archive_task(id, archive).await
        })
        .await
    }

    /// Remove a photo from a `STAGING` revision and renumber the rest.
    pub async fn delete_photo(
        &self,
        id: RevisionId,
        photo_id: PhotoId,
    ) -> Result<(), RevisionError> {
        self.detached(move |svc| async move { svc.delete_photo_task(id, photo_id).await })
            .await
    }

    /// Make the revision's ordinals contiguous. Returns the number of photos
    /// renumbered; zero when they already were.
    pub async fn reindex(&self, id: RevisionId) -> Result<usize, RevisionError> {
        self.detached(move |svc| async move { svc.reindex_task(id).await })
            .await
    }

    /// Bind every photo to a plant number and move it to its per-plant
    /// folder, taking the revision from `STAGING` to `FINALIZADA`.
    ///
    /// Any failure leaves the revision in `STAGING` with its files where
    /// they were.
    pub async fn finalize(
        &self,
        id: RevisionId,
        assignments: &[LabelAssignment],
    ) -> Result<FinalizeOutcome, RevisionError> {
        let assignments = assignments.to_vec();
        self.detached(move |svc| async move { svc.finalize_task(id, &assignments).await })
            .await
    }

    /// Delete a revision, its photo rows and every file under it.
    ///
    /// The row delete is authoritative; file removal afterwards is best
    /// effort and only logged.
    pub async fn delete_revision(&self, id: RevisionId) -> Result<(), RevisionError> {
        self.detached(move |svc| async move { svc.delete_revision_task(id).await })
            .await
    }

    /// Stop accepting mutations and wait for the running ones to finish.
    pub async fn shutdown(&self) {
        self.closing.store(true, Ordering::Release);
        let _idle = self.inflight.write().await;
        info!("Revision service drained");
    }

    async fn detached<T, F, Fut>(&self, op: F) -> Result<T, RevisionError>
    where
        T: Send + 'static,
        F: FnOnce(RevisionService) -> Fut,
        Fut: Future<Output = Result<T, RevisionError>> + Send + 'static,
    {
        if self.closing.load(Ordering::Acquire) {
            return Err(AppError::service_unavailable("Revision service is shutting down").into());
        }
        let permit = Arc::clone(&self.inflight).read_owned().await;
        let task = op(self.clone());
        tokio::spawn(async move {
            let _permit = permit;
            task.await
        })
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Revision task failed", e))?
    }

    // ── Create ───────────────────────────────────────────────────────

    async fn create_revision_from_archive_task(
        &self,
        request: NewRevisionRequest,
        archive: Bytes,
    ) -> Result<IntakeOutcome, RevisionError> {
        let started = Instant::now();

        if !self.catalog.farm_exists(request.farm_id).await? {
            return Err(RevisionError::FarmNotFound(request.farm_id));
        }
        let sector = self
            .catalog
            .find_sector(request.sector_id)
            .await?
            .ok_or(RevisionError::SectorNotFound(request.sector_id))?;
        if !sector.belongs_to(request.farm_id) {
            return Err(RevisionError::SectorMismatch {
                farm_id: request.farm_id,
                sector_id: request.sector_id,
            });
        }
        let expected = usize::try_from(sector.plant_count).unwrap_or(0);

        let images = self.load_archive(archive, expected).await?;

        let revision_id = self.store.reserve_revision_id().await?;
        let layout = RevisionLayout::new(request.farm_id, request.sector_id, revision_id);

        let new_photos = match self.write_staging(&layout, 1, &images.images).await {
            Ok(photos) => photos,
            Err(e) => {
                self.discard_dir(&layout.revision_dir()).await;
                return Err(e);
            }
        };

        let new_revision = NewRevision {
            id: revision_id,
            farm_id: request.farm_id,
            sector_id: request.sector_id,
            revision_date: request.revision_date,
            revision_type: request.revision_type,
            expected_photo_count: sector.plant_count,
        };
        let (revision, photos) = match self.store.create_revision(&new_revision, &new_photos).await
        {
            Ok(created) => created,
            Err(e) => {
                self.discard_dir(&layout.revision_dir()).await;
                return Err(e.into());
            }
        };

        info!(
            revision_id = %revision.id,
            farm_id = %revision.farm_id,
            sector_id = %revision.sector_id,
            photos = photos.len(),
            omitted = images.report.omitted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Revision created from archive"
        );

        Ok(IntakeOutcome {
            revision,
            photos,
            report: images.report,
        })
    }

    /// Dry-run intake: validate and decode without persisting anything.
    pub async fn inspect_archive(&self, archive: Bytes) -> Result<IntakeReport, RevisionError> {
        let processed = self.intake.process(archive).await?;
        Ok(processed.report())
    }

    // ── Read ─────────────────────────────────────────────────────────

    /// Look up a revision.
    pub async fn get_revision(&self, id: RevisionId) -> Result<Revision, RevisionError> {
        self.store
            .find_revision(id)
            .await?
            .ok_or(RevisionError::RevisionNotFound(id))
    }

    /// A revision and its photos ordered by ordinal.
    pub async fn list_photos(&self, id: RevisionId) -> Result<RevisionPhotos, RevisionError> {
        let revision = self.get_revision(id).await?;
        let photos = self.store.list_photos(id).await?;
        Ok(RevisionPhotos { revision, photos })
    }

    /// Compare the photo count with the expected count. Allowed in any state.
    pub async fn validate_count(&self, id: RevisionId) -> Result<CountCheck, RevisionError> {
        let revision = self.get_revision(id).await?;
        let actual = self.store.count_photos(id).await?;
        let expected = revision.expected();
        Ok(CountCheck {
            actual,
            expected,
            matches: actual == expected,
        })
    }

    // ── Staging mutations ────────────────────────────────────────────

    async fn add_photos_task(
        &self,
        id: RevisionId,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<RevisionPhoto>, RevisionError> {
        if files.is_empty() {
            return Err(AppError::validation("No files were uploaded").into());
        }
        for file in &files {
            self.intake.check_file_size(file.data.len())?;
        }
        Self::require_staging(&self.get_revision(id).await?)?;

        let sources = files
            .into_iter()
            .map(|f| SourceImage {
                name: sanitize_filename(&f.filename),
                data: f.data.to_vec(),
            })
            .collect();
        let batch = self.intake.normalize(sources).await?;
        if !batch.errors.is_empty() {
            return Err(RevisionError::UnreadableImage {
                errors: batch.errors,
            });
        }
        let images: Vec<(String, NormalizedImage)> = batch
            .images
            .into_iter()
            .map(|(_, name, image)| (name, image))
            .collect();

        let _guard = self.locks.acquire(id).await;
        let revision = self.get_revision(id).await?;
        Self::require_staging(&revision)?;
        let layout = Self::layout(&revision);

        self.reindex_locked(&revision).await?;
        let count = self.store.count_photos(id).await?;
        let new_photos = self
            .write_staging(&layout, next_ordinal(count), &images)
            .await?;

        match self.store.insert_photos(id, &new_photos).await {
            Ok(inserted) => {
                info!(revision_id = %id, added = inserted.len(), total = count + inserted.len(), "Photos added");
                Ok(inserted)
            }
            Err(e) => {
                self.discard_files(&staging_keys(&new_photos)).await;
                Err(e.into())
            }
        }
    }

    async fn replace_photos_from_archive_task(
        &self,
        id: RevisionId,
        archive: Bytes,
    ) -> Result<IntakeOutcome, RevisionError> {
        let revision = self.get_revision(id).await?;
        Self::require_staging(&revision)?;
        let images = self.load_archive(archive, revision.expected()).await?;

        let _guard = self.locks.acquire(id).await;
        let revision = self.get_revision(id).await?;
        Self::require_staging(&revision)?;
        let layout = Self::layout(&revision);
        let staging = layout.staging_dir();

        let token = Uuid::new_v4().simple().to_string();
        let parked = set_aside_dir(self.storage.as_ref(), &staging, &layout.set_aside_dir(&token))
            .await?;

        let new_photos = match self.write_staging(&layout, 1, &images.images).await {
            Ok(photos) => photos,
            Err(e) => {
                self.restore_staging(&staging, parked).await;
                return Err(e);
            }
        };
        let photos = match self.store.replace_photos(id, &new_photos).await {
            Ok(photos) => photos,
            Err(e) => {
                self.restore_staging(&staging, parked).await;
                return Err(e.into());
            }
        };

        if let Some(parked) = parked {
            self.discard_dir(&parked).await;
        }
        let revision = self.get_revision(id).await?;

        info!(revision_id = %id, photos = photos.len(), "Revision photos replaced from archive");
        Ok(IntakeOutcome {
            revision,
            photos,
            report: images.report,
        })
    }

    async fn delete_photo_task(
        &self,
        id: RevisionId,
        photo_id: PhotoId,
    ) -> Result<(), RevisionError> {
        let _guard = self.locks.acquire(id).await;
        let revision = self.get_revision(id).await?;
        Self::require_staging(&revision)?;

        let photo = self
            .store
            .list_photos(id)
            .await?
            .into_iter()
            .find(|p| p.id == photo_id)
            .ok_or(RevisionError::PhotoNotFound {
                revision_id: id,
                photo_id,
            })?;

        if !self.store.delete_photo(id, photo_id).await? {
            return Err(RevisionError::PhotoNotFound {
                revision_id: id,
                photo_id,
            });
        }
        self.discard_files(&[photo.storage_key]).await;

        // The delete stands even if renumbering fails; the next mutation
        // closes the gap before it relies on ordinals.
        match self.reindex_locked(&revision).await {
            Ok(moved) => {
                info!(revision_id = %id, photo_id = %photo_id, renumbered = moved, "Photo deleted");
            }
            Err(e) => {
                warn!(revision_id = %id, photo_id = %photo_id, error = %e, "Photo deleted; renumbering deferred");
            }
        }
        Ok(())
    }

    async fn reindex_task(&self, id: RevisionId) -> Result<usize, RevisionError> {
        let _guard = self.locks.acquire(id).await;
        let revision = self.get_revision(id).await?;
        Self::require_staging(&revision)?;
        self.reindex_locked(&revision).await
    }

    async fn reindex_locked(&self, revision: &Revision) -> Result<usize, RevisionError> {
        let layout = Self::layout(revision);
        let photos = self.store.list_photos(revision.id).await?;
        let plan = plan_reindex(&photos, &layout);
        if plan.is_empty() {
            return Ok(0);
        }

        let relocations = plan.relocations();
        relocate_all(self.storage.as_ref(), &layout, &relocations).await?;

        if let Err(e) = self.store.apply_ordinals(revision.id, &plan.updates()).await {
            self.undo_relocations(&layout, &relocations).await;
            return Err(e.into());
        }

        debug!(revision_id = %revision.id, moves = plan.moves.len(), "Revision reindexed");
        Ok(plan.moves.len())
    }

    // ── Finalize ─────────────────────────────────────────────────────

    async fn finalize_task(
        &self,
        id: RevisionId,
        assignments: &[LabelAssignment],
    ) -> Result<FinalizeOutcome, RevisionError> {
        let _guard = self.locks.acquire(id).await;
        let revision = self.get_revision(id).await?;
        Self::require_staging(&revision)?;
        self.reindex_locked(&revision).await?;

        let photos = self.store.list_photos(id).await?;
        let expected = revision.expected();
        if photos.len() != expected {
            return Err(RevisionError::PhotoCountMismatch {
                expected,
                actual: photos.len(),
                errors: Vec::new(),
            });
        }

        let labeled = validate_assignment(&photos, assignments)?;

        for photo in &photos {
            if !self.storage.exists(&photo.storage_key).await? {
                return Err(RevisionError::SourceFileMissing {
                    photo_id: photo.id,
                    key: photo.storage_key.clone(),
                });
            }
        }

        let layout = Self::layout(&revision);
        let by_id: HashMap<PhotoId, &RevisionPhoto> = photos.iter().map(|p| (p.id, p)).collect();
        let mut relocations = Vec::with_capacity(labeled.len());
        let mut updates = Vec::with_capacity(labeled.len());
        for (photo_id, label) in &labeled {
            let photo = by_id
                .get(photo_id)
                .ok_or(RevisionError::PhotoNotFound {
                    revision_id: id,
                    photo_id: *photo_id,
                })?;
            let target = layout.final_key(photo.ordinal, label);
            relocations.push(Relocation {
                from: photo.storage_key.clone(),
                to: target.clone(),
            });
            updates.push(PhotoFinalUpdate {
                photo_id: *photo_id,
                plant_label: label.clone(),
                storage_key: target,
            });
        }

        relocate_all(self.storage.as_ref(), &layout, &relocations).await?;

        let finalized = match self.store.finalize(id, &updates).await {
            Ok(revision) => revision,
            Err(e) => {
                self.undo_relocations(&layout, &relocations).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.storage.delete_dir(&layout.staging_dir()).await {
            debug!(revision_id = %id, error = %e, "Staging directory left in place");
        }

        info!(revision_id = %id, photos = updates.len(), "Revision finalized");
        Ok(FinalizeOutcome {
            revision: finalized,
            labels: labeled.into_iter().map(|(_, label)| label).collect(),
        })
    }

    // ── Delete ───────────────────────────────────────────────────────

    async fn delete_revision_task(&self, id: RevisionId) -> Result<(), RevisionError> {
        {
            let _guard = self.locks.acquire(id).await;
            let revision = self.get_revision(id).await?;
            let layout = Self::layout(&revision);
            let keys: Vec<String> = self
                .store
                .list_photos(id)
                .await?
                .into_iter()
                .map(|p| p.storage_key)
                .collect();

            if !self.store.delete_revision(id).await? {
                return Err(RevisionError::RevisionNotFound(id));
            }

            self.discard_files(&keys).await;
            self.discard_dir(&layout.revision_dir()).await;

            info!(revision_id = %id, photos = keys.len(), "Revision deleted");
        }
        self.locks.forget(id);
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn layout(revision: &Revision) -> RevisionLayout {
        RevisionLayout::new(revision.farm_id, revision.sector_id, revision.id)
    }

    fn require_staging(revision: &Revision) -> Result<(), RevisionError> {
        if revision.is_staging() {
            Ok(())
        } else {
            Err(RevisionError::InvalidState {
                revision_id: revision.id,
                state: revision.state,
            })
        }
    }

    /// Validate and decode an archive whose accepted image count must be
    /// exactly `expected`.
    async fn load_archive(
        &self,
        archive: Bytes,
        expected: usize,
    ) -> Result<DecodedArchive, RevisionError> {
        let inspection = self.intake.inspect(archive.clone()).await?;
        if inspection.accepted.len() != expected {
            return Err(RevisionError::PhotoCountMismatch {
                expected,
                actual: inspection.accepted.len(),
                errors: inspection.errors,
            });
        }

        let processed = self.intake.extract(archive, inspection).await?;
        if processed.images.len() != expected {
            return Err(RevisionError::PhotoCountMismatch {
                expected,
                actual: processed.images.len(),
                errors: processed.errors,
            });
        }

        let report = processed.report();
        Ok(DecodedArchive {
            images: processed.images,
            report,
        })
    }

    /// Write images to consecutive staging keys starting at `first`.
    /// On failure, files already written are removed.
    async fn write_staging(
        &self,
        layout: &RevisionLayout,
        first: i32,
        images: &[(String, NormalizedImage)],
    ) -> Result<Vec<NewPhoto>, RevisionError> {
        let new_photos: Vec<NewPhoto> = images
            .iter()
            .zip(first..)
            .map(|((name, _), ordinal)| NewPhoto {
                ordinal,
                storage_key: layout.staging_key(ordinal),
                original_filename: name.clone(),
            })
            .collect();

        let writes = new_photos.iter().zip(images).map(|(photo, (_, image))| {
            self.storage
                .write(&photo.storage_key, image.data.clone())
        });
        if let Err(e) = try_join_all(writes).await {
            self.discard_files(&staging_keys(&new_photos)).await;
            return Err(e.into());
        }

        Ok(new_photos)
    }

    async fn restore_staging(&self, staging: &str, parked: Option<String>) {
        self.discard_dir(staging).await;
        if let Some(parked) = parked {
            restore_dir(self.storage.as_ref(), &parked, staging).await;
        }
    }

    async fn undo_relocations(&self, layout: &RevisionLayout, relocations: &[Relocation]) {
        if let Err(e) = restore_all(self.storage.as_ref(), layout, relocations).await {
            warn!(
                revision_dir = %layout.revision_dir(),
                error = %e,
                "Failed to move files back after a failed commit"
            );
        }
    }

    async fn discard_files(&self, keys: &[String]) {
        for key in keys {
            match self.storage.delete(key).await {
                Ok(true) => {}
                Ok(false) => warn!(key, "File already missing"),
                Err(e) => warn!(key, error = %e, "Failed to delete file"),
            }
        }
    }

    async fn discard_dir(&self, dir: &str) {
        if let Err(e) = self.storage.delete_dir(dir).await {
            warn!(dir, error = %e, "Failed to delete directory");
        }
    }
}

fn staging_keys(photos: &[NewPhoto]) -> Vec<String> {
    photos.iter().map(|p| p.storage_key.clone()).collect()
}

/// Decoded images of an archive plus its report.
#[derive(Debug)]
struct DecodedArchive {
    images: Vec<(String, NormalizedImage)>,
    report: IntakeReport,
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use image::ImageFormat;
    use tokio::sync::Notify;
    use zip::write::SimpleFileOptions;

    use farmhub_core::result::AppResult;
    use farmhub_core::traits::storage::StorageObjectMeta;
    use farmhub_entity::revision::{PhotoState, RevisionState};
    use farmhub_storage::LocalStorageProvider;

    use crate::intake::normalize::tests::encoded_image;
    use crate::store::memory::{MemoryCatalogStore, MemoryRevisionStore};

    use super::*;

    /// Local storage whose renames can be held at a given call or made to
    /// fail.
    #[derive(Debug)]
    struct GatedStorage {
        inner: LocalStorageProvider,
        renames: AtomicUsize,
        hold_at: AtomicUsize,
        gate: Notify,
        fail_renames: AtomicBool,
    }

    impl GatedStorage {
        fn new(inner: LocalStorageProvider) -> Self {
            Self {
                inner,
                renames: AtomicUsize::new(0),
                hold_at: AtomicUsize::new(0),
                gate: Notify::new(),
                fail_renames: AtomicBool::new(false),
            }
        }

        /// Park the `n`th rename from now until [`GatedStorage::release`].
        fn hold_rename(&self, n: usize) {
            let done = self.renames.load(Ordering::SeqCst);
            self.hold_at.store(done + n, Ordering::SeqCst);
        }

        fn release(&self) {
            self.gate.notify_one();
        }

        fn fail_renames(&self, fail: bool) {
            self.fail_renames.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl StorageProvider for GatedStorage {
        fn provider_type(&self) -> &str {
            "gated"
        }

        async fn health_check(&self) -> AppResult<bool> {
            self.inner.health_check().await
        }

        async fn read_bytes(&self, path: &str) -> AppResult<Bytes> {
            self.inner.read_bytes(path).await
        }

        async fn write(&self, path: &str, data: Bytes) -> AppResult<()> {
            self.inner.write(path, data).await
        }

        async fn delete(&self, path: &str) -> AppResult<bool> {
            self.inner.delete(path).await
        }

        async fn delete_dir(&self, path: &str) -> AppResult<bool> {
            self.inner.delete_dir(path).await
        }

        async fn rename(&self, from: &str, to: &str) -> AppResult<()> {
            if self.fail_renames.load(Ordering::SeqCst) {
                return Err(AppError::storage(format!("Rename refused: {from}")));
            }
            let n = self.renames.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.hold_at.load(Ordering::SeqCst) {
                self.gate.notified().await;
            }
            self.inner.rename(from, to).await
        }

        async fn exists(&self, path: &str) -> AppResult<bool> {
            self.inner.exists(path).await
        }

        async fn list(&self, path: &str) -> AppResult<Vec<StorageObjectMeta>> {
            self.inner.list(path).await
        }
    }

    struct Harness {
        _root: tempfile::TempDir,
        storage: Arc<GatedStorage>,
        store: Arc<MemoryRevisionStore>,
        service: RevisionService,
        farm: FarmId,
        sector: SectorId,
    }

    async fn harness(plant_count: i32) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let storage = Arc::new(GatedStorage::new(
            LocalStorageProvider::new(root.path()).await.unwrap(),
        ));
        let catalog = Arc::new(MemoryCatalogStore::new());
        let farm = catalog.add_farm(1, "La Esperanza").await;
        let sector = catalog.add_sector(10, farm, plant_count).await;
        catalog.add_farm(2, "Other").await;
        let store = Arc::new(MemoryRevisionStore::new());

        let config = IntakeConfig {
            worker_threads: 2,
            ..IntakeConfig::default()
        };
        let service = RevisionService::new(catalog, store.clone(), storage.clone(), &config);
        Harness {
            _root: root,
            storage,
            store,
            service,
            farm,
            sector,
        }
    }

    fn zip_of(entries: &[(&str, Vec<u8>)]) -> Bytes {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        Bytes::from(writer.finish().unwrap().into_inner())
    }

    fn photo_zip(count: u8) -> Bytes {
        let entries: Vec<(String, Vec<u8>)> = (0..count)
            .map(|i| (format!("IMG_{i:03}.png"), encoded_image(ImageFormat::Png, i * 20)))
            .collect();
        let refs: Vec<(&str, Vec<u8>)> = entries
            .iter()
            .map(|(n, d)| (n.as_str(), d.clone()))
            .collect();
        zip_of(&refs)
    }

    fn request(h: &Harness) -> NewRevisionRequest {
        NewRevisionRequest {
            farm_id: h.farm,
            sector_id: h.sector,
            revision_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            revision_type: Some("fitosanitaria".into()),
        }
    }

    fn labels_for(photos: &[RevisionPhoto], labels: &[&str]) -> Vec<LabelAssignment> {
        photos
            .iter()
            .zip(labels)
            .map(|(p, l)| LabelAssignment {
                photo_id: p.id,
                label: (*l).to_string(),
            })
            .collect()
    }

    async fn on_disk(h: &Harness, key: &str) -> bool {
        h.storage.exists(key).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_skips_non_images() {
        let h = harness(5).await;
        let mut entries: Vec<(&str, Vec<u8>)> = vec![("notes.txt", b"field notes".to_vec())];
        // The decoder sniffs content, so a PNG named .webp still decodes.
        let names = ["e.jpg", "a.png", "d.webp", "b.jpeg", "c.png"];
        for (i, name) in names.iter().enumerate() {
            let format = if name.ends_with("jpg") || name.ends_with("jpeg") {
                ImageFormat::Jpeg
            } else {
                ImageFormat::Png
            };
            entries.push((*name, encoded_image(format, i as u8 * 30)));
        }

        let outcome = h
            .service
            .create_revision_from_archive(request(&h), zip_of(&entries))
            .await
            .unwrap();

        assert_eq!(outcome.revision.state, RevisionState::Staging);
        assert_eq!(outcome.revision.expected_photo_count, 5);
        assert_eq!(outcome.report.omitted, 1);
        assert!(outcome.report.errors.is_empty());
        assert_eq!(outcome.photos.len(), 5);

        let ordinals: Vec<i32> = outcome.photos.iter().map(|p| p.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4, 5]);
        let originals: Vec<&str> = outcome
            .photos
            .iter()
            .map(|p| p.original_filename.as_str())
            .collect();
        assert_eq!(originals, vec!["a.png", "b.jpeg", "c.png", "d.webp", "e.jpg"]);

        for photo in &outcome.photos {
            assert!(photo.storage_key.ends_with(&format!("staging/{}.jpg", photo.ordinal)));
            let data = h.storage.read_bytes(&photo.storage_key).await.unwrap();
            assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Jpeg);
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_creates_nothing() {
        let h = harness(5).await;
        let err = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(4))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RevisionError::PhotoCountMismatch {
                expected: 5,
                actual: 4,
                ..
            }
        ));
        assert_eq!(h.store.revision_count().await, 0);
        assert!(h.storage.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_member_fails_creation() {
        let h = harness(3).await;
        let entries = vec![
            ("a.png", encoded_image(ImageFormat::Png, 1)),
            ("b.png", encoded_image(ImageFormat::Png, 2)),
            ("c.jpg", b"not really a jpeg".to_vec()),
        ];
        let err = h
            .service
            .create_revision_from_archive(request(&h), zip_of(&entries))
            .await
            .unwrap_err();
        match err {
            RevisionError::PhotoCountMismatch {
                expected,
                actual,
                errors,
            } => {
                assert_eq!((expected, actual), (3, 2));
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].name, "c.jpg");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.store.revision_count().await, 0);
    }

    #[tokio::test]
    async fn test_reference_checks() {
        let h = harness(1).await;

        let mut req = request(&h);
        req.farm_id = FarmId(99);
        let err = h
            .service
            .create_revision_from_archive(req, photo_zip(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::FarmNotFound(FarmId(99))));

        let mut req = request(&h);
        req.sector_id = SectorId(99);
        let err = h
            .service
            .create_revision_from_archive(req, photo_zip(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::SectorNotFound(SectorId(99))));

        let mut req = request(&h);
        req.farm_id = FarmId(2);
        let err = h
            .service
            .create_revision_from_archive(req, photo_zip(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::SectorMismatch { .. }));
    }

    #[tokio::test]
    async fn test_failed_commit_removes_written_files() {
        let h = harness(2).await;
        h.store.fail_next_write();
        let err = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(2))
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::App(_)));
        assert_eq!(h.store.revision_count().await, 0);

        let layout = RevisionLayout::new(h.farm, h.sector, RevisionId(1));
        assert!(!on_disk(&h, &layout.revision_dir()).await);
    }

    #[tokio::test]
    async fn test_delete_photo_renumbers_and_moves_files() {
        let h = harness(4).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(4))
            .await
            .unwrap();
        let id = created.revision.id;
        let third = h.storage.read_bytes(&created.photos[2].storage_key).await.unwrap();

        h.service.delete_photo(id, created.photos[1].id).await.unwrap();

        let listed = h.service.list_photos(id).await.unwrap();
        let ordinals: Vec<i32> = listed.photos.iter().map(|p| p.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(listed.photos[1].id, created.photos[2].id);

        let layout = RevisionLayout::new(h.farm, h.sector, id);
        assert_eq!(listed.photos[1].storage_key, layout.staging_key(2));
        assert_eq!(h.storage.read_bytes(&layout.staging_key(2)).await.unwrap(), third);
        assert!(!on_disk(&h, &layout.staging_key(4)).await);
        assert_eq!(h.storage.list(&layout.staging_dir()).await.unwrap().len(), 3);

        assert_eq!(h.service.reindex(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_photo() {
        let h = harness(1).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(1))
            .await
            .unwrap();
        let err = h
            .service
            .delete_photo(created.revision.id, PhotoId(999))
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::PhotoNotFound { .. }));
    }

    #[tokio::test]
    async fn test_add_photos_appends_ordinals() {
        let h = harness(3).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(3))
            .await
            .unwrap();
        let id = created.revision.id;

        let added = h
            .service
            .add_photos(
                id,
                vec![UploadedFile {
                    filename: "../../extra.png".into(),
                    data: Bytes::from(encoded_image(ImageFormat::Png, 9)),
                }],
            )
            .await
            .unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].ordinal, 4);
        assert_eq!(added[0].original_filename, "extra.png");

        let check = h.service.validate_count(id).await.unwrap();
        assert_eq!(
            check,
            CountCheck {
                actual: 4,
                expected: 3,
                matches: false
            }
        );
    }

    #[tokio::test]
    async fn test_add_photos_rejects_any_unreadable_file() {
        let h = harness(1).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(1))
            .await
            .unwrap();
        let id = created.revision.id;

        let err = h
            .service
            .add_photos(
                id,
                vec![
                    UploadedFile {
                        filename: "ok.png".into(),
                        data: Bytes::from(encoded_image(ImageFormat::Png, 1)),
                    },
                    UploadedFile {
                        filename: "broken.jpg".into(),
                        data: Bytes::from_static(b"garbage"),
                    },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::UnreadableImage { ref errors } if errors.len() == 1));
        assert_eq!(h.service.validate_count(id).await.unwrap().actual, 1);
    }

    #[tokio::test]
    async fn test_duplicate_label_keeps_staging() {
        let h = harness(5).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(5))
            .await
            .unwrap();
        let id = created.revision.id;

        let err = h
            .service
            .finalize(id, &labels_for(&created.photos, &["1", "1", "2", "3", "4"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::DuplicateLabel { .. }));

        let listed = h.service.list_photos(id).await.unwrap();
        assert_eq!(listed.revision.state, RevisionState::Staging);
        assert!(listed.photos.iter().all(|p| p.state == PhotoState::Staging));
        for photo in &listed.photos {
            assert!(on_disk(&h, &photo.storage_key).await);
        }
    }

    #[tokio::test]
    async fn test_finalize_moves_photos_per_plant() {
        let h = harness(3).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(3))
            .await
            .unwrap();
        let id = created.revision.id;

        let outcome = h
            .service
            .finalize(id, &labels_for(&created.photos, &["12", " 7", "300"]))
            .await
            .unwrap();
        assert_eq!(outcome.revision.state, RevisionState::Finalizada);
        assert_eq!(outcome.labels, vec!["12", "7", "300"]);

        let listed = h.service.list_photos(id).await.unwrap();
        let layout = RevisionLayout::new(h.farm, h.sector, id);
        for photo in &listed.photos {
            assert_eq!(photo.state, PhotoState::Final);
            let label = photo.plant_label.as_deref().unwrap();
            assert!(photo.storage_key.contains(&format!("/plant_{label}/")));
            assert_eq!(photo.storage_key, layout.final_key(photo.ordinal, label));
            assert!(on_disk(&h, &photo.storage_key).await);
        }
        assert!(!on_disk(&h, &layout.staging_dir()).await);

        let err = h
            .service
            .add_photos(
                id,
                vec![UploadedFile {
                    filename: "late.png".into(),
                    data: Bytes::from(encoded_image(ImageFormat::Png, 3)),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::InvalidState { .. }));

        let err = h
            .service
            .delete_photo(id, listed.photos[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::InvalidState { .. }));

        let err = h
            .service
            .finalize(id, &labels_for(&listed.photos, &["1", "2", "3"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_finalize_requires_expected_count() {
        let h = harness(2).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(2))
            .await
            .unwrap();
        let id = created.revision.id;
        h.service.delete_photo(id, created.photos[0].id).await.unwrap();

        let listed = h.service.list_photos(id).await.unwrap();
        let err = h
            .service
            .finalize(id, &labels_for(&listed.photos, &["1"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RevisionError::PhotoCountMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_finalize_with_missing_source_moves_nothing() {
        let h = harness(2).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(2))
            .await
            .unwrap();
        let id = created.revision.id;
        h.storage.delete(&created.photos[1].storage_key).await.unwrap();

        let err = h
            .service
            .finalize(id, &labels_for(&created.photos, &["1", "2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::SourceFileMissing { photo_id, .. } if photo_id == created.photos[1].id));
        assert!(on_disk(&h, &created.photos[0].storage_key).await);
        assert_eq!(
            h.service.get_revision(id).await.unwrap().state,
            RevisionState::Staging
        );
    }

    #[tokio::test]
    async fn test_failed_finalize_commit_moves_files_back() {
        let h = harness(2).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(2))
            .await
            .unwrap();
        let id = created.revision.id;

        h.store.fail_next_write();
        let err = h
            .service
            .finalize(id, &labels_for(&created.photos, &["1", "2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::App(_)));

        let listed = h.service.list_photos(id).await.unwrap();
        assert_eq!(listed.revision.state, RevisionState::Staging);
        for photo in &listed.photos {
            assert_eq!(photo.state, PhotoState::Staging);
            assert!(on_disk(&h, &photo.storage_key).await);
        }
        let layout = RevisionLayout::new(h.farm, h.sector, id);
        assert!(h.storage.list(&layout.final_dir()).await.unwrap().iter().all(|e| e.is_directory));
    }

    #[tokio::test]
    async fn test_replace_swaps_photo_set() {
        let h = harness(2).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(2))
            .await
            .unwrap();
        let id = created.revision.id;

        let replacement = zip_of(&[
            ("z1.jpg", encoded_image(ImageFormat::Jpeg, 200)),
            ("z2.jpg", encoded_image(ImageFormat::Jpeg, 220)),
        ]);
        let outcome = h
            .service
            .replace_photos_from_archive(id, replacement)
            .await
            .unwrap();
        let originals: Vec<&str> = outcome
            .photos
            .iter()
            .map(|p| p.original_filename.as_str())
            .collect();
        assert_eq!(originals, vec!["z1.jpg", "z2.jpg"]);
        assert!(outcome.photos.iter().all(|p| !created.photos.iter().any(|c| c.id == p.id)));

        let layout = RevisionLayout::new(h.farm, h.sector, id);
        let entries = h.storage.list(&layout.revision_dir()).await.unwrap();
        assert_eq!(entries.len(), 1, "parked directory should be gone");
        assert_eq!(h.storage.list(&layout.staging_dir()).await.unwrap().len(), 2);

        let err = h
            .service
            .replace_photos_from_archive(id, photo_zip(3))
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::PhotoCountMismatch { .. }));
    }

    #[tokio::test]
    async fn test_failed_replace_restores_previous_files() {
        let h = harness(2).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(2))
            .await
            .unwrap();
        let id = created.revision.id;
        let before = h.storage.read_bytes(&created.photos[0].storage_key).await.unwrap();

        h.store.fail_next_write();
        let replacement = zip_of(&[
            ("z1.jpg", encoded_image(ImageFormat::Jpeg, 200)),
            ("z2.jpg", encoded_image(ImageFormat::Jpeg, 220)),
        ]);
        assert!(h.service.replace_photos_from_archive(id, replacement).await.is_err());

        let listed = h.service.list_photos(id).await.unwrap();
        assert_eq!(listed.photos[0].id, created.photos[0].id);
        assert_eq!(
            h.storage.read_bytes(&listed.photos[0].storage_key).await.unwrap(),
            before
        );
    }

    #[tokio::test]
    async fn test_delete_revision_removes_files() {
        let h = harness(2).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(2))
            .await
            .unwrap();
        let id = created.revision.id;
        let layout = RevisionLayout::new(h.farm, h.sector, id);

        h.service.delete_revision(id).await.unwrap();
        assert!(!on_disk(&h, &layout.revision_dir()).await);
        assert_eq!(h.store.revision_count().await, 0);

        let err = h.service.get_revision(id).await.unwrap_err();
        assert!(matches!(err, RevisionError::RevisionNotFound(_)));
        let err = h.service.delete_revision(id).await.unwrap_err();
        assert!(matches!(err, RevisionError::RevisionNotFound(_)));
    }

    #[tokio::test]
    async fn test_inspect_reports_without_persisting() {
        let h = harness(2).await;
        let entries = vec![
            ("b.png", encoded_image(ImageFormat::Png, 1)),
            ("a.png", encoded_image(ImageFormat::Png, 2)),
            ("readme.md", b"hi".to_vec()),
        ];
        let report = h.service.inspect_archive(zip_of(&entries)).await.unwrap();
        assert_eq!(report.total_members, 3);
        assert_eq!(report.readable, 2);
        assert_eq!(report.omitted, 1);
        assert_eq!(report.accepted, vec!["a.png", "b.png"]);
        assert_eq!(h.store.revision_count().await, 0);
    }

    #[tokio::test]
    async fn test_finalize_completes_after_caller_gives_up() {
        let h = harness(3).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(3))
            .await
            .unwrap();
        let id = created.revision.id;
        let assignments = labels_for(&created.photos, &["1", "2", "3"]);

        // The second file move stalls, so the caller times out mid-move.
        h.storage.hold_rename(2);
        let gave_up = tokio::time::timeout(
            Duration::from_millis(200),
            h.service.finalize(id, &assignments),
        )
        .await;
        assert!(gave_up.is_err());
        h.storage.release();

        // Queues behind the first finalize, which still runs to the end.
        let err = h.service.finalize(id, &assignments).await.unwrap_err();
        assert!(matches!(err, RevisionError::InvalidState { .. }));

        let listed = h.service.list_photos(id).await.unwrap();
        assert_eq!(listed.revision.state, RevisionState::Finalizada);
        for photo in &listed.photos {
            assert_eq!(photo.state, PhotoState::Final);
            assert!(on_disk(&h, &photo.storage_key).await);
        }
        let layout = RevisionLayout::new(h.farm, h.sector, id);
        assert!(!on_disk(&h, &layout.staging_dir()).await);
    }

    #[tokio::test]
    async fn test_shutdown_waits_then_refuses_mutations() {
        let h = harness(1).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(1))
            .await
            .unwrap();
        let id = created.revision.id;

        h.service.shutdown().await;
        let err = h.service.delete_revision(id).await.unwrap_err();
        match err {
            RevisionError::App(inner) => {
                assert_eq!(inner.kind, ErrorKind::ServiceUnavailable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(h.service.get_revision(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_renumber_is_healed_by_next_upload() {
        let h = harness(3).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(3))
            .await
            .unwrap();
        let id = created.revision.id;

        h.storage.fail_renames(true);
        h.service.delete_photo(id, created.photos[0].id).await.unwrap();
        h.storage.fail_renames(false);

        let listed = h.service.list_photos(id).await.unwrap();
        let ordinals: Vec<i32> = listed.photos.iter().map(|p| p.ordinal).collect();
        assert_eq!(ordinals, vec![2, 3]);

        let added = h
            .service
            .add_photos(
                id,
                vec![UploadedFile {
                    filename: "late.png".into(),
                    data: Bytes::from(encoded_image(ImageFormat::Png, 77)),
                }],
            )
            .await
            .unwrap();
        assert_eq!(added[0].ordinal, 3);

        let layout = RevisionLayout::new(h.farm, h.sector, id);
        let listed = h.service.list_photos(id).await.unwrap();
        let ordinals: Vec<i32> = listed.photos.iter().map(|p| p.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        for photo in &listed.photos {
            assert_eq!(photo.storage_key, layout.staging_key(photo.ordinal));
            assert!(on_disk(&h, &photo.storage_key).await);
        }
        assert_eq!(h.storage.list(&layout.staging_dir()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_finalizes_commit_once() {
        let h = harness(3).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(3))
            .await
            .unwrap();
        let id = created.revision.id;
        let first = labels_for(&created.photos, &["1", "2", "3"]);
        let second = labels_for(&created.photos, &["4", "5", "6"]);

        let (a, b) = tokio::join!(h.service.finalize(id, &first), h.service.finalize(id, &second));
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(RevisionError::InvalidState { .. }))));
        let winner = results.iter().find_map(|r| r.as_ref().ok()).unwrap();

        let listed = h.service.list_photos(id).await.unwrap();
        let mut labels: Vec<&str> = listed
            .photos
            .iter()
            .map(|p| p.plant_label.as_deref().unwrap())
            .collect();
        labels.sort_unstable();
        let mut expected: Vec<&str> = winner.labels.iter().map(String::as_str).collect();
        expected.sort_unstable();
        assert_eq!(labels, expected);
        for photo in &listed.photos {
            assert!(on_disk(&h, &photo.storage_key).await);
        }
    }

    #[tokio::test]
    async fn test_delete_racing_finalize_leaves_consistent_set() {
        let h = harness(2).await;
        let created = h
            .service
            .create_revision_from_archive(request(&h), photo_zip(2))
            .await
            .unwrap();
        let id = created.revision.id;
        let assignments = labels_for(&created.photos, &["1", "2"]);
        let layout = RevisionLayout::new(h.farm, h.sector, id);

        let (deleted, finalized) = tokio::join!(
            h.service.delete_photo(id, created.photos[1].id),
            h.service.finalize(id, &assignments)
        );
        let listed = h.service.list_photos(id).await.unwrap();

        match (deleted, finalized) {
            (Ok(()), Err(err)) => {
                assert!(matches!(err, RevisionError::PhotoCountMismatch { .. }));
                assert_eq!(listed.revision.state, RevisionState::Staging);
                assert_eq!(listed.photos.len(), 1);
                assert_eq!(listed.photos[0].storage_key, layout.staging_key(1));
                assert!(on_disk(&h, &layout.staging_key(1)).await);
            }
            (Err(err), Ok(_)) => {
                assert!(matches!(err, RevisionError::InvalidState { .. }));
                assert_eq!(listed.revision.state, RevisionState::Finalizada);
                assert_eq!(listed.photos.len(), 2);
                for photo in &listed.photos {
                    assert_eq!(photo.state, PhotoState::Final);
                    assert!(on_disk(&h, &photo.storage_key).await);
                }
            }
            other => panic!("unexpected outcomes: {other:?}"),
        }
    }
}
