//! Archive intake: validation, extraction and normalization of uploads.

pub mod archive;
pub mod normalize;

use bytes::Bytes;
use serde::Serialize;

use farmhub_core::config::IntakeConfig;
use farmhub_core::error::{AppError, ErrorKind};

use crate::error::{IntakeItemError, RevisionError};

pub use archive::{AcceptedMember, ArchiveInspection, IntakeLimits, inspect_archive};
pub use normalize::{ImageNormalizer, NormalizedBatch, NormalizedImage, SourceImage};

/// Dry-run summary of what an archive would contribute to a revision.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeReport {
    /// Non-directory members in the archive.
    pub total_members: usize,
    /// Images that passed validation and decoded.
    pub readable: usize,
    /// Non-image members skipped.
    pub omitted: usize,
    /// Sanitized names of the readable images, in ordinal order.
    pub accepted: Vec<String>,
    /// Per-item failures (oversized, unreadable, undecodable).
    pub errors: Vec<IntakeItemError>,
}

/// An archive after validation, extraction and normalization.
#[derive(Debug)]
pub struct ProcessedArchive {
    /// The metadata-only inspection.
    pub inspection: ArchiveInspection,
    /// Decoded images in ordinal order (sorted by sanitized name).
    pub images: Vec<(String, NormalizedImage)>,
    /// Item errors from inspection, extraction and decoding combined.
    pub errors: Vec<IntakeItemError>,
}

impl ProcessedArchive {
    /// Summarize for clients.
    pub fn report(&self) -> IntakeReport {
        IntakeReport {
            total_members: self.inspection.total_members,
            readable: self.images.len(),
            omitted: self.inspection.omitted,
            accepted: self.images.iter().map(|(name, _)| name.clone()).collect(),
            errors: self.errors.clone(),
        }
    }
}

/// Validates archives and turns their members into normalized JPEGs.
#[derive(Debug, Clone)]
pub struct IntakePipeline {
    limits: IntakeLimits,
    normalizer: ImageNormalizer,
}

impl IntakePipeline {
    /// Build from the intake configuration.
    pub fn new(config: &IntakeConfig) -> Self {
        Self {
            limits: IntakeLimits::from(config),
            normalizer: ImageNormalizer::new(config.jpeg_quality, config.effective_workers()),
        }
    }

    /// Active limits.
    pub fn limits(&self) -> &IntakeLimits {
        &self.limits
    }

    /// Check an upload against the per-file ceiling.
    pub fn check_file_size(&self, size: usize) -> Result<(), RevisionError> {
        let size = size as u64;
        if size > self.limits.max_member_bytes {
            return Err(RevisionError::PayloadTooLarge {
                size,
                limit: self.limits.max_member_bytes,
            });
        }
        Ok(())
    }

    /// Validate an archive using only its central directory.
    pub async fn inspect(&self, bytes: Bytes) -> Result<ArchiveInspection, RevisionError> {
        let limits = self.limits;
        tokio::task::spawn_blocking(move || inspect_archive(&bytes, &limits))
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Internal, "Archive task panicked", e))?
    }

    /// Inflate and normalize the members an inspection accepted.
    pub async fn extract(
        &self,
        bytes: Bytes,
        inspection: ArchiveInspection,
    ) -> Result<ProcessedArchive, RevisionError> {
        let accepted = inspection.accepted.clone();
        let (members, read_errors) =
            tokio::task::spawn_blocking(move || archive::read_members(&bytes, &accepted))
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Internal, "Archive task panicked", e)
                })??;

        let sources = members
            .into_iter()
            .map(|m| SourceImage {
                name: m.name,
                data: m.data,
            })
            .collect();
        let batch = self.normalize(sources).await?;

        let mut errors = inspection.errors.clone();
        errors.extend(read_errors);
        errors.extend(batch.errors);

        Ok(ProcessedArchive {
            inspection,
            images: batch
                .images
                .into_iter()
                .map(|(_, name, image)| (name, image))
                .collect(),
            errors,
        })
    }

    /// Inspect and extract in one step.
    pub async fn process(&self, bytes: Bytes) -> Result<ProcessedArchive, RevisionError> {
        let inspection = self.inspect(bytes.clone()).await?;
        self.extract(bytes, inspection).await
    }

    /// Normalize loose files.
    pub async fn normalize(
        &self,
        sources: Vec<SourceImage>,
    ) -> Result<NormalizedBatch, RevisionError> {
        self.normalizer.normalize_batch(sources).await
    }
}
