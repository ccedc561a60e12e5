//! Image normalization: any supported input becomes an RGB JPEG.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::future::try_join_all;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use tokio::sync::Semaphore;
use tracing::debug;

use farmhub_core::error::{AppError, ErrorKind};

use crate::error::{IntakeItemError, RevisionError};

/// Default JPEG quality for stored photos.
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// A re-encoded photo ready to be written.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// JPEG bytes.
    pub data: Bytes,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Decode `bytes`, drop any alpha channel or palette, and re-encode as JPEG.
///
/// Pure and CPU bound; call it from the blocking pool.
pub fn normalize(bytes: &[u8], quality: u8) -> Result<NormalizedImage, String> {
    let decoded = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut out = Vec::new();
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)))
        .map_err(|e| e.to_string())?;

    Ok(NormalizedImage {
        data: Bytes::from(out),
        width,
        height,
    })
}

/// One input to a batch normalization.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Sanitized file name, reported in item errors.
    pub name: String,
    /// Encoded bytes as uploaded.
    pub data: Vec<u8>,
}

/// Outcome of normalizing a batch: successes keep their input position.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    /// `(input position, name, image)` for every decodable input, ascending
    /// by position.
    pub images: Vec<(usize, String, NormalizedImage)>,
    /// One entry per input that failed to decode.
    pub errors: Vec<IntakeItemError>,
}

/// Runs [`normalize`] over many inputs with bounded parallelism.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    quality: u8,
    limiter: Arc<Semaphore>,
    workers: usize,
}

impl ImageNormalizer {
    /// Create a normalizer allowing `workers` concurrent decode/encode tasks.
    pub fn new(quality: u8, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            quality,
            limiter: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// JPEG quality in use.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Normalize every input. A decode failure becomes an item error; only
    /// a failure of the worker pool itself aborts the batch.
    pub async fn normalize_batch(
        &self,
        sources: Vec<SourceImage>,
    ) -> Result<NormalizedBatch, RevisionError> {
        let started = Instant::now();
        let count = sources.len();

        let tasks = sources.into_iter().enumerate().map(|(position, source)| {
            let limiter = Arc::clone(&self.limiter);
            let quality = self.quality;
            async move {
                let _permit = limiter.acquire_owned().await.map_err(|e| {
                    AppError::with_source(ErrorKind::Internal, "Image worker pool closed", e)
                })?;
                let SourceImage { name, data } = source;
                let result = tokio::task::spawn_blocking(move || normalize(&data, quality))
                    .await
                    .map_err(|e| {
                        AppError::with_source(ErrorKind::Internal, "Image worker panicked", e)
                    })?;
                Ok::<_, AppError>((position, name, result))
            }
        });

        let mut batch = NormalizedBatch::default();
        for (position, name, result) in try_join_all(tasks).await? {
            match result {
                Ok(image) => batch.images.push((position, name, image)),
                Err(reason) => batch.errors.push(IntakeItemError::new(name, reason)),
            }
        }
        batch.images.sort_by_key(|(position, _, _)| *position);

        debug!(
            inputs = count,
            decoded = batch.images.len(),
            failed = batch.errors.len(),
            workers = self.workers,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Normalized image batch"
        );

        Ok(batch)
    }
}
