//! Archive intake configuration.

use serde::{Deserialize, Serialize};

/// Limits applied to uploaded archives and settings for image normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Maximum size of the uploaded archive itself.
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,
    /// Maximum number of non-directory members.
    #[serde(default = "default_max_members")]
    pub max_members: usize,
    /// Maximum sum of declared uncompressed member sizes.
    #[serde(default = "default_max_total_uncompressed")]
    pub max_total_uncompressed_bytes: u64,
    /// Maximum declared uncompressed size of a single image member.
    #[serde(default = "default_max_member_bytes")]
    pub max_member_bytes: u64,
    /// JPEG quality used when re-encoding normalized images (1-100).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Maximum concurrent decode/encode tasks (0 = available parallelism).
    #[serde(default)]
    pub worker_threads: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_archive_bytes: default_max_archive_bytes(),
            max_members: default_max_members(),
            max_total_uncompressed_bytes: default_max_total_uncompressed(),
            max_member_bytes: default_max_member_bytes(),
            jpeg_quality: default_jpeg_quality(),
            worker_threads: 0,
        }
    }
}

impl IntakeConfig {
    /// Resolve `worker_threads`, falling back to the machine's parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}

fn default_max_archive_bytes() -> u64 {
    2_000_000_000
}

fn default_max_members() -> usize {
    1200
}

fn default_max_total_uncompressed() -> u64 {
    2_000_000_000
}

fn default_max_member_bytes() -> u64 {
    25_000_000
}

fn default_jpeg_quality() -> u8 {
    92
}
