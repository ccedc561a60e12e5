//! Directory layout of a revision under the storage root.
//!
//! ```text
//! farm_<f>/sector_<s>/revision_<r>/staging/<ordinal>.jpg
//! farm_<f>/sector_<s>/revision_<r>/final/plant_<label>/<ordinal>_<label>.jpg
//! ```
//!
//! Every key produced here is relative to the storage root and built only
//! from numeric ids, ordinals, validated labels and caller-supplied tokens.

use farmhub_core::types::{FarmId, RevisionId, SectorId};

/// Key mapping for one revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionLayout {
    farm_id: FarmId,
    sector_id: SectorId,
    revision_id: RevisionId,
}

impl RevisionLayout {
    /// Build the layout for a revision.
    pub fn new(farm_id: FarmId, sector_id: SectorId, revision_id: RevisionId) -> Self {
        Self {
            farm_id,
            sector_id,
            revision_id,
        }
    }

    /// `farm_<f>/sector_<s>/revision_<r>`
    pub fn revision_dir(&self) -> String {
        format!(
            "farm_{}/sector_{}/revision_{}",
            self.farm_id, self.sector_id, self.revision_id
        )
    }

    /// Directory holding the staging photos.
    pub fn staging_dir(&self) -> String {
        format!("{}/staging", self.revision_dir())
    }

    /// Canonical staging key for an ordinal.
    pub fn staging_key(&self, ordinal: i32) -> String {
        format!("{}/{ordinal}.jpg", self.staging_dir())
    }

    /// Directory holding the finalized per-plant folders.
    pub fn final_dir(&self) -> String {
        format!("{}/final", self.revision_dir())
    }

    /// Final key of a labeled photo.
    pub fn final_key(&self, ordinal: i32, label: &str) -> String {
        format!("{}/plant_{label}/{ordinal}_{label}.jpg", self.final_dir())
    }

    /// Scratch key inside the staging directory used while renumbering.
    pub fn temp_key(&self, token: &str) -> String {
        format!("{}/.reindex-{token}.tmp", self.staging_dir())
    }

    /// Where the previous staging directory is parked during a replace.
    pub fn set_aside_dir(&self, token: &str) -> String {
        format!("{}/.staging-{token}", self.revision_dir())
    }
}

/// Reduce an uploaded name to a safe single path segment.
///
/// Backslashes count as separators, only the last segment is kept, and any
/// character outside `[A-Za-z0-9._-]` becomes `_`. A result made only of
/// dots (or nothing) is replaced by `_`.
pub fn sanitize_filename(name: &str) -> String {
    let normalized = name.replace('\\', "/");
    let last = normalized.rsplit('/').next().unwrap_or_default();

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}
