//! Revision photo entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use farmhub_core::types::{PhotoId, RevisionId};

use super::state::PhotoState;

/// A normalized JPEG belonging to a revision.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RevisionPhoto {
    /// Photo identifier; ascending ids follow insertion order.
    pub id: PhotoId,
    /// Owning revision.
    pub revision_id: RevisionId,
    /// 1-based position within the revision's photo set.
    pub ordinal: i32,
    /// Lifecycle state.
    pub state: PhotoState,
    /// Plant number assigned at finalize.
    pub plant_label: Option<String>,
    /// Path relative to the storage root.
    pub storage_key: String,
    /// Sanitized name the photo was uploaded under.
    pub original_filename: String,
    /// When the photo was stored.
    pub created_at: DateTime<Utc>,
}

/// Data required to insert a staging photo row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPhoto {
    /// 1-based position within the revision.
    pub ordinal: i32,
    /// Staging key the normalized file was written to.
    pub storage_key: String,
    /// Sanitized uploaded name.
    pub original_filename: String,
}

/// A new ordinal and storage key for an existing photo, produced by a reindex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoOrdinalUpdate {
    /// Photo being renumbered.
    pub photo_id: PhotoId,
    /// New 1-based ordinal.
    pub ordinal: i32,
    /// Canonical staging key for the new ordinal.
    pub storage_key: String,
}

/// The final label and location of a photo, applied at finalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoFinalUpdate {
    /// Photo being finalized.
    pub photo_id: PhotoId,
    /// Plant number.
    pub plant_label: String,
    /// Key under the plant's final directory.
    pub storage_key: String,
}
