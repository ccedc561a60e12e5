//! Revision entity model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use farmhub_core::types::{FarmId, RevisionId, SectorId};

use super::state::RevisionState;

/// One inspection of a sector on a given date.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Revision {
    /// Revision identifier.
    pub id: RevisionId,
    /// Owning farm.
    pub farm_id: FarmId,
    /// Inspected sector.
    pub sector_id: SectorId,
    /// Inspection date.
    pub revision_date: NaiveDate,
    /// Free-text inspection type.
    pub revision_type: Option<String>,
    /// Photo count fixed at creation from the sector's plant count.
    pub expected_photo_count: i32,
    /// Lifecycle state.
    pub state: RevisionState,
    /// When the revision was created.
    pub created_at: DateTime<Utc>,
    /// When the revision was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Revision {
    /// Whether photos can still be added, removed or replaced.
    pub fn is_staging(&self) -> bool {
        self.state == RevisionState::Staging
    }

    /// The expected photo count as a `usize`.
    pub fn expected(&self) -> usize {
        usize::try_from(self.expected_photo_count).unwrap_or(0)
    }
}

/// Data required to create a revision record under a reserved id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRevision {
    /// Id previously reserved from the revision sequence.
    pub id: RevisionId,
    /// Owning farm.
    pub farm_id: FarmId,
    /// Inspected sector.
    pub sector_id: SectorId,
    /// Inspection date.
    pub revision_date: NaiveDate,
    /// Free-text inspection type.
    pub revision_type: Option<String>,
    /// Expected photo count.
    pub expected_photo_count: i32,
}
