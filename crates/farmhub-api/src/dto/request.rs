//! Request DTOs with validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use farmhub_core::types::{FarmId, PhotoId, SectorId};
use farmhub_service::revision::{LabelAssignment, NewRevisionRequest};

/// Text fields of the create-revision multipart form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateRevisionFields {
    /// Farm ID.
    #[validate(range(min = 1, message = "farm_id must be positive"))]
    pub farm_id: i64,
    /// Sector ID.
    #[validate(range(min = 1, message = "sector_id must be positive"))]
    pub sector_id: i64,
    /// Inspection date (`YYYY-MM-DD`).
    pub date: NaiveDate,
    /// Inspection type.
    #[validate(length(min = 1, max = 100, message = "revision_type must be 1 to 100 characters"))]
    pub revision_type: Option<String>,
}

impl From<CreateRevisionFields> for NewRevisionRequest {
    fn from(fields: CreateRevisionFields) -> Self {
        Self {
            farm_id: FarmId(fields.farm_id),
            sector_id: SectorId(fields.sector_id),
            revision_date: fields.date,
            revision_type: fields.revision_type,
        }
    }
}

/// One photo-to-plant entry of a finalize request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentEntry {
    /// Photo ID.
    pub photo_id: PhotoId,
    /// Plant number.
    pub label: String,
}

/// Finalize request body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FinalizeRequest {
    /// One entry per photo of the revision.
    #[validate(length(min = 1, message = "assignments must not be empty"))]
    pub assignments: Vec<AssignmentEntry>,
}

impl FinalizeRequest {
    /// Convert to the service's assignment type.
    pub fn into_assignments(self) -> Vec<LabelAssignment> {
        self.assignments
            .into_iter()
            .map(|a| LabelAssignment {
                photo_id: a.photo_id,
                label: a.label,
            })
            .collect()
    }
}
