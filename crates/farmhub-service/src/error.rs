//! Error taxonomy of the revision pipeline.
//!
//! Every failure the pipeline reports is a [`RevisionError`]; the HTTP layer
//! only ever sees it through the `From<RevisionError> for AppError` mapping
//! below, which fixes the status class and the machine-readable code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use farmhub_core::error::{AppError, ErrorKind};
use farmhub_core::types::{FarmId, PhotoId, RevisionId, SectorId};
use farmhub_entity::revision::RevisionState;

/// A non-fatal failure attached to one uploaded item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeItemError {
    /// Sanitized name of the archive member or uploaded file.
    pub name: String,
    /// Why the item was not accepted.
    pub reason: String,
}

impl IntakeItemError {
    /// Build an item error.
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by archive intake and the revision state machine.
#[derive(Debug, Error)]
pub enum RevisionError {
    // --- Input validation ---
    /// Upload is larger than the configured ceiling.
    #[error("Upload is {size} bytes, exceeding the {limit} byte limit")]
    PayloadTooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Configured ceiling.
        limit: u64,
    },

    /// The archive structure could not be parsed.
    #[error("Archive is invalid or corrupt: {reason}")]
    InvalidArchive {
        /// Parser message.
        reason: String,
    },

    /// The archive has no file members.
    #[error("Archive contains no files")]
    EmptyArchive,

    /// The archive has more file members than allowed.
    #[error("Archive contains {count} files, exceeding limit of {limit}")]
    TooManyMembers {
        /// Number of non-directory members.
        count: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// Declared uncompressed sizes add up to more than allowed.
    #[error("Archive declares {total} uncompressed bytes, exceeding the {limit} byte limit")]
    UncompressedSizeExceeded {
        /// Sum of declared member sizes.
        total: u64,
        /// Configured ceiling.
        limit: u64,
    },

    /// One or more uploaded files could not be decoded.
    #[error("{} uploaded file(s) could not be decoded as images", .errors.len())]
    UnreadableImage {
        /// One entry per failed file.
        errors: Vec<IntakeItemError>,
    },

    /// A finalize label is not 1 to 5 digits.
    #[error("Label '{label}' must be 1 to 5 digits")]
    InvalidLabel {
        /// The offending label as submitted.
        label: String,
    },

    /// The same label was submitted for two photos.
    #[error("Label '{label}' is assigned to more than one photo")]
    DuplicateLabel {
        /// The repeated label.
        label: String,
    },

    // --- Reference integrity ---
    /// No farm with this id.
    #[error("Farm {0} not found")]
    FarmNotFound(FarmId),

    /// No sector with this id.
    #[error("Sector {0} not found")]
    SectorNotFound(SectorId),

    /// The sector exists but belongs to another farm.
    #[error("Sector {sector_id} does not belong to farm {farm_id}")]
    SectorMismatch {
        /// Farm named in the request.
        farm_id: FarmId,
        /// Sector named in the request.
        sector_id: SectorId,
    },

    /// No revision with this id.
    #[error("Revision {0} not found")]
    RevisionNotFound(RevisionId),

    /// The photo does not exist or belongs to another revision.
    #[error("Photo {photo_id} not found in revision {revision_id}")]
    PhotoNotFound {
        /// Revision searched.
        revision_id: RevisionId,
        /// Photo requested.
        photo_id: PhotoId,
    },

    // --- State violations ---
    /// The photo count does not equal the revision's expected count.
    #[error("Expected {expected} photos, found {actual}")]
    PhotoCountMismatch {
        /// Expected photo count.
        expected: usize,
        /// Actual photo count.
        actual: usize,
        /// Per-item failures that contributed to the mismatch.
        errors: Vec<IntakeItemError>,
    },

    /// The revision is not in the state the operation needs.
    #[error("Revision {revision_id} is {state}; the operation requires STAGING")]
    InvalidState {
        /// Revision involved.
        revision_id: RevisionId,
        /// Its current state.
        state: RevisionState,
    },

    /// The assignment does not have one entry per photo.
    #[error("Assignment has {assigned} entries but the revision has {photos} photos")]
    AssignmentCountMismatch {
        /// Number of submitted entries.
        assigned: usize,
        /// Number of current photos.
        photos: usize,
    },

    /// The assignment's photo ids differ from the revision's photo ids.
    #[error("Assignment photo ids do not match the revision's photos")]
    AssignmentIdMismatch {
        /// Current photos missing from the assignment.
        missing: Vec<PhotoId>,
        /// Assigned ids that are not current photos (or repeated).
        unexpected: Vec<PhotoId>,
    },

    // --- Storage consistency ---
    /// A staging file that the database references is gone.
    #[error("Staging file for photo {photo_id} is missing: {key}")]
    SourceFileMissing {
        /// Photo whose file is missing.
        photo_id: PhotoId,
        /// Expected storage key.
        key: String,
    },

    /// Database, storage or task failure from an underlying layer.
    #[error(transparent)]
    App(#[from] AppError),
}

impl RevisionError {
    /// The stable machine-readable code reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::InvalidArchive { .. } => "INVALID_ARCHIVE",
            Self::EmptyArchive => "EMPTY_ARCHIVE",
            Self::TooManyMembers { .. } => "TOO_MANY_MEMBERS",
            Self::UncompressedSizeExceeded { .. } => "UNCOMPRESSED_SIZE_EXCEEDED",
            Self::UnreadableImage { .. } => "UNREADABLE_IMAGE",
            Self::InvalidLabel { .. } => "INVALID_LABEL",
            Self::DuplicateLabel { .. } => "DUPLICATE_LABEL",
            Self::FarmNotFound(_) => "FARM_NOT_FOUND",
            Self::SectorNotFound(_) => "SECTOR_NOT_FOUND",
            Self::SectorMismatch { .. } => "SECTOR_MISMATCH",
            Self::RevisionNotFound(_) => "REVISION_NOT_FOUND",
            Self::PhotoNotFound { .. } => "PHOTO_NOT_FOUND",
            Self::PhotoCountMismatch { .. } => "PHOTO_COUNT_MISMATCH",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::AssignmentCountMismatch { .. } => "ASSIGNMENT_COUNT_MISMATCH",
            Self::AssignmentIdMismatch { .. } => "ASSIGNMENT_ID_MISMATCH",
            Self::SourceFileMissing { .. } => "SOURCE_FILE_MISSING",
            Self::App(_) => "INTERNAL",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::UnreadableImage { errors } => Some(serde_json::json!({ "items": errors })),
            Self::PhotoCountMismatch {
                expected,
                actual,
                errors,
            } => Some(serde_json::json!({
                "expected": expected,
                "actual": actual,
                "items": errors,
            })),
            Self::AssignmentIdMismatch {
                missing,
                unexpected,
            } => Some(serde_json::json!({
                "missing": missing,
                "unexpected": unexpected,
            })),
            Self::InvalidState { state, .. } => Some(serde_json::json!({ "state": state })),
            _ => None,
        }
    }
}

impl From<RevisionError> for AppError {
    fn from(err: RevisionError) -> Self {
        let kind = match err {
            RevisionError::App(inner) => return inner,
            RevisionError::PayloadTooLarge { .. }
            | RevisionError::TooManyMembers { .. }
            | RevisionError::UncompressedSizeExceeded { .. } => ErrorKind::PayloadTooLarge,
            RevisionError::InvalidArchive { .. }
            | RevisionError::EmptyArchive
            | RevisionError::UnreadableImage { .. }
            | RevisionError::InvalidLabel { .. }
            | RevisionError::DuplicateLabel { .. }
            | RevisionError::SectorMismatch { .. } => ErrorKind::Validation,
            RevisionError::FarmNotFound(_)
            | RevisionError::SectorNotFound(_)
            | RevisionError::RevisionNotFound(_)
            | RevisionError::PhotoNotFound { .. } => ErrorKind::NotFound,
            RevisionError::PhotoCountMismatch { .. }
            | RevisionError::InvalidState { .. }
            | RevisionError::AssignmentCountMismatch { .. }
            | RevisionError::AssignmentIdMismatch { .. } => ErrorKind::Conflict,
            RevisionError::SourceFileMissing { .. } => ErrorKind::Storage,
        };

        let app = AppError::new(kind, err.to_string()).with_code(err.code());
        match err.details() {
            Some(details) => app.with_details(details),
            None => app,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        let too_big: AppError = RevisionError::UncompressedSizeExceeded {
            total: 3_000_000_000,
            limit: 2_000_000_000,
        }
        .into();
        assert_eq!(too_big.kind, ErrorKind::PayloadTooLarge);
        assert_eq!(too_big.code(), "UNCOMPRESSED_SIZE_EXCEEDED");

        let dup: AppError = RevisionError::DuplicateLabel {
            label: "1".into(),
        }
        .into();
        assert_eq!(dup.kind, ErrorKind::Validation);

        let missing: AppError = RevisionError::SectorNotFound(SectorId(9)).into();
        assert_eq!(missing.kind, ErrorKind::NotFound);

        let state: AppError = RevisionError::InvalidState {
            revision_id: RevisionId(1),
            state: RevisionState::Finalizada,
        }
        .into();
        assert_eq!(state.kind, ErrorKind::Conflict);
        assert_eq!(state.details.unwrap()["state"], "FINALIZADA");

        let file: AppError = RevisionError::SourceFileMissing {
            photo_id: PhotoId(4),
            key: "farm_1/sector_1/revision_1/staging/4.jpg".into(),
        }
        .into();
        assert_eq!(file.kind, ErrorKind::Storage);
    }

    #[test]
    fn test_underlying_errors_pass_through() {
        let inner = AppError::database("connection reset");
        let app: AppError = RevisionError::from(inner).into();
        assert_eq!(app.kind, ErrorKind::Database);
        assert_eq!(app.code, None);
    }

    #[test]
    fn test_count_mismatch_lists_items() {
        let app: AppError = RevisionError::PhotoCountMismatch {
            expected: 5,
            actual: 4,
            errors: vec![IntakeItemError::new("IMG_3.jpg", "not an image")],
        }
        .into();
        let details = app.details.unwrap();
        assert_eq!(details["expected"], 5);
        assert_eq!(details["items"][0]["name"], "IMG_3.jpg");
        assert_eq!(app.message, "Expected 5 photos, found 4");
    }
}
