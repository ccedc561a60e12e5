//! Validation of the plant-number mapping submitted at finalize.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use farmhub_core::types::PhotoId;
use farmhub_entity::revision::RevisionPhoto;

use crate::error::RevisionError;

/// Longest accepted plant number.
pub const MAX_LABEL_DIGITS: usize = 5;

/// One entry of a finalize request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelAssignment {
    pub photo_id: PhotoId,
    pub label: String,
}

/// `^\d{1,5}$`
pub fn is_valid_label(label: &str) -> bool {
    (1..=MAX_LABEL_DIGITS).contains(&label.len()) && label.bytes().all(|b| b.is_ascii_digit())
}

/// Check an assignment against the revision's current photos.
///
/// Returns `(photo_id, trimmed label)` in submission order.
pub fn validate_assignment(
    photos: &[RevisionPhoto],
    assignments: &[LabelAssignment],
) -> Result<Vec<(PhotoId, String)>, RevisionError> {
    if assignments.len() != photos.len() {
        return Err(RevisionError::AssignmentCountMismatch {
            assigned: assignments.len(),
            photos: photos.len(),
        });
    }

    let labeled: Vec<(PhotoId, String)> = assignments
        .iter()
        .map(|a| (a.photo_id, a.label.trim().to_string()))
        .collect();

    if let Some((_, label)) = labeled.iter().find(|(_, label)| !is_valid_label(label)) {
        return Err(RevisionError::InvalidLabel {
            label: label.clone(),
        });
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(labeled.len());
    for (_, label) in &labeled {
        if !seen.insert(label.as_str()) {
            return Err(RevisionError::DuplicateLabel {
                label: label.clone(),
            });
        }
    }

    let current: BTreeSet<PhotoId> = photos.iter().map(|p| p.id).collect();
    let mut assigned = BTreeSet::new();
    let mut unexpected = Vec::new();
    for (photo_id, _) in &labeled {
        if !current.contains(photo_id) || !assigned.insert(*photo_id) {
            unexpected.push(*photo_id);
        }
    }
    let missing: Vec<PhotoId> = current.difference(&assigned).copied().collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(RevisionError::AssignmentIdMismatch {
            missing,
            unexpected,
        });
    }

    Ok(labeled)
}
