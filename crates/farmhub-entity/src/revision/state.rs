//! Lifecycle states for revisions and their photos.

use serde::{Deserialize, Serialize};

/// Lifecycle of a revision. `Staging` is initial, `Finalizada` terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "revision_state", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RevisionState {
    /// Photos can still be added, removed, or replaced.
    Staging,
    /// Photos carry plant labels and live in the final layout.
    Finalizada,
}

impl RevisionState {
    /// Return the state as it is stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staging => "STAGING",
            Self::Finalizada => "FINALIZADA",
        }
    }

    /// Whether the revision may still be mutated.
    pub fn is_mutable(&self) -> bool {
        matches!(self, Self::Staging)
    }
}

impl std::fmt::Display for RevisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a single photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "photo_state", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PhotoState {
    /// Stored under the revision's staging directory.
    Staging,
    /// Labeled and moved under its plant directory.
    Final,
}

impl PhotoState {
    /// Return the state as it is stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staging => "STAGING",
            Self::Final => "FINAL",
        }
    }
}

impl std::fmt::Display for PhotoState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
