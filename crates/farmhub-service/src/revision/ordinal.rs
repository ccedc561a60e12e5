//! Ordinal assignment and renumbering.

use farmhub_core::types::PhotoId;
use farmhub_entity::revision::{PhotoOrdinalUpdate, RevisionPhoto};
use farmhub_storage::RevisionLayout;

use super::relocate::Relocation;

/// Ordinal for the photo appended after `count` existing ones.
pub fn next_ordinal(count: usize) -> i32 {
    i32::try_from(count).map_or(i32::MAX, |c| c.saturating_add(1))
}

/// A photo whose ordinal or key changes in a reindex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexMove {
    pub photo_id: PhotoId,
    pub old_ordinal: i32,
    pub new_ordinal: i32,
    pub old_key: String,
    pub new_key: String,
}

/// Changes needed to make a revision's ordinals contiguous again.
#[derive(Debug, Clone, Default)]
pub struct ReindexPlan {
    pub moves: Vec<ReindexMove>,
}

impl ReindexPlan {
    /// Nothing to do.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// File moves of photos whose key changes.
    pub fn relocations(&self) -> Vec<Relocation> {
        self.moves
            .iter()
            .filter(|m| m.old_key != m.new_key)
            .map(|m| Relocation {
                from: m.old_key.clone(),
                to: m.new_key.clone(),
            })
            .collect()
    }

    /// Row updates for the whole plan.
    pub fn updates(&self) -> Vec<PhotoOrdinalUpdate> {
        self.moves
            .iter()
            .map(|m| PhotoOrdinalUpdate {
                photo_id: m.photo_id,
                ordinal: m.new_ordinal,
                storage_key: m.new_key.clone(),
            })
            .collect()
    }
}

/// Renumber surviving staging photos 1..N in insertion (id) order.
pub fn plan_reindex(photos: &[RevisionPhoto], layout: &RevisionLayout) -> ReindexPlan {
    let mut by_id: Vec<&RevisionPhoto> = photos.iter().collect();
    by_id.sort_by_key(|p| p.id);

    let moves = by_id
        .into_iter()
        .enumerate()
        .filter_map(|(i, photo)| {
            let new_ordinal = next_ordinal(i);
            let new_key = layout.staging_key(new_ordinal);
            (photo.ordinal != new_ordinal || photo.storage_key != new_key).then(|| ReindexMove {
                photo_id: photo.id,
                old_ordinal: photo.ordinal,
                new_ordinal,
                old_key: photo.storage_key.clone(),
                new_key,
            })
        })
        .collect();

    ReindexPlan { moves }
}
