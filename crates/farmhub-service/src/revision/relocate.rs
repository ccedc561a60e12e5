//! Moving a set of files as one unit.
//!
//! Sources and targets may overlap (renumbering `3.jpg` to `2.jpg` while
//! `2.jpg` becomes `1.jpg`), so every move goes through a unique scratch key
//! first. Any failure undoes the moves already made.

use tracing::{error, warn};
use uuid::Uuid;

use farmhub_core::result::AppResult;
use farmhub_core::traits::storage::StorageProvider;
use farmhub_storage::RevisionLayout;

/// One file to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// Current key.
    pub from: String,
    /// Key after the move.
    pub to: String,
}

/// Move every file to its target, or none of them.
pub async fn relocate_all(
    storage: &dyn StorageProvider,
    layout: &RevisionLayout,
    moves: &[Relocation],
) -> AppResult<()> {
    if moves.is_empty() {
        return Ok(());
    }

    let batch = Uuid::new_v4().simple().to_string();
    let scratch: Vec<String> = (0..moves.len())
        .map(|i| layout.temp_key(&format!("{batch}-{i}")))
        .collect();

    for (done, (relocation, temp)) in moves.iter().zip(&scratch).enumerate() {
        if let Err(e) = storage.rename(&relocation.from, temp).await {
            let back = reverse_pairs(&moves[..done], &scratch, Phase::Parked);
            undo(storage, &back).await;
            return Err(e);
        }
    }

    for (done, (relocation, temp)) in moves.iter().zip(&scratch).enumerate() {
        if let Err(e) = storage.rename(temp, &relocation.to).await {
            let placed = reverse_pairs(&moves[..done], &scratch, Phase::Placed);
            undo(storage, &placed).await;
            let back = reverse_pairs(moves, &scratch, Phase::Parked);
            undo(storage, &back).await;
            return Err(e);
        }
    }

    Ok(())
}

/// Move files back after a completed [`relocate_all`] whose database commit
/// failed.
pub async fn restore_all(
    storage: &dyn StorageProvider,
    layout: &RevisionLayout,
    moves: &[Relocation],
) -> AppResult<()> {
    let inverse: Vec<Relocation> = moves
        .iter()
        .map(|m| Relocation {
            from: m.to.clone(),
            to: m.from.clone(),
        })
        .collect();
    relocate_all(storage, layout, &inverse).await
}

/// Where a file sits when its move has to be reversed.
#[derive(Debug, Clone, Copy)]
enum Phase {
    /// At its scratch key; goes back to its source.
    Parked,
    /// At its target; goes back to its scratch key.
    Placed,
}

fn reverse_pairs(moves: &[Relocation], scratch: &[String], phase: Phase) -> Vec<(String, String)> {
    moves
        .iter()
        .zip(scratch)
        .map(|(m, temp)| match phase {
            Phase::Parked => (temp.clone(), m.from.clone()),
            Phase::Placed => (m.to.clone(), temp.clone()),
        })
        .collect()
}

/// Best-effort reverse moves. Failures are logged; the caller is already
/// reporting the original error.
async fn undo(storage: &dyn StorageProvider, pairs: &[(String, String)]) {
    for (from, to) in pairs {
        if let Err(e) = storage.rename(from, to).await {
            error!(from = %from, to = %to, error = %e, "Failed to undo file move");
        }
    }
}

/// Park a directory under a scratch name. Returns the scratch key, or `None`
/// if the directory did not exist.
pub async fn set_aside_dir(
    storage: &dyn StorageProvider,
    dir: &str,
    parked: &str,
) -> AppResult<Option<String>> {
    if !storage.exists(dir).await? {
        return Ok(None);
    }
    storage.rename(dir, parked).await?;
    Ok(Some(parked.to_string()))
}

/// Put a parked directory back, replacing whatever is at `dir`.
pub async fn restore_dir(storage: &dyn StorageProvider, parked: &str, dir: &str) {
    if let Err(e) = storage.delete_dir(dir).await {
        warn!(dir, error = %e, "Failed to clear directory before restore");
    }
    if let Err(e) = storage.rename(parked, dir).await {
        error!(parked, dir, error = %e, "Failed to restore parked directory");
    }
}
