//! Farm and sector entities. FarmHub only reads these tables.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use farmhub_core::types::{FarmId, SectorId};

/// A farm.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Farm {
    /// Farm identifier.
    pub id: FarmId,
    /// Display name.
    pub name: String,
}

/// A sector of a farm.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Sector {
    /// Sector identifier.
    pub id: SectorId,
    /// The farm owning the sector.
    pub farm_id: FarmId,
    /// Display name.
    pub name: String,
    /// Number of plants registered in the sector. A revision created from
    /// an archive must carry exactly this many photos.
    pub plant_count: i32,
}

impl Sector {
    /// Whether this sector belongs to the given farm.
    pub fn belongs_to(&self, farm_id: FarmId) -> bool {
        self.farm_id == farm_id
    }
}
