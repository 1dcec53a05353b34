//! Snapshot file format.

use crate::entity::EntityId;
use serde::{Deserialize, Serialize};

/// Current snapshot format version.
pub const FORMAT_VERSION: (u16, u16) = (1, 0);

/// The on-disk snapshot of committed store state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    /// Format version (major, minor). Major mismatches are rejected.
    pub format_version: (u16, u16),
    /// All committed records, ordered by (collection, entity id).
    pub records: Vec<SnapshotRecord>,
}

impl SnapshotFile {
    /// Creates a snapshot with the current format version.
    #[must_use]
    pub fn new(records: Vec<SnapshotRecord>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            records,
        }
    }

    /// Checks if this snapshot can be read by the current code.
    #[must_use]
    pub fn is_compatible(&self) -> bool {
        self.format_version.0 == FORMAT_VERSION.0
    }
}

/// One committed record in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Collection name.
    pub collection: String,
    /// Entity ID.
    pub entity_id: EntityId,
    /// Committed version counter.
    pub version: u64,
    /// Natural id, if the entity has one.
    pub natural_id: Option<String>,
    /// Entity payload (CBOR bytes).
    pub payload: Vec<u8>,
}
