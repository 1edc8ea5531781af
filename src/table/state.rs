//! Persistent per-table state, stored under the reserved `_state` key
//! inside the table's root bucket.

use cbordata::Cborize;

use crate::{store::Bucket, table::STATE_KEY, util, Result};

const STATE_VER: u32 = 0x0001_0001;

/// Per-index persistent state. Ordinals are allocated once, at first
/// registration, and never reused.
#[derive(Clone, Debug, Default, Eq, PartialEq, Cborize)]
pub struct IndexState {
    pub name: String,
    pub ordinal: u32,
    pub built: bool,
}

impl IndexState {
    const ID: u32 = STATE_VER;
}

/// Per-table persistent state.
#[derive(Clone, Debug, Default, Eq, PartialEq, Cborize)]
pub struct TableState {
    /// Smallest schema version that may still be stored in a row.
    pub min_schema_version: u32,
    /// Last ordinal handed out to a secondary index of this table.
    pub last_ordinal: u32,
    pub indices: Vec<IndexState>,
    /// Unix seconds of the last open.
    pub last_seen_at: i64,
    /// Count of rows ever deleted from this table.
    pub deletion_count: u64,
}

impl TableState {
    const ID: u32 = STATE_VER;

    pub fn load(root: &Bucket) -> Result<Option<TableState>> {
        match root.get(STATE_KEY)? {
            Some(bytes) => {
                let (state, _) = util::from_cbor_bytes::<TableState>(&bytes)?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    pub fn save(&self, root: &Bucket) -> Result<()> {
        let bytes = util::into_cbor_bytes(self.clone())?;
        root.put(STATE_KEY, &bytes)
    }

    pub fn index(&self, name: &str) -> Option<&IndexState> {
        self.indices.iter().find(|ix| ix.name == name)
    }

    pub fn index_mut(&mut self, name: &str) -> Option<&mut IndexState> {
        self.indices.iter_mut().find(|ix| ix.name == name)
    }

    /// Allocate the next index ordinal, monotonic for the life of the
    /// table.
    pub fn allocate_ordinal(&mut self) -> u32 {
        self.last_ordinal += 1;
        self.last_ordinal
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;
