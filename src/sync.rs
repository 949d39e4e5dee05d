//! Delta synchronization pass
//!
//! The authority runs a `DeltaTracker` per observer connection. Each
//! synchronization pass diffs the record set's per-record versions against
//! what the tracker last shipped and yields flat, serializable deltas. The
//! observer feeds them to [`crate::engine::AttachmentEngine::apply_delta`],
//! which reconstructs representations through the normal handler pipeline.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::ItemId;
use crate::records::{AttachmentRecord, AttachmentRecordSet};

/// One wire-level mutation of the record set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordDelta {
    Added(AttachmentRecord),
    Changed(AttachmentRecord),
    Removed(ItemId),
}

/// Per-observer diff state
#[derive(Debug, Default)]
pub struct DeltaTracker {
    seen: AHashMap<ItemId, u32>,
    generation: u64,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the deltas an observer needs to catch up with `set`.
    ///
    /// Added/Changed deltas come out in the set's insertion order; removals
    /// follow. Calling twice without intervening mutations yields nothing.
    pub fn collect(&mut self, set: &AttachmentRecordSet) -> Vec<RecordDelta> {
        if self.generation == set.generation() {
            return Vec::new();
        }

        let mut deltas = Vec::new();
        for record in set.iter() {
            match self.seen.get(&record.item_id) {
                None => {
                    self.seen.insert(record.item_id, record.change_version);
                    deltas.push(RecordDelta::Added(record.clone()));
                }
                Some(version) if *version != record.change_version => {
                    self.seen.insert(record.item_id, record.change_version);
                    deltas.push(RecordDelta::Changed(record.clone()));
                }
                Some(_) => {}
            }
        }

        let removed: Vec<ItemId> = self
            .seen
            .keys()
            .filter(|id| !set.contains(id))
            .copied()
            .collect();
        for id in removed {
            self.seen.remove(&id);
            deltas.push(RecordDelta::Removed(id));
        }

        self.generation = set.generation();
        deltas
    }
}
