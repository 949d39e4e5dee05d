//! Per-slot socket occupancy tracking
//!
//! A socket name may be taken by at most one record within the same slot.

use ahash::{AHashMap, AHashSet};

use crate::core::types::{SlotId, SocketName};

#[derive(Debug, Default)]
pub struct SocketOccupancyTracker {
    taken: AHashMap<SlotId, AHashSet<SocketName>>,
}

impl SocketOccupancyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a socket. Returns `false` if it was already taken on this slot.
    pub fn claim(&mut self, slot: &SlotId, socket: &SocketName) -> bool {
        self.taken
            .entry(slot.clone())
            .or_default()
            .insert(socket.clone())
    }

    /// Release a socket. Releasing a free socket is a no-op.
    pub fn release(&mut self, slot: &SlotId, socket: &SocketName) -> bool {
        match self.taken.get_mut(slot) {
            Some(sockets) => {
                let removed = sockets.remove(socket);
                if sockets.is_empty() {
                    self.taken.remove(slot);
                }
                removed
            }
            None => false,
        }
    }

    pub fn is_taken(&self, slot: &SlotId, socket: &SocketName) -> bool {
        self.taken
            .get(slot)
            .map(|sockets| sockets.contains(socket))
            .unwrap_or(false)
    }

    pub fn taken_count(&self, slot: &SlotId) -> usize {
        self.taken.get(slot).map(|s| s.len()).unwrap_or(0)
    }
}
