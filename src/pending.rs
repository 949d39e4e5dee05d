//! Deferred child attachments waiting on their owner
//!
//! When a child record references an owner whose record or representation
//! has not arrived yet, the child parks here. Entries are keyed per owner,
//! so a permanently missing owner never blocks unrelated chains.

use ahash::AHashMap;

use crate::core::types::ItemId;

#[derive(Debug, Default)]
pub struct PendingAttachments {
    by_owner: AHashMap<ItemId, Vec<ItemId>>,
}

impl PendingAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `child` until `owner` resolves. Re-adding the same pair is a no-op.
    pub fn add(&mut self, owner: ItemId, child: ItemId) {
        let children = self.by_owner.entry(owner).or_default();
        if !children.contains(&child) {
            children.push(child);
        }
    }

    /// Consume every child waiting on `owner`
    pub fn take_children(&mut self, owner: &ItemId) -> Vec<ItemId> {
        self.by_owner.remove(owner).unwrap_or_default()
    }

    /// Abandon a child wherever it is parked (child record removed before
    /// its owner ever resolved)
    pub fn abandon_child(&mut self, child: &ItemId) {
        self.by_owner.retain(|_, children| {
            children.retain(|c| c != child);
            !children.is_empty()
        });
    }

    pub fn contains_child(&self, child: &ItemId) -> bool {
        self.by_owner.values().any(|children| children.contains(child))
    }

    pub fn waiting_on(&self, owner: &ItemId) -> usize {
        self.by_owner.get(owner).map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.by_owner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_owner.values().map(|c| c.len()).sum()
    }
}
