//! Read access to the item store collaborator
//!
//! The engine never owns item state; it reads slot, owner and visual
//! override data through this trait when a lifecycle event fires.

use ahash::AHashMap;

use crate::core::types::{ItemDefId, ItemId, SlotId};

/// One logical item as seen by the attachment engine
#[derive(Debug, Clone, PartialEq)]
pub struct ItemEntry {
    pub id: ItemId,
    pub def: ItemDefId,
    /// Slot the item currently occupies, if any
    pub slot_id: Option<SlotId>,
    /// Owning item when socketed into another item (scope on a rifle)
    pub owner_id: Option<ItemId>,
    /// Per-instance cosmetic override, takes precedence over the
    /// definition's default visual
    pub visual_override: Option<ItemDefId>,
}

impl ItemEntry {
    pub fn new(def: ItemDefId) -> Self {
        Self {
            id: ItemId::new(),
            def,
            slot_id: None,
            owner_id: None,
            visual_override: None,
        }
    }
}

/// Read-only view of the item store
pub trait ItemStore {
    fn item(&self, id: &ItemId) -> Option<&ItemEntry>;

    fn item_in_slot(&self, slot: &SlotId) -> Option<&ItemEntry>;
}

/// Map-backed item store, the reference implementation
#[derive(Default)]
pub struct MemoryItemStore {
    items: AHashMap<ItemId, ItemEntry>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ItemEntry) -> ItemId {
        let id = entry.id;
        self.items.insert(id, entry);
        id
    }

    pub fn remove(&mut self, id: &ItemId) -> Option<ItemEntry> {
        self.items.remove(id)
    }

    pub fn set_slot(&mut self, id: &ItemId, slot: Option<SlotId>) {
        if let Some(entry) = self.items.get_mut(id) {
            entry.slot_id = slot;
        }
    }

    pub fn set_owner(&mut self, id: &ItemId, owner: Option<ItemId>) {
        if let Some(entry) = self.items.get_mut(id) {
            entry.owner_id = owner;
        }
    }

    pub fn set_visual_override(&mut self, id: &ItemId, visual: Option<ItemDefId>) {
        if let Some(entry) = self.items.get_mut(id) {
            entry.visual_override = visual;
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ItemStore for MemoryItemStore {
    fn item(&self, id: &ItemId) -> Option<&ItemEntry> {
        self.items.get(id)
    }

    fn item_in_slot(&self, slot: &SlotId) -> Option<&ItemEntry> {
        self.items
            .values()
            .find(|e| e.slot_id.as_ref() == Some(slot))
    }
}
