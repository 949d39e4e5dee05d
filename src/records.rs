//! Replicated attachment records and their ordered, versioned container
//!
//! `AttachmentRecordSet` is the unit of synchronization: a flat, uniquely
//! keyed list of records in insertion order. Every successful mutation is
//! observable twice, independently: the local dispatch layer drains queued
//! `RecordEvent`s, and the delta-sync layer diffs per-record
//! `change_version`s against the collection `generation`
//! (see [`crate::sync::DeltaTracker`]).

use serde::{Deserialize, Serialize};

use crate::core::types::{ComponentTag, ItemDefId, ItemId, SlotId, SocketName, Transform};

/// One item's physical attachment, as replicated.
///
/// Carries identifiers and definition references only; live scene handles
/// never go over the wire and are reconstructed by handler dispatch on the
/// observing side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub item_id: ItemId,
    /// Owning item when this record comes from an item socketed into
    /// another item; `None` for root-level attachments
    pub owner_id: Option<ItemId>,
    pub slot_id: SlotId,
    pub owner_slot_id: Option<SlotId>,
    /// Default socket the representation attaches to
    pub socket_name: SocketName,
    pub socket_component_tag: Option<ComponentTag>,
    /// Socket override (e.g. weapon unholstered into the hand); wins over
    /// `socket_name` while set
    pub changed_socket: Option<SocketName>,
    pub change_component_tag: Option<ComponentTag>,
    pub relative_transform: Transform,
    pub item_def: ItemDefId,
    pub owner_item_def: Option<ItemDefId>,
    /// Cosmetic override: representation is spawned from this definition
    /// instead of `item_def`
    pub visual_item_def: Option<ItemDefId>,
    /// Previous visual, kept for change detection only
    pub old_visual_item_def: Option<ItemDefId>,
    /// Bumped on every in-place mutation; drives change coalescing and
    /// delta synchronization
    pub change_version: u32,
}

impl AttachmentRecord {
    pub fn new(
        item_id: ItemId,
        slot_id: SlotId,
        item_def: ItemDefId,
        socket_name: SocketName,
    ) -> Self {
        Self {
            item_id,
            owner_id: None,
            slot_id,
            owner_slot_id: None,
            socket_name,
            socket_component_tag: None,
            changed_socket: None,
            change_component_tag: None,
            relative_transform: Transform::IDENTITY,
            item_def,
            owner_item_def: None,
            visual_item_def: None,
            old_visual_item_def: None,
            change_version: 0,
        }
    }

    /// Socket the representation should currently sit on: the override when
    /// present, the default otherwise
    pub fn final_attach_socket(&self) -> &SocketName {
        self.changed_socket.as_ref().unwrap_or(&self.socket_name)
    }

    /// Component tag counterpart of [`final_attach_socket`](Self::final_attach_socket)
    pub fn final_component_tag(&self) -> Option<&ComponentTag> {
        self.change_component_tag
            .as_ref()
            .or(self.socket_component_tag.as_ref())
    }
}

/// Mutation notification consumed by the local dispatch layer
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEvent {
    Added(ItemId),
    Changed(ItemId),
    /// Carries the removed record so detach handlers can still read it
    Removed(AttachmentRecord),
}

/// Ordered, uniquely keyed record collection with change tracking
#[derive(Debug, Default)]
pub struct AttachmentRecordSet {
    records: Vec<AttachmentRecord>,
    generation: u64,
    events: Vec<RecordEvent>,
}

impl AttachmentRecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. Adding an `item_id` already present is a successful
    /// no-op and returns `false`; existing records are never overwritten.
    pub fn add(&mut self, record: AttachmentRecord) -> bool {
        if self.contains(&record.item_id) {
            return false;
        }
        self.generation += 1;
        self.events.push(RecordEvent::Added(record.item_id));
        self.records.push(record);
        true
    }

    pub fn remove(&mut self, item_id: &ItemId) -> Option<AttachmentRecord> {
        let idx = self.records.iter().position(|r| r.item_id == *item_id)?;
        let record = self.records.remove(idx);
        self.generation += 1;
        self.events.push(RecordEvent::Removed(record.clone()));
        Some(record)
    }

    /// Mutate a record in place; bumps its `change_version` and queues a
    /// `Changed` event. Returns `false` when the id is unknown.
    pub fn update(
        &mut self,
        item_id: &ItemId,
        mutate: impl FnOnce(&mut AttachmentRecord),
    ) -> bool {
        let Some(record) = self.records.iter_mut().find(|r| r.item_id == *item_id) else {
            return false;
        };
        mutate(record);
        record.change_version = record.change_version.wrapping_add(1);
        self.generation += 1;
        self.events.push(RecordEvent::Changed(*item_id));
        true
    }

    /// Flag a record as changed without touching its fields
    pub fn mark_changed(&mut self, item_id: &ItemId) -> bool {
        self.update(item_id, |_| {})
    }

    /// Replace a record with a value received from the authority. The wire
    /// version is kept as-is so the delta tracker stays consistent.
    pub fn merge_remote(&mut self, incoming: AttachmentRecord) -> bool {
        let Some(record) = self
            .records
            .iter_mut()
            .find(|r| r.item_id == incoming.item_id)
        else {
            return false;
        };
        let item_id = incoming.item_id;
        *record = incoming;
        self.generation += 1;
        self.events.push(RecordEvent::Changed(item_id));
        true
    }

    pub fn find(&self, item_id: &ItemId) -> Option<&AttachmentRecord> {
        self.records.iter().find(|r| r.item_id == *item_id)
    }

    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.find(item_id).is_some()
    }

    /// Insertion-order iteration, for deterministic handler dispatch
    pub fn iter(&self) -> impl Iterator<Item = &AttachmentRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Collection-wide change counter, bumped on every mutation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drain queued mutation events for local dispatch
    pub fn take_events(&mut self) -> Vec<RecordEvent> {
        std::mem::take(&mut self.events)
    }
}
