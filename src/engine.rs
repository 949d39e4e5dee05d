//! The attachment engine: lifecycle entry points, handler dispatch and
//! dependency resolution
//!
//! The engine owns the replicated record set plus the derived local state
//! (socket occupancy, live representations, parked children). Item data
//! and scene access stay outside; every public operation borrows them per
//! call as trait objects and threads them to handlers through an
//! [`AttachmentContext`].
//!
//! All local reactions flow through one pipeline: mutations queue
//! [`RecordEvent`](crate::records::RecordEvent)s on the record set, and
//! `pump` drains them into handler dispatch. Authority-side operations and
//! observer-side deltas therefore reconstruct representations identically.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::anim::LinkedAnimLayer;
use crate::attached::AttachedObjectIndex;
use crate::core::types::{
    AssetRef, ComponentTag, ItemDefId, ItemId, NodeId, SlotId, SocketName, Transform,
};
use crate::handlers::{AttachmentHandler, SlotTable};
use crate::items::{DefinitionResolver, ItemEntry, ItemStore, SlotEvent, SlotEventRegistry};
use crate::pending::PendingAttachments;
use crate::records::{AttachmentRecord, AttachmentRecordSet, RecordEvent};
use crate::scene::{RepresentationKind, Scene};
use crate::sockets::SocketOccupancyTracker;
use crate::sync::RecordDelta;

fn default_spawn() -> bool {
    true
}

/// Host configuration for one engine instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// When false the engine keeps records and occupancy only and never
    /// touches the scene (dedicated authority without rendering)
    #[serde(default = "default_spawn")]
    pub spawn_representations: bool,
    /// Baseline animation layers restored when an item's layers unlink
    #[serde(default)]
    pub default_anim_layers: Vec<AssetRef>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            spawn_representations: true,
            default_anim_layers: Vec::new(),
        }
    }
}

impl EngineSettings {
    pub fn headless() -> Self {
        Self {
            spawn_representations: false,
            ..Self::default()
        }
    }
}

/// Per-call view handlers operate on: the engine's state plus the
/// borrowed collaborators. Handlers receive it mutably and call back into
/// it for record and representation bookkeeping.
pub struct AttachmentContext<'a> {
    pub records: &'a mut AttachmentRecordSet,
    pub sockets: &'a mut SocketOccupancyTracker,
    pub attached: &'a mut AttachedObjectIndex,
    pub pending: &'a mut PendingAttachments,
    pub slots: &'a SlotTable,
    pub settings: &'a EngineSettings,
    pub defs: &'a dyn DefinitionResolver,
    pub scene: &'a mut dyn Scene,
    /// Record currently being torn down, readable by detach handlers
    /// after it left the set
    removed: Option<AttachmentRecord>,
}

/// Handlers responsible for one record's slot
enum HandlerSet<'s> {
    Static(&'s [Box<dyn AttachmentHandler>]),
    Built(Vec<Box<dyn AttachmentHandler>>),
    None,
}

impl HandlerSet<'_> {
    fn as_slice(&self) -> &[Box<dyn AttachmentHandler>] {
        match self {
            HandlerSet::Static(handlers) => handlers,
            HandlerSet::Built(handlers) => handlers,
            HandlerSet::None => &[],
        }
    }
}

impl<'a> AttachmentContext<'a> {
    /// Record by id, still answering during its own teardown
    pub fn lookup_record(&self, item_id: &ItemId) -> Option<AttachmentRecord> {
        if let Some(record) = self.records.find(item_id) {
            return Some(record.clone());
        }
        self.removed
            .as_ref()
            .filter(|r| r.item_id == *item_id)
            .cloned()
    }

    /// Insert a record and claim its socket. Re-adding an existing id is a
    /// no-op returning `false`; the original record always wins.
    pub fn add_attached_record(&mut self, record: AttachmentRecord) -> bool {
        let slot = record.slot_id.clone();
        let socket = record.socket_name.clone();
        if !self.records.add(record) {
            return false;
        }
        if !self.sockets.claim(&slot, &socket) {
            tracing::debug!(slot = %slot, socket = %socket, "socket already occupied on this slot");
        }
        true
    }

    /// Remove a record, release its socket and abandon any parked entry
    pub fn remove_record(&mut self, item_id: &ItemId) -> Option<AttachmentRecord> {
        let record = self.records.remove(item_id)?;
        self.sockets.release(&record.slot_id, &record.socket_name);
        self.pending.abandon_child(item_id);
        Some(record)
    }

    /// Register a spawned representation and replay children that were
    /// waiting for this item to resolve
    pub fn register_attachment(
        &mut self,
        item_id: ItemId,
        def: ItemDefId,
        node: NodeId,
        kind: RepresentationKind,
    ) {
        self.attached.add(def, node, kind);
        self.resolve_pending(item_id);
    }

    fn resolve_pending(&mut self, owner: ItemId) {
        let children = self.pending.take_children(&owner);
        for child in children {
            tracing::debug!(owner = %owner, child = %child, "owner resolved, replaying deferred attachment");
            self.handle_record_added(child);
        }
    }

    fn handlers_for(&self, owner_def_id: Option<ItemDefId>, slot_id: &SlotId) -> HandlerSet<'a> {
        if let Some(owner_def_id) = owner_def_id {
            if let Some(owner_def) = self.defs.resolve(&owner_def_id) {
                if let Some(fragment) = owner_def.attachment_slots() {
                    if let Some(slot) = fragment.slots.iter().find(|s| s.slot_id == *slot_id) {
                        return HandlerSet::Built(slot.build_handlers());
                    }
                }
            }
        }
        let table: &'a SlotTable = self.slots;
        match table.get(slot_id) {
            Some(built) => HandlerSet::Static(built.handlers()),
            None => HandlerSet::None,
        }
    }

    /// First-true-wins dispatch for an item entering a slot. An item
    /// socketed into an owner whose definition exposes the slot uses the
    /// owner's handlers instead of the static table.
    pub(crate) fn dispatch_added_to_slot(
        &mut self,
        slot_id: &SlotId,
        item: &ItemEntry,
        owner: Option<&ItemEntry>,
    ) -> bool {
        let dispatch_slot = item.slot_id.as_ref().unwrap_or(slot_id);
        let handlers = self.handlers_for(owner.map(|o| o.def), dispatch_slot);
        for handler in handlers.as_slice() {
            if handler.handle_item_added_to_slot(self, item, owner) {
                return true;
            }
        }
        false
    }

    /// Removal notifies every handler of the slot; only the add
    /// short-circuits
    pub(crate) fn dispatch_removed_from_slot(
        &mut self,
        slot_id: &SlotId,
        item: &ItemEntry,
        owner: Option<&ItemEntry>,
    ) {
        let handlers = self.handlers_for(owner.map(|o| o.def), slot_id);
        for handler in handlers.as_slice() {
            handler.handle_item_removed_from_slot(self, item, slot_id, owner);
        }
    }

    /// React to a record entering the set: spawn now, or park the item
    /// until its owner resolves
    pub(crate) fn handle_record_added(&mut self, item_id: ItemId) {
        if !self.settings.spawn_representations {
            return;
        }
        let Some(record) = self.records.find(&item_id).cloned() else {
            return;
        };
        if self.attached.contains(&record.item_def) {
            return;
        }
        if !self.scene.avatar_ready() {
            tracing::debug!(item = %item_id, "avatar not ready, spawn deferred");
            return;
        }
        if let Some(owner_id) = record.owner_id {
            let owner_resolved = self.records.contains(&owner_id)
                && record
                    .owner_item_def
                    .map(|def| self.attached.contains(&def))
                    .unwrap_or(false);
            if !owner_resolved {
                tracing::debug!(item = %item_id, owner = %owner_id, "owner not resolved, attachment parked");
                self.pending.add(owner_id, item_id);
                return;
            }
        }
        let handlers = self.handlers_for(record.owner_item_def, &record.slot_id);
        for handler in handlers.as_slice() {
            handler.handle_item_attach(self, record.item_id, record.owner_id);
        }
    }

    pub(crate) fn handle_record_changed(&mut self, item_id: ItemId) {
        if !self.settings.spawn_representations {
            return;
        }
        let Some(record) = self.records.find(&item_id).cloned() else {
            return;
        };
        // a change can be the first chance to spawn (record arrived while
        // the avatar was missing or the owner unresolved)
        if !self.attached.contains(&record.item_def) {
            self.handle_record_added(item_id);
            // still no representation: the record stays parked or
            // deferred, and the eventual replay spawns from the record's
            // current state; dispatching changed handlers now would spawn
            // past the pending gate with a wrong parent
            if !self.attached.contains(&record.item_def) {
                return;
            }
        }
        let handlers = self.handlers_for(record.owner_item_def, &record.slot_id);
        for handler in handlers.as_slice() {
            handler.handle_attachment_changed(self, &record);
        }
        self.apply_socket_change(&record);
    }

    pub(crate) fn handle_record_removed(&mut self, record: AttachmentRecord) {
        if !self.settings.spawn_representations {
            return;
        }
        let handlers = self.handlers_for(record.owner_item_def, &record.slot_id);
        self.removed = Some(record.clone());
        for handler in handlers.as_slice() {
            handler.handle_item_detach(self, record.item_id, record.owner_id);
        }
        self.removed = None;
        // anything no handler claimed still must not leak
        for (node, _) in self.attached.remove_all(&record.item_def) {
            self.scene.destroy(node);
        }
    }

    /// Move the live representation onto the record's current socket
    fn apply_socket_change(&mut self, record: &AttachmentRecord) {
        let Some(node) = self.attached.first(&record.item_def) else {
            return;
        };
        let parent = self.current_parent(record);
        let socket = record.final_attach_socket().clone();
        if self.scene.attach(node, parent, &socket) {
            tracing::info!(item = %record.item_id, socket = %socket, "representation moved to socket");
        }
    }

    fn current_parent(&self, record: &AttachmentRecord) -> NodeId {
        if let Some(owner_def) = &record.owner_item_def {
            if let Some(node) = self.attached.first(owner_def) {
                return node;
            }
        }
        if let Some(tag) = record.final_component_tag() {
            if let Some(node) = self.scene.find_tagged(tag) {
                return node;
            }
        }
        self.scene.root()
    }

    /// Drain queued record events into handler dispatch until quiescent
    pub(crate) fn pump(&mut self) {
        loop {
            let events = self.records.take_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                match event {
                    RecordEvent::Added(id) => self.handle_record_added(id),
                    RecordEvent::Changed(id) => self.handle_record_changed(id),
                    RecordEvent::Removed(record) => self.handle_record_removed(record),
                }
            }
        }
    }
}

/// Replicated item attachment engine
pub struct AttachmentEngine {
    slots: Arc<SlotTable>,
    settings: EngineSettings,
    records: AttachmentRecordSet,
    sockets: SocketOccupancyTracker,
    attached: AttachedObjectIndex,
    pending: PendingAttachments,
    linked_layer: Option<LinkedAnimLayer>,
    events: SlotEventRegistry,
}

impl AttachmentEngine {
    pub fn new(slots: Arc<SlotTable>, settings: EngineSettings) -> Self {
        Self {
            slots,
            settings,
            records: AttachmentRecordSet::new(),
            sockets: SocketOccupancyTracker::new(),
            attached: AttachedObjectIndex::new(),
            pending: PendingAttachments::new(),
            linked_layer: None,
            events: SlotEventRegistry::new(),
        }
    }

    fn context<'a>(
        &'a mut self,
        defs: &'a dyn DefinitionResolver,
        scene: &'a mut dyn Scene,
    ) -> AttachmentContext<'a> {
        AttachmentContext {
            records: &mut self.records,
            sockets: &mut self.sockets,
            attached: &mut self.attached,
            pending: &mut self.pending,
            slots: self.slots.as_ref(),
            settings: &self.settings,
            defs,
            scene,
            removed: None,
        }
    }

    /// Item entered a slot on the authority. Builds the record through
    /// first-true-wins handler dispatch and spawns locally when possible.
    pub fn on_item_added_to_slot(
        &mut self,
        store: &dyn ItemStore,
        defs: &dyn DefinitionResolver,
        scene: &mut dyn Scene,
        slot_id: &SlotId,
        item_id: ItemId,
    ) {
        let Some(item) = store.item(&item_id).cloned() else {
            tracing::warn!(item = %item_id, slot = %slot_id, "added to slot but unknown to the item store");
            return;
        };
        let owner = item.owner_id.and_then(|oid| store.item(&oid).cloned());

        let mut ctx = self.context(defs, scene);
        let handled = ctx.dispatch_added_to_slot(slot_id, &item, owner.as_ref());
        ctx.pump();

        if handled {
            self.events.broadcast(&SlotEvent::AddedToSlot {
                slot: slot_id.clone(),
                item: item_id,
            });
        }
    }

    pub fn on_item_removed_from_slot(
        &mut self,
        store: &dyn ItemStore,
        defs: &dyn DefinitionResolver,
        scene: &mut dyn Scene,
        slot_id: &SlotId,
        item_id: ItemId,
    ) {
        let item = store.item(&item_id).cloned();
        let owner = item
            .as_ref()
            .and_then(|i| i.owner_id)
            .and_then(|oid| store.item(&oid).cloned());

        let mut ctx = self.context(defs, scene);
        if let Some(item) = &item {
            ctx.dispatch_removed_from_slot(slot_id, item, owner.as_ref());
        }
        // idempotent when a handler already removed it; also covers items
        // the store no longer knows
        ctx.remove_record(&item_id);
        ctx.pump();

        self.events.broadcast(&SlotEvent::RemovedFromSlot {
            slot: slot_id.clone(),
            item: item_id,
        });
    }

    /// Item socketed into another item already sitting in a slot
    pub fn on_item_attached_to_socket(
        &mut self,
        store: &dyn ItemStore,
        defs: &dyn DefinitionResolver,
        scene: &mut dyn Scene,
        owner_slot: &SlotId,
        owner_item: ItemId,
        socket_slot: &SlotId,
        socket_item: ItemId,
    ) {
        let Some(item) = store.item(&socket_item).cloned() else {
            return;
        };
        let owner = store.item(&owner_item).cloned();

        let mut ctx = self.context(defs, scene);
        ctx.dispatch_added_to_slot(socket_slot, &item, owner.as_ref());
        ctx.pump();

        self.events.broadcast(&SlotEvent::AttachedToSocket {
            owner_slot: owner_slot.clone(),
            owner_item,
            socket_slot: socket_slot.clone(),
            socket_item,
        });
    }

    /// Replay spawns for records that arrived before the avatar existed
    pub fn on_avatar_ready(&mut self, defs: &dyn DefinitionResolver, scene: &mut dyn Scene) {
        let ids: Vec<ItemId> = self.records.iter().map(|r| r.item_id).collect();
        let mut ctx = self.context(defs, scene);
        for id in ids {
            ctx.handle_record_added(id);
        }
        ctx.pump();
    }

    /// Observer-side ingestion of one synchronization pass. Records are
    /// applied in wire order; representations rebuild through the same
    /// pipeline the authority uses, so arrival order does not matter.
    pub fn apply_delta(
        &mut self,
        defs: &dyn DefinitionResolver,
        scene: &mut dyn Scene,
        deltas: Vec<RecordDelta>,
    ) {
        let mut ctx = self.context(defs, scene);
        for delta in deltas {
            match delta {
                RecordDelta::Added(record) => {
                    ctx.add_attached_record(record);
                }
                RecordDelta::Changed(record) => {
                    if !ctx.records.merge_remote(record.clone()) {
                        // change overtook its add on the wire
                        ctx.add_attached_record(record);
                    }
                }
                RecordDelta::Removed(id) => {
                    ctx.remove_record(&id);
                }
            }
        }
        ctx.pump();
    }

    /// Override the socket an attached item sits on (weapon into the hand)
    pub fn attach_item_to_socket(
        &mut self,
        defs: &dyn DefinitionResolver,
        scene: &mut dyn Scene,
        item_id: ItemId,
        socket: SocketName,
        tag: Option<ComponentTag>,
        transform: Transform,
    ) {
        let mut ctx = self.context(defs, scene);
        let updated = ctx.records.update(&item_id, |r| {
            r.changed_socket = Some(socket);
            r.change_component_tag = tag;
            r.relative_transform = transform;
        });
        if updated {
            ctx.pump();
        } else {
            tracing::warn!(item = %item_id, "socket override for item without a record");
        }
    }

    /// Clear the socket override; the representation returns to the
    /// record's default socket
    pub fn detach_item_from_socket(
        &mut self,
        defs: &dyn DefinitionResolver,
        scene: &mut dyn Scene,
        item_id: ItemId,
    ) {
        let mut ctx = self.context(defs, scene);
        let updated = ctx.records.update(&item_id, |r| {
            r.changed_socket = None;
            r.change_component_tag = None;
        });
        if updated {
            ctx.pump();
        }
    }

    /// Render the item as a different definition
    pub fn set_visual_item_attachment(
        &mut self,
        defs: &dyn DefinitionResolver,
        scene: &mut dyn Scene,
        item_id: ItemId,
        visual: ItemDefId,
    ) {
        let mut ctx = self.context(defs, scene);
        let updated = ctx.records.update(&item_id, |r| {
            r.old_visual_item_def = r.visual_item_def;
            r.visual_item_def = Some(visual);
        });
        if updated {
            ctx.pump();
        }
    }

    /// Restore the definition's default visual, or clear the override when
    /// the definition has none
    pub fn reset_visual_item_attachment(
        &mut self,
        defs: &dyn DefinitionResolver,
        scene: &mut dyn Scene,
        item_id: ItemId,
    ) {
        let default_visual = self
            .records
            .find(&item_id)
            .and_then(|r| defs.resolve(&r.item_def))
            .and_then(|def| def.visual_attachment().and_then(|f| f.default_visual));

        let mut ctx = self.context(defs, scene);
        let updated = ctx.records.update(&item_id, |r| {
            r.old_visual_item_def = r.visual_item_def;
            r.visual_item_def = default_visual;
        });
        if updated {
            ctx.pump();
        }
    }

    pub fn link_anim_layer_for_slot(
        &mut self,
        store: &dyn ItemStore,
        defs: &dyn DefinitionResolver,
        scene: &mut dyn Scene,
        slot: &SlotId,
    ) {
        let Some(item) = store.item_in_slot(slot) else {
            return;
        };
        let (item_id, def_id) = (item.id, item.def);
        self.link_layers_from_def(defs, scene, item_id, def_id);
    }

    pub fn link_anim_layer_for_item(
        &mut self,
        store: &dyn ItemStore,
        defs: &dyn DefinitionResolver,
        scene: &mut dyn Scene,
        item_id: ItemId,
    ) {
        let Some(item) = store.item(&item_id) else {
            return;
        };
        let def_id = item.def;
        self.link_layers_from_def(defs, scene, item_id, def_id);
    }

    fn link_layers_from_def(
        &mut self,
        defs: &dyn DefinitionResolver,
        scene: &mut dyn Scene,
        item_id: ItemId,
        def_id: ItemDefId,
    ) {
        let Some(def) = defs.resolve(&def_id) else {
            return;
        };
        let Some(fragment) = def.anim_layer() else {
            return;
        };
        let layer = LinkedAnimLayer::from_item(fragment.layers.clone(), def_id, item_id);
        self.apply_linked_anim_layer(scene, layer);
    }

    /// Unlink the slot item's layers and restore the configured baseline
    pub fn unlink_anim_layer(
        &mut self,
        store: &dyn ItemStore,
        scene: &mut dyn Scene,
        slot: &SlotId,
    ) {
        let item = store.item_in_slot(slot).map(|i| i.id);
        let baseline = LinkedAnimLayer::baseline(self.settings.default_anim_layers.clone(), item);
        self.apply_linked_anim_layer(scene, baseline);
    }

    /// Swap the scene's linked layer set. Observers feed the replicated
    /// value straight in; linking an identical set is a no-op.
    pub fn apply_linked_anim_layer(&mut self, scene: &mut dyn Scene, layer: LinkedAnimLayer) {
        if let Some(current) = &self.linked_layer {
            if *current == layer {
                return;
            }
            scene.unlink_anim_layers(&current.layers);
        }
        scene.link_anim_layers(&layer.layers);
        tracing::info!(layers = layer.layers.len(), "anim layer set linked");
        self.linked_layer = Some(layer);
    }

    pub fn records(&self) -> &AttachmentRecordSet {
        &self.records
    }

    pub fn pending(&self) -> &PendingAttachments {
        &self.pending
    }

    pub fn linked_anim_layer(&self) -> Option<&LinkedAnimLayer> {
        self.linked_layer.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn events(&mut self) -> &mut SlotEventRegistry {
        &mut self.events
    }

    /// Actor representation of an attached item, if one is live
    pub fn attached_actor(&self, item_id: &ItemId) -> Option<NodeId> {
        let record = self.records.find(item_id)?;
        self.attached
            .first_of_kind(&record.item_def, RepresentationKind::Actor)
    }

    pub fn find_first_attached_object(&self, def: &ItemDefId) -> Option<NodeId> {
        self.attached.first(def)
    }

    pub fn find_attached_objects(&self, def: &ItemDefId) -> Vec<NodeId> {
        self.attached.all(def)
    }

    pub fn find_attached_objects_of_kind(
        &self,
        def: &ItemDefId,
        kind: RepresentationKind,
    ) -> Vec<NodeId> {
        self.attached.all_of_kind(def, kind)
    }

    pub fn does_slot_have_attachment(&self, slot: &SlotId) -> bool {
        self.records.iter().any(|r| r.slot_id == *slot)
    }

    pub fn does_slot_have_attached_actor(&self, slot: &SlotId) -> bool {
        self.records.iter().filter(|r| r.slot_id == *slot).any(|r| {
            self.attached
                .first_of_kind(&r.item_def, RepresentationKind::Actor)
                .is_some()
        })
    }

    pub fn is_socket_taken(&self, slot: &SlotId, socket: &SocketName) -> bool {
        self.sockets.is_taken(slot, socket)
    }

    /// Socket an attached item currently sits on
    pub fn item_socket(&self, item_id: &ItemId) -> Option<SocketName> {
        self.records
            .find(item_id)
            .map(|r| r.final_attach_socket().clone())
    }
}
