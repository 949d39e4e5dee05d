//! Shared record construction and scene resolution for handlers
//!
//! The built-in handlers differ only in which fragment they read and which
//! representation kind they spawn; record building, socket selection,
//! parent-node resolution and the spawn/destroy/refresh flows all live
//! here.

use std::sync::Arc;

use crate::core::types::{AssetRef, ComponentTag, ItemDefId, ItemId, NodeId, SocketName, Transform};
use crate::engine::AttachmentContext;
use crate::items::{FragmentKind, ItemDefinition, ItemEntry};
use crate::records::AttachmentRecord;
use crate::scene::RepresentationKind;

use super::SocketEntry;

/// Pluggable socket and transform selection strategy. The default picks
/// the first free candidate socket and the identity transform; a host can
/// install a finder to place representations from gameplay data instead.
pub trait TransformFinder {
    fn find_socket_name(
        &self,
        ctx: &AttachmentContext,
        item: &ItemEntry,
        owner: Option<&ItemEntry>,
    ) -> Option<SocketName>;

    fn find_relative_transform(
        &self,
        _ctx: &AttachmentContext,
        _item: &ItemEntry,
        _owner: Option<&ItemEntry>,
    ) -> Transform {
        Transform::IDENTITY
    }
}

/// Configuration shared by every built-in handler
pub struct HandlerCommon {
    sockets: Vec<SocketEntry>,
    component_tag: Option<ComponentTag>,
    transform_finder: Option<Box<dyn TransformFinder>>,
}

impl HandlerCommon {
    pub fn new(sockets: Vec<SocketEntry>) -> Self {
        Self {
            sockets,
            component_tag: None,
            transform_finder: None,
        }
    }

    pub fn with_component_tag(mut self, tag: Option<ComponentTag>) -> Self {
        self.component_tag = tag;
        self
    }

    pub fn with_transform_finder(mut self, finder: Box<dyn TransformFinder>) -> Self {
        self.transform_finder = Some(finder);
        self
    }

    pub fn sockets(&self) -> &[SocketEntry] {
        &self.sockets
    }

    pub fn component_tag(&self) -> Option<&ComponentTag> {
        self.component_tag.as_ref()
    }

    /// Socket the record should claim: the finder's answer when one is
    /// installed, otherwise the first candidate not already taken on the
    /// item's slot, otherwise the first candidate outright.
    pub fn find_socket_name(
        &self,
        ctx: &AttachmentContext,
        item: &ItemEntry,
        owner: Option<&ItemEntry>,
    ) -> Option<SocketName> {
        if let Some(finder) = &self.transform_finder {
            if let Some(name) = finder.find_socket_name(ctx, item, owner) {
                return Some(name);
            }
        }
        if let Some(slot) = &item.slot_id {
            if let Some(entry) = self
                .sockets
                .iter()
                .find(|s| !ctx.sockets.is_taken(slot, &s.socket_name))
            {
                return Some(entry.socket_name.clone());
            }
        }
        self.sockets.first().map(|s| s.socket_name.clone())
    }

    pub fn find_relative_transform(
        &self,
        ctx: &AttachmentContext,
        item: &ItemEntry,
        owner: Option<&ItemEntry>,
    ) -> Transform {
        match &self.transform_finder {
            Some(finder) => finder.find_relative_transform(ctx, item, owner),
            None => Transform::IDENTITY,
        }
    }

    /// Whether the item (or its visual stand-in) carries the fragment this
    /// handler spawns from
    pub fn supports_item(
        &self,
        ctx: &AttachmentContext,
        kind: FragmentKind,
        item: &ItemEntry,
    ) -> bool {
        if let Some(visual) = self.visual_item(ctx, item) {
            if let Some(def) = ctx.defs.resolve(&visual) {
                if def.has_fragment(kind) {
                    return true;
                }
            }
        }
        ctx.defs
            .resolve(&item.def)
            .map(|def| def.has_fragment(kind))
            .unwrap_or(false)
    }

    /// Effective visual definition: instance override first, then the
    /// definition's default visual
    pub fn visual_item(&self, ctx: &AttachmentContext, item: &ItemEntry) -> Option<ItemDefId> {
        if item.visual_override.is_some() {
            return item.visual_override;
        }
        ctx.defs
            .resolve(&item.def)
            .and_then(|def| def.visual_attachment().and_then(|f| f.default_visual))
    }

    /// Build the replicated record for an item entering a slot. Returns
    /// `None` when the item has no slot to key the record by.
    pub fn make_record(
        &self,
        ctx: &AttachmentContext,
        item: &ItemEntry,
        owner: Option<&ItemEntry>,
    ) -> Option<AttachmentRecord> {
        let slot_id = item.slot_id.clone()?;
        let socket_name = match self.find_socket_name(ctx, item, owner) {
            Some(name) => name,
            None => {
                tracing::warn!(item = %item.id, slot = %slot_id, "no candidate socket configured, attaching at parent origin");
                SocketName::new("")
            }
        };

        let mut record = AttachmentRecord::new(item.id, slot_id, item.def, socket_name);
        record.relative_transform = self.find_relative_transform(ctx, item, owner);
        record.socket_component_tag = self.component_tag.clone();
        record.visual_item_def = self.visual_item(ctx, item);
        if let Some(owner) = owner {
            record.owner_id = Some(owner.id);
            record.owner_slot_id = owner.slot_id.clone();
            record.owner_item_def = Some(owner.def);
        }
        Some(record)
    }
}

/// Definition the representation is spawned from: the visual stand-in when
/// set and resolvable, the logical definition otherwise
pub fn spawn_definition(
    ctx: &AttachmentContext,
    record: &AttachmentRecord,
) -> Option<Arc<ItemDefinition>> {
    if let Some(visual) = &record.visual_item_def {
        match ctx.defs.resolve(visual) {
            Some(def) => return Some(def),
            None => {
                tracing::warn!(item = %record.item_id, visual = %visual, "visual definition unresolvable, falling back to item definition");
            }
        }
    }
    ctx.defs.resolve(&record.item_def)
}

pub fn fragment_asset(def: &ItemDefinition, kind: FragmentKind) -> Option<&AssetRef> {
    match kind {
        FragmentKind::ActorAttachment => def.actor_attachment().map(|f| &f.actor),
        FragmentKind::SkinnedMeshAttachment => def.skinned_mesh_attachment().map(|f| &f.mesh),
        FragmentKind::SceneNodeAttachment => def.scene_node_attachment().map(|f| &f.asset),
        _ => None,
    }
}

/// Node the representation hangs under. Owner representation first, then
/// the record's tagged component, then the scene root.
pub fn find_parent_node(
    common: &HandlerCommon,
    ctx: &AttachmentContext,
    record: &AttachmentRecord,
) -> NodeId {
    if let Some(owner_def) = &record.owner_item_def {
        if let Some(node) = ctx.attached.first(owner_def) {
            return node;
        }
    }
    if let Some(tag) = record.final_component_tag().or(common.component_tag()) {
        if let Some(node) = ctx.scene.find_tagged(tag) {
            return node;
        }
        tracing::warn!(tag = %tag, item = %record.item_id, "tagged component not found, attaching to root");
    }
    ctx.scene.root()
}

/// Spawn and register the representation for a resolved record. A no-op
/// when the item already has one or the record is gone.
pub fn attach_representation(
    common: &HandlerCommon,
    ctx: &mut AttachmentContext,
    kind: FragmentKind,
    repr: RepresentationKind,
    item_id: ItemId,
) {
    let Some(record) = ctx.lookup_record(&item_id) else {
        return;
    };
    if ctx.attached.contains(&record.item_def) {
        return;
    }
    let Some(def) = spawn_definition(ctx, &record) else {
        tracing::warn!(item = %record.item_id, "item definition unresolvable, cannot spawn");
        return;
    };
    let Some(asset) = fragment_asset(&def, kind).cloned() else {
        return;
    };

    let parent = find_parent_node(common, ctx, &record);
    let socket = record.final_attach_socket().clone();
    match ctx
        .scene
        .spawn(&asset, repr, parent, &socket, record.relative_transform)
    {
        Some(node) => {
            tracing::info!(
                item = %record.item_id,
                slot = %record.slot_id,
                socket = %socket,
                kind = ?repr,
                "attached representation"
            );
            ctx.register_attachment(record.item_id, record.item_def, node, repr);
        }
        None => {
            tracing::warn!(item = %record.item_id, asset = %asset, "scene refused to spawn representation");
        }
    }
}

/// Destroy every representation registered for the item's definition
pub fn detach_representation(ctx: &mut AttachmentContext, item_id: &ItemId) {
    let Some(record) = ctx.lookup_record(item_id) else {
        return;
    };
    let nodes = ctx.attached.remove_all(&record.item_def);
    if nodes.is_empty() {
        return;
    }
    for (node, _) in nodes {
        ctx.scene.destroy(node);
    }
    tracing::info!(item = %record.item_id, slot = %record.slot_id, "detached representation");
}

/// Respawn the representation when the record's visual changed
pub fn refresh_representation(
    common: &HandlerCommon,
    ctx: &mut AttachmentContext,
    kind: FragmentKind,
    repr: RepresentationKind,
    record: &AttachmentRecord,
) {
    if record.visual_item_def == record.old_visual_item_def {
        return;
    }
    for (node, _) in ctx.attached.remove_all(&record.item_def) {
        ctx.scene.destroy(node);
    }
    attach_representation(common, ctx, kind, repr, record.item_id);
}
