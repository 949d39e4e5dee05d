//! Handler for lightweight static scene-node representations
//!
//! Used for attachments that need no actor of their own, e.g. a holstered
//! magazine or a decorative charm.

use crate::core::types::{ItemId, SlotId};
use crate::engine::AttachmentContext;
use crate::items::{FragmentKind, ItemEntry};
use crate::records::AttachmentRecord;
use crate::scene::RepresentationKind;

use super::common::{self, HandlerCommon};
use super::AttachmentHandler;

pub struct SceneNodeHandler {
    common: HandlerCommon,
}

impl SceneNodeHandler {
    pub fn new(common: HandlerCommon) -> Self {
        Self { common }
    }
}

impl AttachmentHandler for SceneNodeHandler {
    fn supported_fragment(&self) -> Option<FragmentKind> {
        Some(FragmentKind::SceneNodeAttachment)
    }

    fn handle_item_added_to_slot(
        &self,
        ctx: &mut AttachmentContext,
        item: &ItemEntry,
        owner: Option<&ItemEntry>,
    ) -> bool {
        if !self
            .common
            .supports_item(ctx, FragmentKind::SceneNodeAttachment, item)
        {
            return false;
        }
        let Some(record) = self.common.make_record(ctx, item, owner) else {
            return false;
        };
        ctx.add_attached_record(record);
        true
    }

    fn handle_item_removed_from_slot(
        &self,
        ctx: &mut AttachmentContext,
        item: &ItemEntry,
        _slot: &SlotId,
        _owner: Option<&ItemEntry>,
    ) {
        common::detach_representation(ctx, &item.id);
        ctx.remove_record(&item.id);
    }

    fn handle_item_attach(
        &self,
        ctx: &mut AttachmentContext,
        item_id: ItemId,
        _owner_id: Option<ItemId>,
    ) {
        common::attach_representation(
            &self.common,
            ctx,
            FragmentKind::SceneNodeAttachment,
            RepresentationKind::SceneNode,
            item_id,
        );
    }

    fn handle_item_detach(
        &self,
        ctx: &mut AttachmentContext,
        item_id: ItemId,
        _owner_id: Option<ItemId>,
    ) {
        common::detach_representation(ctx, &item_id);
    }

    fn handle_attachment_changed(&self, ctx: &mut AttachmentContext, record: &AttachmentRecord) {
        common::refresh_representation(
            &self.common,
            ctx,
            FragmentKind::SceneNodeAttachment,
            RepresentationKind::SceneNode,
            record,
        );
    }
}
