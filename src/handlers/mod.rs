//! Handler strategies turning logical attachment events into spawned
//! representations
//!
//! Each slot carries an ordered handler list. Dispatch for "added to slot"
//! is first-true-wins: the first handler recognizing the item's fragment
//! builds the record and short-circuits the rest. Removal and change
//! notifications go to every handler, because several handlers may need to
//! clean up independently. This asymmetry is intentional and pinned by a
//! regression test.

pub mod actor;
pub mod common;
pub mod scene_node;
pub mod skinned;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, RigError};
use crate::core::types::{ComponentTag, ItemId, SlotId, SocketName};
use crate::engine::AttachmentContext;
use crate::items::{FragmentKind, ItemEntry};
use crate::records::AttachmentRecord;

pub use actor::ActorHandler;
pub use common::{HandlerCommon, TransformFinder};
pub use scene_node::SceneNodeHandler;
pub use skinned::SkinnedMeshHandler;

/// Polymorphic attachment strategy for one item-fragment type.
///
/// All capabilities default to no-ops; a handler overrides the ones its
/// fragment needs. Handlers hold no engine state: everything flows through
/// the [`AttachmentContext`] passed per call.
pub trait AttachmentHandler {
    /// Fragment this handler recognizes; `None` applies unconditionally
    fn supported_fragment(&self) -> Option<FragmentKind>;

    /// Build and insert an attachment record for a recognized item.
    /// Returning `false` lets the next handler in the slot's list try.
    fn handle_item_added_to_slot(
        &self,
        _ctx: &mut AttachmentContext,
        _item: &ItemEntry,
        _owner: Option<&ItemEntry>,
    ) -> bool {
        false
    }

    fn handle_item_removed_from_slot(
        &self,
        _ctx: &mut AttachmentContext,
        _item: &ItemEntry,
        _slot: &SlotId,
        _owner: Option<&ItemEntry>,
    ) {
    }

    /// Spawn the representation once dependency resolution succeeded
    fn handle_item_attach(
        &self,
        _ctx: &mut AttachmentContext,
        _item_id: ItemId,
        _owner_id: Option<ItemId>,
    ) {
    }

    fn handle_item_detach(
        &self,
        _ctx: &mut AttachmentContext,
        _item_id: ItemId,
        _owner_id: Option<ItemId>,
    ) {
    }

    /// Record mutated in place (visual override or socket change)
    fn handle_attachment_changed(&self, _ctx: &mut AttachmentContext, _record: &AttachmentRecord) {
    }
}

/// One candidate socket on a slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketEntry {
    pub socket_name: SocketName,
    /// Tags the item must carry to use this socket
    #[serde(default)]
    pub required_tags: Vec<String>,
    /// Tags this socket advertises
    #[serde(default)]
    pub socket_tags: Vec<String>,
}

impl SocketEntry {
    pub fn new(socket_name: impl Into<String>) -> Self {
        Self {
            socket_name: SocketName::new(socket_name),
            required_tags: Vec::new(),
            socket_tags: Vec::new(),
        }
    }
}

/// Authored handler configuration; `build` is the factory producing the
/// boxed strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HandlerConfig {
    Actor {
        #[serde(default)]
        component_tag: Option<ComponentTag>,
    },
    SkinnedMesh {
        #[serde(default)]
        component_tag: Option<ComponentTag>,
    },
    SceneNode {
        #[serde(default)]
        component_tag: Option<ComponentTag>,
    },
}

impl HandlerConfig {
    pub fn build(&self, sockets: &[SocketEntry]) -> Box<dyn AttachmentHandler> {
        match self {
            HandlerConfig::Actor { component_tag } => Box::new(ActorHandler::new(
                HandlerCommon::new(sockets.to_vec()).with_component_tag(component_tag.clone()),
            )),
            HandlerConfig::SkinnedMesh { component_tag } => Box::new(SkinnedMeshHandler::new(
                HandlerCommon::new(sockets.to_vec()).with_component_tag(component_tag.clone()),
            )),
            HandlerConfig::SceneNode { component_tag } => Box::new(SceneNodeHandler::new(
                HandlerCommon::new(sockets.to_vec()).with_component_tag(component_tag.clone()),
            )),
        }
    }
}

/// Authored attachment slot: id, candidate sockets, ordered handlers.
/// Read-only at runtime; also embeddable in an item definition's
/// attachment-slots fragment for sub-slot delegation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentSlot {
    pub slot_id: SlotId,
    #[serde(default)]
    pub sockets: Vec<SocketEntry>,
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
}

impl AttachmentSlot {
    pub fn new(slot_id: impl Into<String>) -> Self {
        Self {
            slot_id: SlotId::new(slot_id),
            sockets: Vec::new(),
            handlers: Vec::new(),
        }
    }

    pub fn with_socket(mut self, socket: SocketEntry) -> Self {
        self.sockets.push(socket);
        self
    }

    pub fn with_handler(mut self, handler: HandlerConfig) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn build_handlers(&self) -> Vec<Box<dyn AttachmentHandler>> {
        self.handlers
            .iter()
            .map(|config| config.build(&self.sockets))
            .collect()
    }
}

/// One slot with its handlers instantiated
pub struct BuiltSlot {
    slot_id: SlotId,
    sockets: Vec<SocketEntry>,
    handlers: Vec<Box<dyn AttachmentHandler>>,
}

impl BuiltSlot {
    pub fn new(
        slot_id: SlotId,
        sockets: Vec<SocketEntry>,
        handlers: Vec<Box<dyn AttachmentHandler>>,
    ) -> Self {
        Self {
            slot_id,
            sockets,
            handlers,
        }
    }

    pub fn slot_id(&self) -> &SlotId {
        &self.slot_id
    }

    pub fn sockets(&self) -> &[SocketEntry] {
        &self.sockets
    }

    pub fn handlers(&self) -> &[Box<dyn AttachmentHandler>] {
        &self.handlers
    }
}

/// The static slot table an engine dispatches against
#[derive(Default)]
pub struct SlotTable {
    slots: Vec<BuiltSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotTableConfig {
    slots: Vec<AttachmentSlot>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(slots: Vec<AttachmentSlot>) -> Self {
        let mut table = Self::new();
        for slot in slots {
            let handlers = slot.build_handlers();
            table.push(BuiltSlot::new(slot.slot_id, slot.sockets, handlers));
        }
        table
    }

    /// Parse an authored slot table from TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SlotTableConfig =
            toml::from_str(content).map_err(|e| RigError::ParseError(e.to_string()))?;
        for slot in &config.slots {
            if slot.handlers.is_empty() {
                return Err(RigError::InvalidSlot(format!(
                    "slot '{}' has no handlers",
                    slot.slot_id
                )));
            }
        }
        Ok(Self::from_config(config.slots))
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Add a slot with prebuilt handlers (custom strategies, tests)
    pub fn push(&mut self, slot: BuiltSlot) {
        self.slots.push(slot);
    }

    pub fn get(&self, slot_id: &SlotId) -> Option<&BuiltSlot> {
        self.slots.iter().find(|s| s.slot_id == *slot_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_table_from_toml() {
        let toml = r#"
            [[slots]]
            slot_id = "Back"

            [[slots.sockets]]
            socket_name = "Back_Socket"
            socket_tags = ["large"]

            [[slots.handlers]]
            type = "Actor"

            [[slots.handlers]]
            type = "SceneNode"
            component_tag = "Spine"
        "#;

        let table = SlotTable::from_toml_str(toml).unwrap();
        assert_eq!(table.len(), 1);

        let back = table.get(&SlotId::new("Back")).unwrap();
        assert_eq!(back.sockets()[0].socket_name.0, "Back_Socket");
        assert_eq!(back.handlers().len(), 2);
        assert_eq!(
            back.handlers()[0].supported_fragment(),
            Some(FragmentKind::ActorAttachment)
        );
    }

    #[test]
    fn test_slot_without_handlers_is_rejected() {
        let toml = r#"
            [[slots]]
            slot_id = "Back"
        "#;
        let err = SlotTable::from_toml_str(toml).err().unwrap();
        assert!(err.to_string().contains("no handlers"));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        assert!(matches!(
            SlotTable::from_toml_str("slots = 3"),
            Err(RigError::ParseError(_))
        ));
    }

    #[test]
    fn test_handler_config_round_trips_through_serde() {
        let slot = AttachmentSlot::new("Scope")
            .with_socket(SocketEntry::new("Scope_Socket"))
            .with_handler(HandlerConfig::Actor {
                component_tag: None,
            });
        let json = serde_json::to_string(&slot).unwrap();
        let back: AttachmentSlot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.slot_id, SlotId::new("Scope"));
        assert_eq!(back.handlers.len(), 1);
    }
}
