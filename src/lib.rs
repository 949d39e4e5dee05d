//! Replicated item attachment engine
//!
//! Keeps a flat, versioned set of attachment records describing which
//! items sit in which slots and sockets, resolves out-of-order arrival of
//! owner/child attachment chains, and drives spawned representations
//! through pluggable per-fragment handlers. Item data and scene access
//! stay behind collaborator traits so the engine runs identically on the
//! authority and on observers.

pub mod anim;
pub mod attached;
pub mod core;
pub mod engine;
pub mod handlers;
pub mod items;
pub mod pending;
pub mod records;
pub mod scene;
pub mod sockets;
pub mod sync;

pub use crate::core::error::{Result, RigError};
pub use crate::core::types::{
    AssetRef, ComponentTag, ItemDefId, ItemId, NodeId, SlotId, SocketName, Transform,
};

pub use anim::LinkedAnimLayer;
pub use attached::AttachedObjectIndex;
pub use engine::{AttachmentContext, AttachmentEngine, EngineSettings};
pub use handlers::{
    AttachmentHandler, AttachmentSlot, BuiltSlot, HandlerCommon, HandlerConfig, SlotTable,
    SocketEntry, TransformFinder,
};
pub use items::{
    DefinitionCatalog, DefinitionResolver, Fragment, FragmentKind, ItemDefinition, ItemEntry,
    ItemStore, MemoryItemStore, SlotEvent, SlotEventRegistry, SubscriptionId,
};
pub use pending::PendingAttachments;
pub use records::{AttachmentRecord, AttachmentRecordSet, RecordEvent};
pub use scene::{RepresentationKind, Scene, SceneGraph};
pub use sockets::SocketOccupancyTracker;
pub use sync::{DeltaTracker, RecordDelta};
