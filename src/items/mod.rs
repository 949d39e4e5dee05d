//! Item definitions, fragments, and the item-store seam

pub mod definition;
pub mod events;
pub mod store;

pub use definition::{
    ActorAttachmentFragment, AnimLayerFragment, AttachmentSlotsFragment, DefinitionCatalog,
    DefinitionResolver, Fragment, FragmentKind, ItemDefinition, SceneNodeAttachmentFragment,
    SkinnedMeshAttachmentFragment, VisualAttachmentFragment,
};
pub use events::{SlotEvent, SlotEventRegistry, SubscriptionId};
pub use store::{ItemEntry, ItemStore, MemoryItemStore};
