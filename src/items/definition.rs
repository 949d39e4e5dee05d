//! Item definitions and their typed fragments
//!
//! A fragment is one authored aspect of an item definition. Handlers pick
//! which items they apply to by matching a fragment kind, so an item opts
//! into actor/mesh/scene-node representation purely through data.

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{AssetRef, ItemDefId};
use crate::handlers::AttachmentSlot;

/// Discriminant used by handlers to declare which fragment they support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FragmentKind {
    ActorAttachment,
    SkinnedMeshAttachment,
    SceneNodeAttachment,
    AnimLayer,
    VisualAttachment,
    AttachmentSlots,
}

/// Item spawns a standalone actor when attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorAttachmentFragment {
    pub actor: AssetRef,
}

/// Item spawns a skinned mesh driven by the owning character's skeleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinnedMeshAttachmentFragment {
    pub mesh: AssetRef,
}

/// Item spawns a plain scene node (static mesh, particle emitter, light)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNodeAttachmentFragment {
    pub asset: AssetRef,
}

/// Animation layer classes linked while this item provides the primary representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimLayerFragment {
    pub layers: Vec<AssetRef>,
}

/// Cosmetic default: the item is rendered as a different item definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualAttachmentFragment {
    pub default_visual: Option<ItemDefId>,
}

/// Attachment slots this item exposes to other items socketed into it
/// (e.g. a rifle exposing a "Scope" slot with its own handlers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentSlotsFragment {
    pub slots: Vec<AttachmentSlot>,
}

/// One typed piece of authored data on an item definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Fragment {
    ActorAttachment(ActorAttachmentFragment),
    SkinnedMeshAttachment(SkinnedMeshAttachmentFragment),
    SceneNodeAttachment(SceneNodeAttachmentFragment),
    AnimLayer(AnimLayerFragment),
    VisualAttachment(VisualAttachmentFragment),
    AttachmentSlots(AttachmentSlotsFragment),
}

impl Fragment {
    pub fn kind(&self) -> FragmentKind {
        match self {
            Fragment::ActorAttachment(_) => FragmentKind::ActorAttachment,
            Fragment::SkinnedMeshAttachment(_) => FragmentKind::SkinnedMeshAttachment,
            Fragment::SceneNodeAttachment(_) => FragmentKind::SceneNodeAttachment,
            Fragment::AnimLayer(_) => FragmentKind::AnimLayer,
            Fragment::VisualAttachment(_) => FragmentKind::VisualAttachment,
            Fragment::AttachmentSlots(_) => FragmentKind::AttachmentSlots,
        }
    }
}

/// Static data describing one kind of item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: ItemDefId,
    pub name: String,
    pub fragments: Vec<Fragment>,
}

impl ItemDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ItemDefId::new(),
            name: name.into(),
            fragments: Vec::new(),
        }
    }

    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    pub fn find_fragment(&self, kind: FragmentKind) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.kind() == kind)
    }

    pub fn has_fragment(&self, kind: FragmentKind) -> bool {
        self.find_fragment(kind).is_some()
    }

    pub fn actor_attachment(&self) -> Option<&ActorAttachmentFragment> {
        match self.find_fragment(FragmentKind::ActorAttachment) {
            Some(Fragment::ActorAttachment(f)) => Some(f),
            _ => None,
        }
    }

    pub fn skinned_mesh_attachment(&self) -> Option<&SkinnedMeshAttachmentFragment> {
        match self.find_fragment(FragmentKind::SkinnedMeshAttachment) {
            Some(Fragment::SkinnedMeshAttachment(f)) => Some(f),
            _ => None,
        }
    }

    pub fn scene_node_attachment(&self) -> Option<&SceneNodeAttachmentFragment> {
        match self.find_fragment(FragmentKind::SceneNodeAttachment) {
            Some(Fragment::SceneNodeAttachment(f)) => Some(f),
            _ => None,
        }
    }

    pub fn anim_layer(&self) -> Option<&AnimLayerFragment> {
        match self.find_fragment(FragmentKind::AnimLayer) {
            Some(Fragment::AnimLayer(f)) => Some(f),
            _ => None,
        }
    }

    pub fn visual_attachment(&self) -> Option<&VisualAttachmentFragment> {
        match self.find_fragment(FragmentKind::VisualAttachment) {
            Some(Fragment::VisualAttachment(f)) => Some(f),
            _ => None,
        }
    }

    pub fn attachment_slots(&self) -> Option<&AttachmentSlotsFragment> {
        match self.find_fragment(FragmentKind::AttachmentSlots) {
            Some(Fragment::AttachmentSlots(f)) => Some(f),
            _ => None,
        }
    }
}

/// Resolves a definition id to its loaded definition.
///
/// Asset loading and caching live behind this seam; the engine only ever
/// consumes resolved references.
pub trait DefinitionResolver {
    fn resolve(&self, id: &ItemDefId) -> Option<Arc<ItemDefinition>>;
}

/// In-memory definition catalog, the reference resolver
#[derive(Default)]
pub struct DefinitionCatalog {
    defs: AHashMap<ItemDefId, Arc<ItemDefinition>>,
}

impl DefinitionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition and return its id
    pub fn register(&mut self, def: ItemDefinition) -> ItemDefId {
        let id = def.id;
        self.defs.insert(id, Arc::new(def));
        id
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl DefinitionResolver for DefinitionCatalog {
    fn resolve(&self, id: &ItemDefId) -> Option<Arc<ItemDefinition>> {
        self.defs.get(id).cloned()
    }
}
