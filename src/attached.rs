//! Index of live representations per item definition
//!
//! Representation lifetime is owned here: nodes are registered when a
//! handler spawns them and destroyed explicitly on detach, never collected
//! implicitly.

use ahash::AHashMap;

use crate::core::types::{ItemDefId, NodeId};
use crate::scene::RepresentationKind;

#[derive(Debug, Default)]
pub struct AttachedObjectIndex {
    objects: AHashMap<ItemDefId, Vec<(NodeId, RepresentationKind)>>,
}

impl AttachedObjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, def: ItemDefId, node: NodeId, kind: RepresentationKind) {
        self.objects.entry(def).or_default().push((node, kind));
    }

    /// Drop every representation registered for a definition, returning the
    /// handles so the caller can destroy the scene nodes
    pub fn remove_all(&mut self, def: &ItemDefId) -> Vec<(NodeId, RepresentationKind)> {
        self.objects.remove(def).unwrap_or_default()
    }

    pub fn contains(&self, def: &ItemDefId) -> bool {
        self.objects
            .get(def)
            .map(|nodes| !nodes.is_empty())
            .unwrap_or(false)
    }

    pub fn first(&self, def: &ItemDefId) -> Option<NodeId> {
        self.objects
            .get(def)
            .and_then(|nodes| nodes.first())
            .map(|(node, _)| *node)
    }

    pub fn all(&self, def: &ItemDefId) -> Vec<NodeId> {
        self.objects
            .get(def)
            .map(|nodes| nodes.iter().map(|(node, _)| *node).collect())
            .unwrap_or_default()
    }

    pub fn all_of_kind(&self, def: &ItemDefId, kind: RepresentationKind) -> Vec<NodeId> {
        self.objects
            .get(def)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter(|(_, k)| *k == kind)
                    .map(|(node, _)| *node)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn first_of_kind(&self, def: &ItemDefId, kind: RepresentationKind) -> Option<NodeId> {
        self.objects.get(def).and_then(|nodes| {
            nodes
                .iter()
                .find(|(_, k)| *k == kind)
                .map(|(node, _)| *node)
        })
    }
}
