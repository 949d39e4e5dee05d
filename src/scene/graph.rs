//! Retained scene graph, the reference `Scene` implementation
//!
//! Hosts with a real renderer implement `Scene` themselves; this graph backs
//! the integration tests and headless hosts that only need bookkeeping.

use ahash::AHashMap;

use crate::core::types::{AssetRef, ComponentTag, NodeId, SocketName, Transform};

use super::{RepresentationKind, Scene};

/// One node in the graph
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub asset: Option<AssetRef>,
    pub kind: Option<RepresentationKind>,
    pub parent: Option<NodeId>,
    pub socket: Option<SocketName>,
    pub transform: Transform,
    pub tag: Option<ComponentTag>,
}

pub struct SceneGraph {
    nodes: AHashMap<NodeId, SceneNode>,
    root: NodeId,
    next_id: u64,
    avatar_ready: bool,
    linked_layers: Vec<AssetRef>,
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = AHashMap::new();
        nodes.insert(
            root,
            SceneNode {
                asset: None,
                kind: None,
                parent: None,
                socket: None,
                transform: Transform::IDENTITY,
                tag: None,
            },
        );
        Self {
            nodes,
            root,
            next_id: 1,
            avatar_ready: true,
            linked_layers: Vec::new(),
        }
    }

    pub fn set_avatar_ready(&mut self, ready: bool) {
        self.avatar_ready = ready;
    }

    /// Register a tag-addressable attachment parent (e.g. a "Hands" component)
    pub fn add_tagged_node(&mut self, tag: ComponentTag) -> NodeId {
        let id = self.alloc_id();
        self.nodes.insert(
            id,
            SceneNode {
                asset: None,
                kind: None,
                parent: Some(self.root),
                socket: None,
                transform: Transform::IDENTITY,
                tag: Some(tag),
            },
        );
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn socket_of(&self, id: NodeId) -> Option<&SocketName> {
        self.nodes.get(&id).and_then(|n| n.socket.as_ref())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn linked_layers(&self) -> &[AssetRef] {
        &self.linked_layers
    }

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn destroy_recursive(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.parent == Some(id))
            .map(|(child, _)| *child)
            .collect();
        for child in children {
            self.destroy_recursive(child);
        }
        self.nodes.remove(&id);
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for SceneGraph {
    fn avatar_ready(&self) -> bool {
        self.avatar_ready
    }

    fn root(&self) -> NodeId {
        self.root
    }

    fn find_tagged(&self, tag: &ComponentTag) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| n.tag.as_ref() == Some(tag))
            .map(|(id, _)| *id)
    }

    fn spawn(
        &mut self,
        asset: &AssetRef,
        kind: RepresentationKind,
        parent: NodeId,
        socket: &SocketName,
        transform: Transform,
    ) -> Option<NodeId> {
        if !self.nodes.contains_key(&parent) {
            return None;
        }
        let id = self.alloc_id();
        self.nodes.insert(
            id,
            SceneNode {
                asset: Some(asset.clone()),
                kind: Some(kind),
                parent: Some(parent),
                socket: Some(socket.clone()),
                transform,
                tag: None,
            },
        );
        Some(id)
    }

    fn attach(&mut self, node: NodeId, parent: NodeId, socket: &SocketName) -> bool {
        if node == parent || !self.nodes.contains_key(&parent) {
            return false;
        }
        match self.nodes.get_mut(&node) {
            Some(n) => {
                n.parent = Some(parent);
                n.socket = Some(socket.clone());
                true
            }
            None => false,
        }
    }

    fn destroy(&mut self, node: NodeId) -> bool {
        if node == self.root || !self.nodes.contains_key(&node) {
            return false;
        }
        self.destroy_recursive(node);
        true
    }

    fn link_anim_layers(&mut self, layers: &[AssetRef]) {
        for layer in layers {
            if !self.linked_layers.contains(layer) {
                self.linked_layers.push(layer.clone());
            }
        }
    }

    fn unlink_anim_layers(&mut self, layers: &[AssetRef]) {
        self.linked_layers.retain(|l| !layers.contains(l));
    }
}
