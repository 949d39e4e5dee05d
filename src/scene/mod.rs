//! Scene/representation collaborator seam
//!
//! The engine spawns, attaches and destroys representations through this
//! trait only; it never talks to a concrete rendering or actor API.

pub mod graph;

use serde::{Deserialize, Serialize};

use crate::core::types::{AssetRef, ComponentTag, NodeId, SocketName, Transform};

pub use graph::SceneGraph;

/// What kind of representation a spawned node is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepresentationKind {
    Actor,
    SkinnedMesh,
    SceneNode,
}

/// Host-side scene access.
///
/// `avatar_ready` gates every spawn: when the owning character is not
/// resolvable the current event aborts and is replayed on the next
/// lifecycle event (`AttachmentEngine::on_avatar_ready`).
pub trait Scene {
    fn avatar_ready(&self) -> bool;

    /// Coarse default attachment parent (the character's primary mesh)
    fn root(&self) -> NodeId;

    /// Tag-addressable scene components usable as attachment parents
    fn find_tagged(&self, tag: &ComponentTag) -> Option<NodeId>;

    fn spawn(
        &mut self,
        asset: &AssetRef,
        kind: RepresentationKind,
        parent: NodeId,
        socket: &SocketName,
        transform: Transform,
    ) -> Option<NodeId>;

    /// Re-parent an existing node onto another node's socket
    fn attach(&mut self, node: NodeId, parent: NodeId, socket: &SocketName) -> bool;

    fn destroy(&mut self, node: NodeId) -> bool;

    fn link_anim_layers(&mut self, layers: &[AssetRef]);

    fn unlink_anim_layers(&mut self, layers: &[AssetRef]);
}
