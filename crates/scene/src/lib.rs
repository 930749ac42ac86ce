//! Scene graph: transform hierarchy, renderable meshes and cameras.
//!
//! Nodes live in an arena owned by [`SceneGraph`] and refer to each other by
//! [`NodeId`]. Meshes and geometries are shared through `Arc` so loaders and
//! duplicated subtrees never copy vertex descriptions.
//!
//! # Invariants
//! - A node has at most one parent; attaching detaches it first.
//! - The graph is acyclic: `add` rejects self-parenting and ancestor loops.
//! - An invisible node hides its entire subtree from rendering.
//! - World matrices are only valid after `update_matrix_world` on an ancestor.

mod camera;
mod graph;
mod mesh;

pub use camera::{Camera, Projection};
pub use graph::{Node, NodeId, SceneGraph};
pub use mesh::{Attribute, Geometry, Material, Mesh, Primitive};

/// Errors from scene graph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("node {0} cannot be its own child")]
    SelfParent(NodeId),
    #[error("adding {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
}
