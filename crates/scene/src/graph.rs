use crate::{Mesh, SceneError};
use std::fmt;
use std::sync::Arc;
use vesta_math::{Matrix4, Quaternion, Vector3};

/// Index of a node inside its [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A transform-bearing tree element, optionally carrying a mesh.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,
    pub position: Vector3,
    pub quaternion: Quaternion,
    pub scale: Vector3,
    pub mesh: Option<Arc<Mesh>>,
    pub visible: bool,
    matrix_local: Matrix4,
    matrix_world: Matrix4,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: None,
            position: Vector3::ZERO,
            quaternion: Quaternion::IDENTITY,
            scale: Vector3::ONE,
            mesh: None,
            visible: true,
            matrix_local: Matrix4::IDENTITY,
            matrix_world: Matrix4::IDENTITY,
            parent: None,
            children: Vec::new(),
        }
    }
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_mesh(mut self, mesh: Arc<Mesh>) -> Self {
        self.mesh = Some(mesh);
        self
    }

    /// Set position, rotation and scale in one go.
    pub fn set_transform(&mut self, position: Vector3, quaternion: Quaternion, scale: Vector3) {
        self.position = position;
        self.quaternion = quaternion;
        self.scale = scale;
    }

    pub fn local_matrix(&self) -> &Matrix4 {
        &self.matrix_local
    }

    pub fn world_matrix(&self) -> &Matrix4 {
        &self.matrix_world
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena of nodes forming a forest of transform hierarchies.
///
/// Removing a node from its parent detaches it; the node itself stays in the
/// arena and can be re-attached.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a detached default node.
    pub fn create_node(&mut self) -> NodeId {
        self.insert(Node::new())
    }

    /// Insert `node` as a new root. Any parent/children links it carried
    /// are dropped.
    pub fn insert(&mut self, mut node: Node) -> NodeId {
        node.parent = None;
        node.children.clear();
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    fn get(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(id.0).ok_or(SceneError::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(id.0).ok_or(SceneError::UnknownNode(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Parent, grandparent, ... up to the root of `id`'s tree.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let parent_of = move |n: &NodeId| self.node(*n).and_then(Node::parent);
        std::iter::successors(parent_of(&id), parent_of)
    }

    /// Attach `child` as the last child of `parent`, detaching it from any
    /// previous parent.
    pub fn add(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.get(parent)?;
        self.get(child)?;
        if parent == child {
            return Err(SceneError::SelfParent(child));
        }
        if self.ancestors(parent).any(|a| a == child) {
            return Err(SceneError::Cycle { parent, child });
        }

        self.detach(child)?;
        self.get_mut(parent)?.children.push(child);
        self.get_mut(child)?.parent = Some(parent);
        tracing::trace!(%parent, %child, "node attached");
        Ok(())
    }

    /// Detach `child` from `parent`. Returns `false` if it was not a child.
    pub fn remove(&mut self, parent: NodeId, child: NodeId) -> Result<bool, SceneError> {
        self.get(child)?;
        let siblings = &mut self.get_mut(parent)?.children;
        let Some(pos) = siblings.iter().position(|&c| c == child) else {
            return Ok(false);
        };
        siblings.remove(pos);
        self.get_mut(child)?.parent = None;
        tracing::trace!(%parent, %child, "node detached");
        Ok(true)
    }

    /// Detach `id` from its parent, if any.
    pub fn detach(&mut self, id: NodeId) -> Result<(), SceneError> {
        if let Some(parent) = self.get(id)?.parent {
            self.remove(parent, id)?;
        }
        Ok(())
    }

    /// Recompose local matrices under `root` and propagate world matrices.
    ///
    /// `root` itself is placed relative to its parent's current world matrix
    /// when it has one.
    pub fn update_matrix_world(&mut self, root: NodeId) -> Result<(), SceneError> {
        let root_parent_world = match self.get(root)?.parent {
            Some(p) => Some(*self.get(p)?.world_matrix()),
            None => None,
        };

        let mut stack = vec![(root, root_parent_world)];
        while let Some((id, parent_world)) = stack.pop() {
            let node = self.get_mut(id)?;
            node.matrix_local = Matrix4::compose(&node.position, &node.quaternion, &node.scale);
            node.matrix_world = match parent_world {
                Some(pw) => pw.multiply(&node.matrix_local),
                None => node.matrix_local,
            };
            let world = node.matrix_world;
            stack.extend(node.children.iter().map(|&c| (c, Some(world))));
        }
        Ok(())
    }

    /// Visible nodes under `root` in pre-order. An invisible node prunes its
    /// whole subtree.
    pub fn collect_visible_nodes(&self, root: NodeId) -> Result<Vec<NodeId>, SceneError> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.get(id)?;
            if !node.visible {
                continue;
            }
            out.push(id);
            stack.extend(node.children.iter().rev());
        }
        Ok(out)
    }

    /// Every node under `root` in pre-order, paired with its depth.
    pub fn traverse(&self, root: NodeId) -> Result<Vec<(NodeId, usize)>, SceneError> {
        let mut out = Vec::new();
        let mut stack = vec![(root, 0)];
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            stack.extend(self.get(id)?.children.iter().rev().map(|&c| (c, depth + 1)));
        }
        Ok(out)
    }

    /// First node under `root` (pre-order) named `name`.
    pub fn find_by_name(&self, root: NodeId, name: &str) -> Result<Option<NodeId>, SceneError> {
        Ok(self
            .traverse(root)?
            .into_iter()
            .map(|(id, _)| id)
            .find(|&id| self.nodes[id.0].name.as_deref() == Some(name)))
    }

    /// Deep-copy the subtree at `id` into a new detached tree. Meshes are
    /// shared, not copied.
    pub fn duplicate(&mut self, id: NodeId) -> Result<NodeId, SceneError> {
        let original = self.get(id)?.clone();
        let children = original.children.clone();
        let copy = self.insert(original);
        for child in children {
            let child_copy = self.duplicate(child)?;
            self.add(copy, child_copy)?;
        }
        Ok(copy)
    }
}
