//! In-memory scene graph consumed by the renderer
//!
//! Nodes live in an arena keyed by [`NodeId`]; parent/child links are ids.
//! The graph is only ever mutated from the scene queue (see
//! [`crate::queue`]); renderers and visibility probes read it under a
//! shared lock.

mod action;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anchorstage_spatial::{Aabb, Point3D, Quaternion, Transform, Vector3D};
use uuid::Uuid;

pub use action::{Action, ActionOutcome, RunningAction};

use crate::web::WebPage;

/// Stable identifier of a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("Scene node {0} not found")]
    NodeNotFound(NodeId),

    #[error("The scene root cannot be removed")]
    CannotRemoveRoot,
}

/// Renderable shape attached to a node
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Geometry {
    #[default]
    Empty,
    /// A flat plane, vertical in its local space (width along X, height along Y)
    Plane { width: f32, height: f32 },
    /// An instantiated model asset
    Model { asset: String, bounds: Aabb },
}

impl Geometry {
    /// Local-space bounds, if the geometry has any extent
    pub fn bounds(&self) -> Option<Aabb> {
        match self {
            Geometry::Empty => None,
            Geometry::Plane { width, height } => Some(Aabb::centered(
                Point3D::ORIGIN,
                Vector3D::new(width / 2.0, height / 2.0, 0.0),
            )),
            Geometry::Model { bounds, .. } => Some(*bounds),
        }
    }
}

/// Surface contents of a node's geometry
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Material {
    #[default]
    None,
    /// Flat tint, used by the detection highlight
    Color { r: f32, g: f32, b: f32 },
    /// Frames of the named video
    Video(String),
    /// A 2D info scene rendered into the texture (flipped vertically)
    InfoScene(String),
    /// A web page texture; `page` is filled in once the load completes
    Web {
        url: String,
        page: Option<Arc<WebPage>>,
    },
}

/// A single scene node
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Transform relative to the parent
    pub transform: Transform,
    pub opacity: f32,
    pub geometry: Geometry,
    pub material: Material,
    action: Option<RunningAction>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            parent: None,
            children: Vec::new(),
            transform: Transform::identity(),
            opacity: 1.0,
            geometry: Geometry::Empty,
            material: Material::None,
            action: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_position(mut self, position: Point3D) -> Self {
        self.transform.position = position;
        self
    }

    /// Set the rotation about the local X axis
    pub fn with_pitch(mut self, radians: f32) -> Self {
        self.transform.rotation = Quaternion::from_pitch(radians);
        self
    }

    pub fn with_scale(mut self, uniform: f32) -> Self {
        self.transform.scale = Vector3D::splat(uniform);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(RunningAction::new(action));
        self
    }

    pub fn has_running_action(&self) -> bool {
        self.action.is_some()
    }
}

/// Arena-backed scene graph with a single root
#[derive(Debug, Clone)]
pub struct SceneGraph {
    root: NodeId,
    nodes: HashMap<NodeId, Node>,
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = Node::new("root");
        let id = root.id;
        let mut nodes = HashMap::new();
        nodes.insert(id, root);
        Self { root: id, nodes }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root is always present
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(&id).ok_or(SceneError::NodeNotFound(id))
    }

    /// Attach `node` under `parent`, returning its id
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> Result<NodeId, SceneError> {
        let id = node.id;
        node.parent = Some(parent);
        self.node_mut(parent)?.children.push(id);
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Remove a node and its whole subtree, returning how many nodes went
    pub fn remove(&mut self, id: NodeId) -> Result<usize, SceneError> {
        if id == self.root {
            return Err(SceneError::CannotRemoveRoot);
        }
        let parent = self.get(id).ok_or(SceneError::NodeNotFound(id))?.parent;
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.children);
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> Result<(), SceneError> {
        self.node_mut(id)?.transform = transform;
        Ok(())
    }

    pub fn set_scale(&mut self, id: NodeId, uniform: f32) -> Result<(), SceneError> {
        self.node_mut(id)?.transform.scale = Vector3D::splat(uniform);
        Ok(())
    }

    pub fn set_opacity(&mut self, id: NodeId, opacity: f32) -> Result<(), SceneError> {
        self.node_mut(id)?.opacity = opacity.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_material(&mut self, id: NodeId, material: Material) -> Result<(), SceneError> {
        self.node_mut(id)?.material = material;
        Ok(())
    }

    /// Replace whatever action the node is running
    pub fn run_action(&mut self, id: NodeId, action: Action) -> Result<(), SceneError> {
        self.node_mut(id)?.action = Some(RunningAction::new(action));
        Ok(())
    }

    /// Step every running action by `dt`; nodes whose action ends in a
    /// removal are detached along with their subtree
    pub fn advance(&mut self, dt: Duration) {
        let mut removals = Vec::new();

        for node in self.nodes.values_mut() {
            let Some(mut running) = node.action.take() else {
                continue;
            };
            match running.advance(node, dt) {
                ActionOutcome::Running => node.action = Some(running),
                ActionOutcome::Finished => {}
                ActionOutcome::RemoveNode => removals.push(node.id),
            }
        }

        for id in removals {
            // An ancestor may already have taken this node with it
            if self.contains(id) {
                if let Err(e) = self.remove(id) {
                    tracing::warn!("Failed to remove node {} after action: {}", id, e);
                }
            }
        }
    }

    /// Compose transforms from the root down to `id`
    pub fn world_transform(&self, id: NodeId) -> Option<Transform> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.nodes.get(&current)?;
            chain.push(node.transform);
            cursor = node.parent;
        }
        Some(
            chain
                .iter()
                .rev()
                .fold(Transform::identity(), |acc, local| acc.then(local)),
        )
    }

    /// `id` and all of its descendants, parents before children
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(&next) {
                out.push(next);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// First direct child of `parent` with the given name
    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<&Node> {
        self.get(parent)?
            .children
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .find(|n| n.name == name)
    }

    pub fn children(&self, parent: NodeId) -> impl Iterator<Item = &Node> {
        self.get(parent)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|c| self.nodes.get(c))
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
