use glam::Mat4;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use shoji_common::{NodeId, Transform};

use crate::node::{Node, NodeDesc, NodeKind};
use crate::resources::{ResourceId, ResourceKind, ResourcePool};

/// Errors from scene-graph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("the scene root cannot be removed")]
    RootRemoval,
}

/// An event record produced by every mutation to the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneEvent {
    /// Node was attached under `parent`.
    Attached { id: NodeId, parent: NodeId },
    /// Subtree rooted at `id` was detached; `nodes` counts the whole subtree.
    Detached { id: NodeId, nodes: usize },
    /// A resource owned by a detached node was released.
    Released { resource: ResourceId, kind: ResourceKind },
}

/// Result of removing a subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    /// Every node that left the graph, root of the subtree first.
    pub nodes: Vec<NodeId>,
    /// Number of resources released.
    pub released: usize,
}

/// The scene-graph container.
///
/// Nodes live in a BTreeMap keyed by id, so iteration follows creation order.
/// Drawable nodes own their geometry/material/texture entries in the
/// [`ResourcePool`]; removing a node releases them.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: BTreeMap<NodeId, Node>,
    root: NodeId,
    next_id: u64,
    resources: ResourcePool,
    /// Append-only log of all mutations.
    event_log: Vec<SceneEvent>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create a graph holding only the root group.
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root,
            Node {
                id: root,
                kind: NodeKind::Group,
                material: None,
                transform: Transform::default(),
                parent: None,
                children: Vec::new(),
                resources: Vec::new(),
            },
        );
        Self {
            nodes,
            root,
            next_id: 1,
            resources: ResourcePool::new(),
            event_log: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn resources(&self) -> &ResourcePool {
        &self.resources
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[SceneEvent] {
        &self.event_log
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Attach a new node under `parent`. Drawable nodes allocate their own
    /// geometry and material, plus a texture when the material samples one.
    pub fn add(&mut self, parent: NodeId, desc: NodeDesc) -> Result<NodeId, SceneError> {
        if !self.nodes.contains_key(&parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;

        let mut owned = Vec::new();
        if desc.kind != NodeKind::Group {
            owned.push(self.resources.allocate(ResourceKind::Geometry));
        }
        if let Some(material) = desc.material {
            owned.push(self.resources.allocate(ResourceKind::Material));
            if material.texture.is_some() {
                owned.push(self.resources.allocate(ResourceKind::Texture));
            }
        }

        self.nodes.insert(
            id,
            Node {
                id,
                kind: desc.kind,
                material: desc.material,
                transform: desc.transform,
                parent: Some(parent),
                children: Vec::new(),
                resources: owned,
            },
        );
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        self.event_log.push(SceneEvent::Attached { id, parent });
        Ok(id)
    }

    /// Attach `root` under `parent` and `children` under `root`.
    ///
    /// Fails only when `parent` is missing, before anything is allocated.
    pub fn add_subtree(
        &mut self,
        parent: NodeId,
        root: NodeDesc,
        children: impl IntoIterator<Item = NodeDesc>,
    ) -> Result<NodeId, SceneError> {
        let root = self.add(parent, root)?;
        for child in children {
            self.add(root, child)?;
        }
        Ok(root)
    }

    /// Detach the subtree rooted at `id` and release everything it owns.
    ///
    /// A second removal of the same id fails with `NodeNotFound`.
    pub fn remove(&mut self, id: NodeId) -> Result<Removed, SceneError> {
        if id == self.root {
            return Err(SceneError::RootRemoval);
        }
        let parent = self
            .nodes
            .get(&id)
            .ok_or(SceneError::NodeNotFound(id))?
            .parent;
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            p.children.retain(|c| *c != id);
        }

        let subtree = self.subtree(id);
        self.event_log.push(SceneEvent::Detached {
            id,
            nodes: subtree.len(),
        });

        let mut released = 0;
        for node_id in &subtree {
            let Some(node) = self.nodes.remove(node_id) else {
                continue;
            };
            for resource in node.resources {
                if let Some(kind) = self.resources.release(resource) {
                    self.event_log.push(SceneEvent::Released { resource, kind });
                    released += 1;
                }
            }
        }
        tracing::trace!(%id, nodes = subtree.len(), released, "subtree removed");

        Ok(Removed {
            nodes: subtree,
            released,
        })
    }

    /// Ids in the subtree rooted at `id`, pre-order.
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

    /// Local-to-world matrix of a node.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.nodes.get(&id)?;
        let mut m = node.transform.matrix();
        while let Some(parent) = node.parent {
            node = self.nodes.get(&parent)?;
            m = node.transform.matrix() * m;
        }
        Some(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Material;
    use glam::Vec3;
    use shoji_common::{Color, ImageId};

    fn cube(x: f32) -> NodeDesc {
        NodeDesc::mesh(
            NodeKind::Box,
            Material::solid(Color(0x2e2e2e)),
            Transform::at(x, 0.0, 0.0),
        )
    }

    #[test]
    fn graph_starts_with_root() {
        let g = SceneGraph::new();
        assert_eq!(g.node_count(), 1);
        assert!(g.contains(g.root()));
        assert_eq!(g.resources().live_count(), 0);
    }

    #[test]
    fn add_allocates_resources() {
        let mut g = SceneGraph::new();
        let group = g.add(g.root(), NodeDesc::group(Transform::default())).unwrap();
        let mesh = g.add(group, cube(1.0)).unwrap();
        let picture = g
            .add(
                group,
                NodeDesc::mesh(
                    NodeKind::Plane {
                        width: 37.0,
                        height: 20.0,
                    },
                    Material::textured(ImageId(3)),
                    Transform::default(),
                ),
            )
            .unwrap();

        assert_eq!(g.children(group), &[mesh, picture]);
        assert!(g.get(group).unwrap().resources.is_empty());
        assert_eq!(g.get(mesh).unwrap().resources.len(), 2);
        assert_eq!(g.get(picture).unwrap().resources.len(), 3);
        assert_eq!(g.resources().live_count_of(ResourceKind::Texture), 1);
    }

    #[test]
    fn add_under_missing_parent_fails() {
        let mut g = SceneGraph::new();
        let err = g.add(NodeId(42), cube(0.0)).unwrap_err();
        assert_eq!(err, SceneError::NodeNotFound(NodeId(42)));
    }

    #[test]
    fn add_subtree_attaches_children() {
        let mut g = SceneGraph::new();
        let root = g
            .add_subtree(g.root(), cube(0.0), (1..=3).map(|i| cube(i as f32)))
            .unwrap();
        assert_eq!(g.subtree(root).len(), 4);
        assert_eq!(g.children(g.root()), &[root]);
    }

    #[test]
    fn add_subtree_under_missing_parent_leaves_graph_untouched() {
        let mut g = SceneGraph::new();
        let err = g
            .add_subtree(NodeId(7), cube(0.0), vec![cube(1.0), cube(2.0)])
            .unwrap_err();
        assert_eq!(err, SceneError::NodeNotFound(NodeId(7)));
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.resources().allocated_total(), 0);
        assert!(g.events().is_empty());
    }

    #[test]
    fn remove_detaches_subtree_and_releases() {
        let mut g = SceneGraph::new();
        let group = g.add(g.root(), NodeDesc::group(Transform::default())).unwrap();
        for i in 0..3 {
            g.add(group, cube(i as f32)).unwrap();
        }
        let keep = g.add(g.root(), cube(10.0)).unwrap();

        let removed = g.remove(group).unwrap();
        assert_eq!(removed.nodes.len(), 4);
        assert_eq!(removed.nodes[0], group);
        assert_eq!(removed.released, 6);
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.children(g.root()), &[keep]);
        assert_eq!(g.resources().live_count(), 2);
    }

    #[test]
    fn remove_twice_fails() {
        let mut g = SceneGraph::new();
        let id = g.add(g.root(), cube(0.0)).unwrap();
        g.remove(id).unwrap();
        assert_eq!(g.remove(id), Err(SceneError::NodeNotFound(id)));
        assert_eq!(g.resources().released_total(), 2);
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut g = SceneGraph::new();
        let root = g.root();
        assert_eq!(g.remove(root), Err(SceneError::RootRemoval));
    }

    #[test]
    fn events_are_recorded() {
        let mut g = SceneGraph::new();
        let id = g.add(g.root(), cube(0.0)).unwrap();
        g.remove(id).unwrap();
        // attach + detach + geometry release + material release
        assert_eq!(g.events().len(), 4);
        assert!(matches!(g.events()[1], SceneEvent::Detached { nodes: 1, .. }));

        let drained = g.drain_events();
        assert_eq!(drained.len(), 4);
        assert!(g.events().is_empty());
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut g = SceneGraph::new();
        let group = g
            .add(g.root(), NodeDesc::group(Transform::at(300.0, 25.0, 0.0)))
            .unwrap();
        let child = g.add(group, cube(-47.5)).unwrap();

        let p = g.world_matrix(child).unwrap().transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(252.5, 25.0, 0.0)).length() < 1e-4);
        assert!(g.world_matrix(NodeId(999)).is_none());
    }
}
