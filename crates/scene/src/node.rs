use serde::{Deserialize, Serialize};
use shoji_common::{Color, ImageId, NodeId, Transform};

use crate::resources::ResourceId;

/// Geometry carried by a node. `Group` nodes carry none and own no resources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Group,
    /// Flat rectangle in the local XY plane.
    Plane { width: f32, height: f32 },
    /// Unit cube, sized through the node's scale.
    Box,
    Cone {
        radius: f32,
        height: f32,
        radial_segments: u32,
    },
    /// Line grid on the local XZ plane.
    Grid { size: f32, divisions: u32 },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::Plane { .. } => "plane",
            NodeKind::Box => "box",
            NodeKind::Cone { .. } => "cone",
            NodeKind::Grid { .. } => "grid",
        }
    }
}

/// Surface description for a drawable node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: Color,
    pub opacity: f32,
    pub double_sided: bool,
    /// Image sampled as the base colour map, if any.
    pub texture: Option<ImageId>,
}

impl Material {
    pub fn solid(color: Color) -> Self {
        Self {
            color,
            opacity: 1.0,
            double_sided: false,
            texture: None,
        }
    }

    pub fn textured(image: ImageId) -> Self {
        Self {
            texture: Some(image),
            ..Self::solid(Color::WHITE)
        }
    }
}

/// Everything needed to create a node, before it is attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeDesc {
    pub kind: NodeKind,
    pub material: Option<Material>,
    pub transform: Transform,
}

impl NodeDesc {
    pub fn group(transform: Transform) -> Self {
        Self {
            kind: NodeKind::Group,
            material: None,
            transform,
        }
    }

    pub fn mesh(kind: NodeKind, material: Material, transform: Transform) -> Self {
        Self {
            kind,
            material: Some(material),
            transform,
        }
    }
}

/// A node attached to the graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub material: Option<Material>,
    pub transform: Transform,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Pool entries owned exclusively by this node.
    pub resources: Vec<ResourceId>,
}
