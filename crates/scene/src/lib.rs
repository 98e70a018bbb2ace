//! Scene graph: the node tree renderers draw and the resources its nodes own.
//!
//! # Invariants
//! - Every node except the root has exactly one parent.
//! - Removing a node detaches its whole subtree and releases every resource
//!   owned by that subtree exactly once.
//! - All mutations produce events.

pub mod graph;
pub mod node;
pub mod resources;

pub use graph::{Removed, SceneError, SceneEvent, SceneGraph};
pub use node::{Material, Node, NodeDesc, NodeKind};
pub use resources::{ResourceId, ResourceKind, ResourcePool};
