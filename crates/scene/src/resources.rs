use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Handle to a GPU-side resource (buffer, material binding, texture).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Geometry,
    Material,
    Texture,
}

/// Tracks live GPU resources.
///
/// A resource is allocated once and released once. Releasing an id that is not
/// live returns `None`, so double releases are observable instead of silent.
#[derive(Debug, Clone, Default)]
pub struct ResourcePool {
    live: BTreeMap<ResourceId, ResourceKind>,
    next_id: u64,
    allocated_total: u64,
    released_total: u64,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, kind: ResourceKind) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.allocated_total += 1;
        self.live.insert(id, kind);
        id
    }

    pub fn release(&mut self, id: ResourceId) -> Option<ResourceKind> {
        let kind = self.live.remove(&id)?;
        self.released_total += 1;
        Some(kind)
    }

    pub fn is_live(&self, id: ResourceId) -> bool {
        self.live.contains_key(&id)
    }

    /// Number of resources currently allocated.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_count_of(&self, kind: ResourceKind) -> usize {
        self.live.values().filter(|k| **k == kind).count()
    }

    pub fn allocated_total(&self) -> u64 {
        self.allocated_total
    }

    pub fn released_total(&self) -> u64 {
        self.released_total
    }
}
