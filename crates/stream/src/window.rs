use std::collections::BTreeMap;

use shoji_common::{ImageId, NodeId};
use shoji_scene::{SceneError, SceneGraph};

use crate::config::EvictionPolicy;
use crate::factory::{FittedSize, Panel};

/// Lifecycle of a panel. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelState {
    /// Issued, image fetch in flight.
    Pending,
    /// Admitted and attached to the scene.
    Live,
    /// Detached and its resources released.
    Retired,
}

/// Errors from admitting or retiring panels.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("panel {0} is already live")]
    AlreadyLive(u64),
    #[error("panel {0} was retired and cannot be admitted again")]
    AlreadyRetired(u64),
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
}

/// A panel attached to the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct LivePanel {
    pub creation_index: u64,
    pub world_offset_x: f64,
    pub image_id: ImageId,
    pub image_size: FittedSize,
    /// Root node of the panel's subtree.
    pub root: NodeId,
}

/// Outcome of a successful admission.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub creation_index: u64,
    pub root: NodeId,
    /// Panels retired because of this admission, oldest first.
    pub retired: Vec<LivePanel>,
    /// Evictions whose scene removal failed. The panel is retired either way.
    pub retire_errors: Vec<WindowError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closed {
    Retired,
    /// Never admitted (the fetch failed).
    Skipped,
}

/// Bounded, creation-ordered set of live panels.
///
/// Panels are keyed by creation index in a BTreeMap so the oldest live panel
/// is always the first entry. Closed indices (retired or skipped) are kept as
/// a low watermark plus the sparse set above it, so a panel can never come
/// back and the bookkeeping stays small.
#[derive(Debug, Clone)]
pub struct LiveWindow {
    capacity: usize,
    policy: EvictionPolicy,
    live: BTreeMap<u64, LivePanel>,
    /// Every index below this is closed.
    closed_below: u64,
    closed: BTreeMap<u64, Closed>,
    admitted_total: u64,
    retired_total: usize,
}

impl LiveWindow {
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        debug_assert!(capacity >= 1, "window must hold at least one panel");
        Self {
            capacity,
            policy,
            live: BTreeMap::new(),
            closed_below: 0,
            closed: BTreeMap::new(),
            admitted_total: 0,
            retired_total: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live panels, oldest first.
    pub fn panels(&self) -> impl Iterator<Item = &LivePanel> {
        self.live.values()
    }

    pub fn live_indices(&self) -> Vec<u64> {
        self.live.keys().copied().collect()
    }

    pub fn get(&self, creation_index: u64) -> Option<&LivePanel> {
        self.live.get(&creation_index)
    }

    /// `Live` or `Retired` for indices the window has seen, `None` otherwise.
    ///
    /// Skipped indices read as `None` until the watermark passes them, then
    /// as `Retired`.
    pub fn state_of(&self, creation_index: u64) -> Option<PanelState> {
        if self.live.contains_key(&creation_index) {
            return Some(PanelState::Live);
        }
        match self.closed.get(&creation_index) {
            Some(Closed::Retired) => Some(PanelState::Retired),
            Some(Closed::Skipped) => None,
            None if creation_index < self.closed_below => Some(PanelState::Retired),
            None => None,
        }
    }

    pub fn admitted_total(&self) -> u64 {
        self.admitted_total
    }

    pub fn retired_total(&self) -> usize {
        self.retired_total
    }

    /// Lowest index that may still be admitted or is still live.
    pub fn closed_below(&self) -> u64 {
        self.closed_below
    }

    /// Closed indices above the watermark, held back by a live or pending gap.
    pub fn sparse_closed(&self) -> usize {
        self.closed.len()
    }

    fn is_closed(&self, creation_index: u64) -> bool {
        creation_index < self.closed_below || self.closed.contains_key(&creation_index)
    }

    fn close(&mut self, creation_index: u64, how: Closed) {
        if creation_index < self.closed_below {
            return;
        }
        self.closed.insert(creation_index, how);
        while let Some(entry) = self.closed.first_entry() {
            if *entry.key() != self.closed_below {
                break;
            }
            entry.remove();
            self.closed_below += 1;
        }
    }

    /// Mark an index that will never be admitted, e.g. after a failed fetch.
    pub fn skip(&mut self, creation_index: u64) {
        if !self.live.contains_key(&creation_index) && !self.is_closed(creation_index) {
            self.close(creation_index, Closed::Skipped);
        }
    }

    /// Attach `panel` under the scene root and retire whatever falls out.
    ///
    /// Once the panel is attached the admission stands; eviction failures are
    /// logged and returned in [`Admission::retire_errors`].
    pub fn admit(
        &mut self,
        panel: Panel,
        scene: &mut SceneGraph,
    ) -> Result<Admission, WindowError> {
        let index = panel.creation_index;
        if self.live.contains_key(&index) {
            return Err(WindowError::AlreadyLive(index));
        }
        if self.is_closed(index) {
            return Err(WindowError::AlreadyRetired(index));
        }

        let root = scene.add_subtree(scene.root(), panel.root, panel.parts)?;
        self.live.insert(
            index,
            LivePanel {
                creation_index: index,
                world_offset_x: panel.world_offset_x,
                image_id: panel.image_id,
                image_size: panel.image_size,
                root,
            },
        );
        self.admitted_total += 1;
        tracing::debug!(index, %root, live = self.live.len(), "panel admitted");

        let mut targets = Vec::new();
        if self.policy == EvictionPolicy::CreationLag {
            if let Some(target) = index.checked_sub(self.capacity as u64) {
                if self.live.contains_key(&target) {
                    targets.push(target);
                }
            }
        }
        let excess = (self.live.len() - targets.len()).saturating_sub(self.capacity);
        targets.extend(
            self.live
                .keys()
                .copied()
                .filter(|k| !targets.contains(k))
                .take(excess)
                .collect::<Vec<_>>(),
        );

        let mut retired = Vec::new();
        let mut retire_errors = Vec::new();
        for target in targets {
            let panel = self.live.get(&target).cloned();
            match self.retire(target, scene) {
                Ok(Some(p)) => retired.push(p),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(index = target, %error, "eviction failed");
                    retired.extend(panel);
                    retire_errors.push(error);
                }
            }
        }

        Ok(Admission {
            creation_index: index,
            root,
            retired,
            retire_errors,
        })
    }

    /// Retire one live panel. Indices that are not live are left alone.
    ///
    /// The panel leaves the window even when its scene removal fails.
    pub fn retire(
        &mut self,
        creation_index: u64,
        scene: &mut SceneGraph,
    ) -> Result<Option<LivePanel>, WindowError> {
        let Some(panel) = self.live.remove(&creation_index) else {
            return Ok(None);
        };
        self.close(creation_index, Closed::Retired);
        self.retired_total += 1;
        let removed = scene.remove(panel.root)?;
        tracing::debug!(
            index = creation_index,
            nodes = removed.nodes.len(),
            released = removed.released,
            "panel retired"
        );
        Ok(Some(panel))
    }

    /// Retire every live panel, oldest first.
    pub fn clear(&mut self, scene: &mut SceneGraph) -> Result<Vec<LivePanel>, WindowError> {
        let indices = self.live_indices();
        let mut out = Vec::with_capacity(indices.len());
        for index in indices {
            if let Some(p) = self.retire(index, scene)? {
                out.push(p);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::factory::{PanelFactory, PanelRequest};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use shoji_assets::ImageData;

    fn make_panel(index: u64) -> Panel {
        let factory = PanelFactory::new(&StreamConfig::default());
        let mut rng = StdRng::seed_from_u64(index);
        let request = PanelRequest {
            creation_index: index,
            previous_offset_x: 150.0 * index as f64,
            image_id: ImageId(1 + (index % 12) as u32),
        };
        factory
            .draft(request, &mut rng)
            .finish(ImageData::blank(4, 3), 37.0)
    }

    fn retired_indices(a: &Admission) -> Vec<u64> {
        a.retired.iter().map(|p| p.creation_index).collect()
    }

    #[test]
    fn window_stays_bounded() {
        let mut scene = SceneGraph::new();
        let mut window = LiveWindow::new(4, EvictionPolicy::CreationLag);
        for i in 0..10 {
            let a = window.admit(make_panel(i), &mut scene).unwrap();
            if i < 4 {
                assert!(a.retired.is_empty());
            } else {
                assert_eq!(retired_indices(&a), vec![i - 4]);
            }
            assert!(window.len() <= 4);
        }
        assert_eq!(window.len(), 4);
        assert_eq!(window.live_indices(), vec![6, 7, 8, 9]);
        assert_eq!(window.retired_total(), 6);
    }

    #[test]
    fn first_panel_retired_when_fifth_admitted() {
        let mut scene = SceneGraph::new();
        let mut window = LiveWindow::new(4, EvictionPolicy::CreationLag);
        for i in 0..4 {
            window.admit(make_panel(i), &mut scene).unwrap();
        }
        assert_eq!(window.state_of(0), Some(PanelState::Live));

        let a = window.admit(make_panel(4), &mut scene).unwrap();
        assert_eq!(retired_indices(&a), vec![0]);
        assert_eq!(window.state_of(0), Some(PanelState::Retired));
        assert_eq!(window.live_indices(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn retirement_releases_scene_resources() {
        let mut scene = SceneGraph::new();
        let mut window = LiveWindow::new(4, EvictionPolicy::CreationLag);
        window.admit(make_panel(0), &mut scene).unwrap();
        let per_panel_nodes = scene.node_count() - 1;
        let per_panel_resources = scene.resources().live_count();
        for i in 1..5 {
            window.admit(make_panel(i), &mut scene).unwrap();
        }
        assert_eq!(scene.node_count(), 1 + 4 * per_panel_nodes);
        assert_eq!(scene.resources().live_count(), 4 * per_panel_resources);
        assert_eq!(
            scene.resources().released_total(),
            per_panel_resources as u64
        );
    }

    #[test]
    fn gap_in_indices_follows_creation_lag() {
        // Panel 2 never arrives (failed fetch).
        let mut scene = SceneGraph::new();
        let mut window = LiveWindow::new(4, EvictionPolicy::CreationLag);
        for i in [0, 1, 3] {
            let a = window.admit(make_panel(i), &mut scene).unwrap();
            assert!(a.retired.is_empty());
        }
        let a = window.admit(make_panel(4), &mut scene).unwrap();
        assert_eq!(retired_indices(&a), vec![0]);
        assert_eq!(window.live_indices(), vec![1, 3, 4]);

        // Lag target 2 was never live: nothing retired.
        window.admit(make_panel(5), &mut scene).unwrap();
        let a = window.admit(make_panel(6), &mut scene).unwrap();
        assert!(a.retired.is_empty());
        assert_eq!(window.live_indices(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn late_arrival_is_capped() {
        let mut scene = SceneGraph::new();
        let mut window = LiveWindow::new(4, EvictionPolicy::CreationLag);
        for i in 1..=4 {
            window.admit(make_panel(i), &mut scene).unwrap();
        }
        // Panel 0 completes last; the lag rule has nothing to say about it.
        let a = window.admit(make_panel(0), &mut scene).unwrap();
        assert_eq!(retired_indices(&a), vec![0]);
        assert_eq!(window.len(), 4);
        assert_eq!(window.state_of(0), Some(PanelState::Retired));
    }

    #[test]
    fn oldest_live_policy() {
        let mut scene = SceneGraph::new();
        let mut window = LiveWindow::new(4, EvictionPolicy::OldestLive);
        for i in [0, 1, 3, 4, 5] {
            window.admit(make_panel(i), &mut scene).unwrap();
        }
        assert_eq!(window.live_indices(), vec![1, 3, 4, 5]);
    }

    #[test]
    fn retired_panel_cannot_return() {
        let mut scene = SceneGraph::new();
        let mut window = LiveWindow::new(1, EvictionPolicy::CreationLag);
        window.admit(make_panel(0), &mut scene).unwrap();
        window.admit(make_panel(1), &mut scene).unwrap();
        assert_eq!(
            window.admit(make_panel(0), &mut scene).unwrap_err(),
            WindowError::AlreadyRetired(0)
        );
        assert_eq!(
            window.admit(make_panel(1), &mut scene).unwrap_err(),
            WindowError::AlreadyLive(1)
        );
    }

    #[test]
    fn clear_retires_everything() {
        let mut scene = SceneGraph::new();
        let mut window = LiveWindow::new(4, EvictionPolicy::CreationLag);
        for i in 0..3 {
            window.admit(make_panel(i), &mut scene).unwrap();
        }
        let cleared = window.clear(&mut scene).unwrap();
        assert_eq!(cleared.len(), 3);
        assert!(window.is_empty());
        assert_eq!(scene.node_count(), 1);
        assert_eq!(scene.resources().live_count(), 0);
    }

    #[test]
    fn failed_eviction_keeps_admission() {
        let mut scene = SceneGraph::new();
        let mut window = LiveWindow::new(4, EvictionPolicy::CreationLag);
        for i in 0..4 {
            window.admit(make_panel(i), &mut scene).unwrap();
        }
        // Panel 0's subtree vanished behind the window's back.
        let root0 = window.get(0).unwrap().root;
        scene.remove(root0).unwrap();

        let a = window.admit(make_panel(4), &mut scene).unwrap();
        assert_eq!(retired_indices(&a), vec![0]);
        assert_eq!(
            a.retire_errors,
            vec![WindowError::Scene(SceneError::NodeNotFound(root0))]
        );
        assert_eq!(window.state_of(4), Some(PanelState::Live));
        assert_eq!(window.state_of(0), Some(PanelState::Retired));
        assert_eq!(window.live_indices(), vec![1, 2, 3, 4]);
        assert_eq!(window.admitted_total(), 5);
    }

    #[test]
    fn closed_indices_stay_compact() {
        let mut scene = SceneGraph::new();
        let mut window = LiveWindow::new(4, EvictionPolicy::CreationLag);
        for i in 0..1000 {
            window.admit(make_panel(i), &mut scene).unwrap();
        }
        assert_eq!(window.retired_total(), 996);
        assert_eq!(window.closed_below(), 996);
        assert_eq!(window.sparse_closed(), 0);
        assert_eq!(window.state_of(10), Some(PanelState::Retired));
        assert_eq!(
            window.admit(make_panel(10), &mut scene).unwrap_err(),
            WindowError::AlreadyRetired(10)
        );
    }

    #[test]
    fn skipped_index_does_not_hold_back_watermark() {
        let mut scene = SceneGraph::new();
        let mut window = LiveWindow::new(2, EvictionPolicy::CreationLag);
        window.admit(make_panel(0), &mut scene).unwrap();
        window.skip(1);
        assert_eq!(window.state_of(1), None);
        for i in 2..6 {
            window.admit(make_panel(i), &mut scene).unwrap();
        }
        assert_eq!(window.live_indices(), vec![4, 5]);
        assert_eq!(window.closed_below(), 4);
        assert_eq!(window.sparse_closed(), 0);
        assert_eq!(
            window.admit(make_panel(1), &mut scene).unwrap_err(),
            WindowError::AlreadyRetired(1)
        );
    }

    #[test]
    fn skip_ignores_live_panels() {
        let mut scene = SceneGraph::new();
        let mut window = LiveWindow::new(4, EvictionPolicy::CreationLag);
        window.admit(make_panel(0), &mut scene).unwrap();
        window.skip(0);
        assert_eq!(window.state_of(0), Some(PanelState::Live));
        assert_eq!(window.closed_below(), 0);
    }
}
