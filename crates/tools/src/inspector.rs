use rand::Rng;
use serde::Serialize;
use shoji_assets::ImageLoader;
use shoji_common::{ImageId, NodeId};
use shoji_scene::SceneGraph;
use shoji_stream::{EvictionPolicy, LivePanel, PanelStream};

/// Read-only queries over a running panel stream and its scene.
pub struct StreamInspector;

impl StreamInspector {
    /// Produce a summary of the stream state.
    pub fn summary<L: ImageLoader, R: Rng>(
        stream: &PanelStream<L, R>,
        scene: &SceneGraph,
    ) -> StreamSummary {
        let stats = stream.stats();
        StreamSummary {
            frames: stats.frames,
            spawn_threshold_x: stream.state().spawn_threshold_x(),
            next_creation_index: stream.state().next_creation_index(),
            image_cursor: stream.state().sequencer().cursor(),
            eviction: stream.window().policy(),
            live: stream.window().live_indices(),
            pending: stream.pending_indices(),
            issued: stats.issued,
            admitted: stats.admitted,
            retired: stats.retired,
            failed: stats.failed,
            scene_nodes: scene.node_count(),
            live_resources: scene.resources().live_count(),
        }
    }

    /// Details of every live panel, oldest first.
    pub fn list_panels<L: ImageLoader, R: Rng>(
        stream: &PanelStream<L, R>,
        scene: &SceneGraph,
    ) -> Vec<PanelInfo> {
        stream
            .window()
            .panels()
            .map(|p| PanelInfo::from_live(p, scene))
            .collect()
    }
}

/// Summary of stream state for the inspector.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    pub frames: u64,
    pub spawn_threshold_x: f64,
    pub next_creation_index: u64,
    pub image_cursor: usize,
    pub eviction: EvictionPolicy,
    pub live: Vec<u64>,
    pub pending: Vec<u64>,
    pub issued: u64,
    pub admitted: u64,
    pub retired: u64,
    pub failed: u64,
    pub scene_nodes: usize,
    pub live_resources: usize,
}

impl std::fmt::Display for StreamSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Stream: frames={} threshold={:.1} live={:?} pending={:?} issued={} retired={} failed={} nodes={} resources={}",
            self.frames,
            self.spawn_threshold_x,
            self.live,
            self.pending,
            self.issued,
            self.retired,
            self.failed,
            self.scene_nodes,
            self.live_resources,
        )
    }
}

/// Detailed info about a single live panel.
#[derive(Debug, Clone, Serialize)]
pub struct PanelInfo {
    pub creation_index: u64,
    pub world_offset_x: f64,
    pub image: ImageId,
    pub photo_size: [f64; 2],
    pub root: NodeId,
    /// Nodes in the panel's subtree, root included.
    pub nodes: usize,
}

impl PanelInfo {
    fn from_live(panel: &LivePanel, scene: &SceneGraph) -> Self {
        Self {
            creation_index: panel.creation_index,
            world_offset_x: panel.world_offset_x,
            image: panel.image_id,
            photo_size: [panel.image_size.width, panel.image_size.height],
            root: panel.root,
            nodes: scene.subtree(panel.root).len(),
        }
    }
}

impl std::fmt::Display for PanelInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Panel {} x={:.1} {} photo={:.2}x{:.2} root={} nodes={}",
            self.creation_index,
            self.world_offset_x,
            self.image,
            self.photo_size[0],
            self.photo_size[1],
            self.root,
            self.nodes,
        )
    }
}
