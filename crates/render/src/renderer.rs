use glam::Vec3;
use shoji_common::NodeId;
use shoji_scene::{NodeKind, SceneGraph};

/// Camera/view configuration for rendering.
#[derive(Debug, Clone, Copy)]
pub struct RenderView {
    /// Camera position in world space.
    pub eye: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 25.0, 90.0),
            target: Vec3::new(0.0, 25.0, 89.0),
            fov_degrees: 45.0,
        }
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame of `scene` from `view`.
    fn render(&self, scene: &SceneGraph, view: &RenderView) -> Self::Output;
}

/// Debug text renderer.
///
/// Prints the scene tree. Below the root's direct children, subtrees are
/// summarised by node kind unless `expand_children` is set.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    pub expand_children: bool,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expanded() -> Self {
        Self {
            expand_children: true,
        }
    }

    fn write_node(&self, scene: &SceneGraph, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = scene.get(id) else {
            return;
        };
        let p = scene
            .world_matrix(id)
            .map(|m| m.transform_point3(Vec3::ZERO))
            .unwrap_or(node.transform.position);
        out.push_str(&format!(
            "{}|___ {} <{}> world=({:.2}, {:.2}, {:.2})",
            "  ".repeat(depth),
            id,
            node.kind.label(),
            p.x,
            p.y,
            p.z
        ));
        if let Some(texture) = node.material.and_then(|m| m.texture) {
            out.push_str(&format!(" texture={texture}"));
        }
        out.push('\n');

        let expand = depth == 0 || self.expand_children;
        if expand {
            for child in scene.children(id) {
                self.write_node(scene, *child, depth + 1, out);
            }
        } else if !node.children.is_empty() {
            let mut counts: Vec<(&'static str, usize)> = Vec::new();
            for child in &node.children {
                let Some(c) = scene.get(*child) else { continue };
                let label = c.kind.label();
                match counts.iter_mut().find(|(l, _)| *l == label) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((label, 1)),
                }
                if let Some(texture) = c.material.and_then(|m| m.texture) {
                    out.push_str(&format!("{}  photo {texture}\n", "  ".repeat(depth)));
                }
            }
            let summary: Vec<String> = counts.iter().map(|(l, n)| format!("{n} {l}")).collect();
            out.push_str(&format!(
                "{}  children: {}\n",
                "  ".repeat(depth),
                summary.join(", ")
            ));
        }
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, scene: &SceneGraph, view: &RenderView) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "=== Scene (nodes={}, resources={}) ===\n",
            scene.node_count(),
            scene.resources().live_count()
        ));
        out.push_str(&format!(
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}\n",
            view.eye.x,
            view.eye.y,
            view.eye.z,
            view.target.x,
            view.target.y,
            view.target.z,
            view.fov_degrees
        ));
        self.write_node(scene, scene.root(), 0, &mut out);
        tracing::trace!(nodes = scene.node_count(), bytes = out.len(), "scene rendered");
        out
    }
}
