use std::f32::consts::PI;
use std::future::Future;
use std::pin::Pin;

use rand::Rng;
use shoji_assets::{ImageData, ImageLoader, ImageSource, ResourceLoadError};
use shoji_common::{Color, ImageId, Transform};
use shoji_scene::{Material, NodeDesc, NodeKind};

use crate::config::StreamConfig;

const BACKING_WIDTH: f32 = 97.0;
const BACKING_HEIGHT: f32 = 50.0;
const BACKING_Y: f32 = 25.0;
const BACKING_OPACITY: f32 = 0.8;
const BAR_COLOR: Color = Color(0x2e2e2e);
const GRID_COLOR: Color = Color(0xdcaeb7);
const GRID_SIZE: f32 = 500.0;
const GRID_DIVISIONS: u32 = 50;
const SHAPE_COLOR: Color = Color(0xffb7c5);
const FRAME_Z: f32 = 0.5;
const PICTURE_Z: f32 = 1.0;
const FRAME_MARGIN: f64 = 2.0;

/// Where a panel goes and where the next one is due.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// X of the panel's local origin in world space.
    pub world_offset_x: f64,
    /// Camera X at which the following panel must be spawned.
    pub next_offset_x: f64,
}

/// Inputs captured when a panel is issued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelRequest {
    pub creation_index: u64,
    pub previous_offset_x: f64,
    pub image_id: ImageId,
}

/// Photo size after fitting into the square bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedSize {
    pub width: f64,
    pub height: f64,
}

/// Fit a `width × height` image into a `max_dimension` box, keeping its aspect.
pub fn fit_image(width: u32, height: u32, max_dimension: f64) -> FittedSize {
    let ratio = width as f64 / height as f64;
    if ratio > 1.0 {
        FittedSize {
            width: max_dimension,
            height: max_dimension / ratio,
        }
    } else {
        FittedSize {
            width: max_dimension * ratio,
            height: max_dimension,
        }
    }
}

/// A fully built panel, not yet attached to any scene.
///
/// `root` is the translucent backing plane; `parts` are its children in
/// attach order.
#[derive(Debug, Clone)]
pub struct Panel {
    pub creation_index: u64,
    pub world_offset_x: f64,
    pub image_id: ImageId,
    pub image_size: FittedSize,
    pub image: ImageData,
    pub root: NodeDesc,
    pub parts: Vec<NodeDesc>,
}

impl Panel {
    /// Number of decorative shapes among the parts.
    pub fn shape_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p.kind, NodeKind::Cone { .. }))
            .count()
    }
}

/// The synchronous half of a panel: everything except the photo.
#[derive(Debug, Clone)]
pub struct PanelDraft {
    pub request: PanelRequest,
    pub placement: Placement,
    pub root: NodeDesc,
    pub parts: Vec<NodeDesc>,
}

impl PanelDraft {
    /// Add the picture frame and photo plane once the image has arrived.
    pub fn finish(mut self, image: ImageData, max_dimension: f64) -> Panel {
        let size = fit_image(image.width, image.height, max_dimension);
        let (w, h) = (size.width as f32, size.height as f32);
        let margin = FRAME_MARGIN as f32;

        self.parts.push(NodeDesc::mesh(
            NodeKind::Box,
            Material::solid(BAR_COLOR),
            Transform::at(0.0, 0.0, FRAME_Z).with_scale(w + margin, h + margin, 1.0),
        ));
        self.parts.push(NodeDesc::mesh(
            NodeKind::Plane {
                width: w,
                height: h,
            },
            Material::textured(self.request.image_id),
            Transform::at(0.0, 0.0, PICTURE_Z),
        ));

        Panel {
            creation_index: self.request.creation_index,
            world_offset_x: self.placement.world_offset_x,
            image_id: self.request.image_id,
            image_size: size,
            image,
            root: self.root,
            parts: self.parts,
        }
    }
}

pub type PanelTask = Pin<Box<dyn Future<Output = Result<Panel, ResourceLoadError>>>>;

/// A panel whose image fetch is in flight.
pub struct PendingPanel {
    pub request: PanelRequest,
    pub placement: Placement,
    pub task: PanelTask,
}

impl std::fmt::Debug for PendingPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingPanel")
            .field("request", &self.request)
            .field("placement", &self.placement)
            .finish_non_exhaustive()
    }
}

/// Builds shoji panels: frame, shape cluster and fitted photo.
#[derive(Debug, Clone)]
pub struct PanelFactory {
    anchor_advance: f64,
    pitch: f64,
    shape_count: usize,
    image_max_dimension: f64,
    source: ImageSource,
}

impl PanelFactory {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            anchor_advance: config.anchor_advance,
            pitch: config.pitch,
            shape_count: config.shape_count,
            image_max_dimension: config.image_max_dimension,
            source: ImageSource::new(config.base_url.clone()),
        }
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// `world = previous + anchor_advance`, `next = world - pitch`.
    pub fn place(&self, previous_offset_x: f64) -> Placement {
        let world_offset_x = previous_offset_x + self.anchor_advance;
        Placement {
            world_offset_x,
            next_offset_x: world_offset_x - self.pitch,
        }
    }

    /// Build the backing plane, frame bars, floor grid and shape cluster.
    pub fn draft<R: Rng>(&self, request: PanelRequest, rng: &mut R) -> PanelDraft {
        let placement = self.place(request.previous_offset_x);
        let root = NodeDesc::mesh(
            NodeKind::Plane {
                width: BACKING_WIDTH,
                height: BACKING_HEIGHT,
            },
            Material {
                opacity: BACKING_OPACITY,
                double_sided: true,
                ..Material::solid(Color::WHITE)
            },
            Transform::at(placement.world_offset_x as f32, BACKING_Y, 0.0),
        );

        let mut parts = Vec::with_capacity(7 + self.shape_count + 2);
        for x in [-47.5, -33.5, 33.5, 47.5] {
            parts.push(bar(Transform::at(x, 0.0, 0.0).with_scale(2.5, 50.0, 2.5)));
        }
        for y in [23.75, -23.75] {
            parts.push(bar(Transform::at(0.0, y, 0.0).with_scale(100.0, 2.5, 5.0)));
        }
        parts.push(NodeDesc::mesh(
            NodeKind::Grid {
                size: GRID_SIZE,
                divisions: GRID_DIVISIONS,
            },
            Material::solid(GRID_COLOR),
            Transform::at(0.0, -BACKING_Y, 0.0),
        ));
        for _ in 0..self.shape_count {
            parts.push(random_cone(rng));
        }

        PanelDraft {
            request,
            placement,
            root,
            parts,
        }
    }

    /// Run the synchronous construction and start the image fetch.
    ///
    /// The placement is known as soon as this returns; the panel itself comes
    /// out of `task` when the fetch resolves.
    pub fn issue<L: ImageLoader, R: Rng>(
        &self,
        request: PanelRequest,
        loader: &L,
        rng: &mut R,
    ) -> PendingPanel {
        let draft = self.draft(request, rng);
        let placement = draft.placement;
        let url = self.source.url_for(request.image_id);
        tracing::debug!(
            index = request.creation_index,
            image = %request.image_id,
            x = placement.world_offset_x,
            %url,
            "panel issued"
        );
        let fetch = loader.load(&url);
        let max_dimension = self.image_max_dimension;
        let task: PanelTask = Box::pin(async move {
            let image = fetch.await?;
            Ok(draft.finish(image, max_dimension))
        });
        PendingPanel {
            request,
            placement,
            task,
        }
    }

    /// Build one panel end to end. Returns it with the next spawn offset.
    pub async fn create<L: ImageLoader, R: Rng>(
        &self,
        request: PanelRequest,
        loader: &L,
        rng: &mut R,
    ) -> Result<(Panel, f64), ResourceLoadError> {
        let pending = self.issue(request, loader, rng);
        let panel = pending.task.await?;
        Ok((panel, pending.placement.next_offset_x))
    }
}

fn bar(transform: Transform) -> NodeDesc {
    NodeDesc::mesh(NodeKind::Box, Material::solid(BAR_COLOR), transform)
}

fn random_cone<R: Rng>(rng: &mut R) -> NodeDesc {
    let x = rng.gen_range(-75.0..75.0);
    let y = rng.gen_range(-20.0..80.0);
    let z = rng.gen_range(-110.0..-10.0);
    let scale = rng.gen_range(1.0..2.0);
    let (rx, ry, rz) = (
        rng.gen_range(0.0..PI),
        rng.gen_range(0.0..PI),
        rng.gen_range(0.0..PI),
    );
    NodeDesc::mesh(
        NodeKind::Cone {
            radius: 1.0,
            height: 1.0,
            radial_segments: 3,
        },
        Material::solid(SHAPE_COLOR),
        Transform::at(x, y, z)
            .with_scale(scale, scale, scale)
            .with_euler(rx, ry, rz),
    )
}
