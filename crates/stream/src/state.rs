use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shoji_assets::ImageLoader;

use crate::factory::{PanelFactory, PanelRequest, PendingPanel};
use crate::sequencer::ImageSequencer;

/// Running state of the generator, passed explicitly into each operation.
#[derive(Debug, Clone)]
pub struct GeneratorState<R> {
    /// Camera X at which the next panel is due.
    spawn_threshold_x: f64,
    next_creation_index: u64,
    sequencer: ImageSequencer<R>,
    /// Source for shape placement.
    rng: R,
}

impl<R: Rng> GeneratorState<R> {
    pub fn new(image_count: u32, sequencer_rng: R, shape_rng: R) -> Self {
        Self {
            spawn_threshold_x: 0.0,
            next_creation_index: 0,
            sequencer: ImageSequencer::new(image_count, sequencer_rng),
            rng: shape_rng,
        }
    }

    pub fn spawn_threshold_x(&self) -> f64 {
        self.spawn_threshold_x
    }

    pub fn next_creation_index(&self) -> u64 {
        self.next_creation_index
    }

    pub fn sequencer(&self) -> &ImageSequencer<R> {
        &self.sequencer
    }

    /// Level-triggered: true whenever the camera is at or past the threshold.
    pub fn spawn_due(&self, camera_x: f64) -> bool {
        camera_x >= self.spawn_threshold_x
    }

    /// Issue the next panel if it is due.
    ///
    /// The threshold moves to the new placement's `next_offset_x` before the
    /// image fetch has a chance to resolve, so a slow fetch can never cause a
    /// second issue for the same slot.
    pub fn spawn_if_due<L: ImageLoader>(
        &mut self,
        camera_x: f64,
        factory: &PanelFactory,
        loader: &L,
    ) -> Option<PendingPanel> {
        if !self.spawn_due(camera_x) {
            return None;
        }
        let request = PanelRequest {
            creation_index: self.next_creation_index,
            previous_offset_x: self.spawn_threshold_x,
            image_id: self.sequencer.next(),
        };
        self.next_creation_index += 1;
        let pending = factory.issue(request, loader, &mut self.rng);
        self.spawn_threshold_x = pending.placement.next_offset_x;
        Some(pending)
    }
}

impl GeneratorState<StdRng> {
    /// Deterministic state for replays and tests.
    pub fn seeded(image_count: u32, seed: u64) -> Self {
        Self::new(
            image_count,
            StdRng::seed_from_u64(seed),
            StdRng::seed_from_u64(seed.wrapping_add(0x9e37_79b9_7f4a_7c15)),
        )
    }

    /// Unseeded state backed by OS entropy.
    pub fn from_entropy(image_count: u32) -> Self {
        Self::new(image_count, StdRng::from_entropy(), StdRng::from_entropy())
    }
}
