use rand::Rng;
use rand::seq::SliceRandom;
use shoji_common::ImageId;

/// Hands out image ids as a shuffled permutation of `1..=M`.
///
/// Every id is drawn exactly once per cycle. When the cycle is exhausted the
/// order is reshuffled and the cursor returns to 0, so the last id of one cycle
/// may equal the first id of the next.
#[derive(Debug, Clone)]
pub struct ImageSequencer<R> {
    order: Vec<ImageId>,
    cursor: usize,
    rng: R,
}

impl<R: Rng> ImageSequencer<R> {
    /// Shuffled sequencer over `1..=count`. `count` must be at least 1.
    pub fn new(count: u32, mut rng: R) -> Self {
        debug_assert!(count >= 1, "image set must not be empty");
        let mut order: Vec<ImageId> = (1..=count).map(ImageId).collect();
        order.shuffle(&mut rng);
        Self {
            order,
            cursor: 0,
            rng,
        }
    }

    /// Draw the next id, reshuffling once the permutation is used up.
    pub fn next(&mut self) -> ImageId {
        let id = self.order[self.cursor];
        self.cursor += 1;
        if self.cursor == self.order.len() {
            self.order.shuffle(&mut self.rng);
            self.cursor = 0;
            tracing::trace!(count = self.order.len(), "image order reshuffled");
        }
        id
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The current cycle's permutation.
    pub fn order(&self) -> &[ImageId] {
        &self.order
    }

    /// Number of images per cycle.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
