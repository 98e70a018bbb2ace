//! Developer tooling: stream inspector and frame timing.
//!
//! # Invariants
//! - Tools only read stream and scene state.

mod inspector;
mod timing;

pub use inspector::{PanelInfo, StreamInspector, StreamSummary};
pub use timing::FrameTimer;
