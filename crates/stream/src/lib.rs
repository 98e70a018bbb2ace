//! Panel stream: the procedural corridor of shoji panels.
//!
//! # Invariants
//! - Panels are issued in strictly increasing creation index and anchored
//!   `pitch` apart along +X.
//! - The spawn threshold moves when a panel is issued, not when it completes.
//! - At most `window_size` panels are live after every admission; a retired
//!   panel never comes back.
//! - Images rotate through a shuffled permutation before any repeats.
//!
//! # Concurrency
//! Single-threaded and cooperative. The image fetch is the only suspension
//! point; pending panels are polled once per frame and admitted in completion
//! order.

mod camera;
mod config;
mod factory;
mod sequencer;
mod state;
mod stream;
mod window;

pub use camera::FlyThroughCamera;
pub use config::{ConfigError, EvictionPolicy, StreamConfig};
pub use factory::{
    FittedSize, Panel, PanelDraft, PanelFactory, PanelRequest, PanelTask, PendingPanel,
    Placement, fit_image,
};
pub use sequencer::ImageSequencer;
pub use state::GeneratorState;
pub use stream::{FrameReport, PanelError, PanelFailure, PanelStream, StreamStats};
pub use window::{Admission, LivePanel, LiveWindow, PanelState, WindowError};
