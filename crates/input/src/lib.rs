//! Session input: the few things a viewer can do, mapped to effects.
//!
//! # Invariants
//! - The fly-through starts at most once.
//! - Nothing but the start trigger and the fullscreen toggle is user input;
//!   soundtrack events come from the audio host.

pub mod action;
pub mod session;

pub use action::{Action, Track};
pub use session::{Effect, Session, SessionPhase};
