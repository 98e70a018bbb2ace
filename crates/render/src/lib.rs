//! Rendering adapter: renderer-agnostic interface over the scene graph.
//!
//! # Invariants
//! - Renderers read the scene graph; they never mutate it.
//!
//! The real GPU backend lives outside this workspace. The debug text renderer
//! stands in for it in the CLI and in tests.

mod renderer;

pub use renderer::{DebugTextRenderer, RenderView, Renderer};
