//! Shared types and utilities for the shoji panel stream.

mod types;

pub use types::{Color, ImageId, NodeId, Transform};
