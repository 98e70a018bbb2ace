//! Image resources: where photos live and how they are fetched.
//!
//! Panels never read files directly. They ask an [`ImageLoader`] for the URL
//! produced by [`ImageSource`] and suspend until decoded [`ImageData`] arrives.
//!
//! # Layout
//! ```text
//! <base_url>/images/img-1.jpg
//! <base_url>/images/img-2.jpg
//! ...
//! ```

mod fs;
mod memory;

pub use fs::FsImageLoader;
pub use memory::{MemoryImageLoader, MemoryLoad};

use serde::{Deserialize, Serialize};
use shoji_common::ImageId;
use std::future::Future;

/// Decoded image: dimensions plus tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// Blank opaque image of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0xff; width as usize * height as usize * 4],
        }
    }

    /// `width / height`.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Errors from fetching or decoding an image resource.
#[derive(Debug, thiserror::Error)]
pub enum ResourceLoadError {
    #[error("failed to read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },
    #[error("resource not found: {url}")]
    NotFound { url: String },
    #[error("resource unavailable: {url} ({reason})")]
    Unavailable { url: String, reason: String },
}

impl ResourceLoadError {
    pub fn url(&self) -> &str {
        match self {
            ResourceLoadError::Io { url, .. }
            | ResourceLoadError::Decode { url, .. }
            | ResourceLoadError::NotFound { url }
            | ResourceLoadError::Unavailable { url, .. } => url,
        }
    }
}

/// Builds image URLs from a base location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    pub base_url: String,
}

impl ImageSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// `<base_url>/images/img-<n>.jpg`
    pub fn url_for(&self, id: ImageId) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.is_empty() {
            format!("images/{}", id.file_name())
        } else {
            format!("{base}/images/{}", id.file_name())
        }
    }
}

/// Asynchronous image fetcher.
///
/// The returned future owns everything it needs, so callers can park it in a
/// queue and poll it from a later frame. Loaders are not required to be `Send`.
pub trait ImageLoader {
    fn load(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<ImageData, ResourceLoadError>> + 'static;
}
