use std::future::Future;
use std::path::PathBuf;

use crate::{ImageData, ImageLoader, ResourceLoadError};

/// Loads images from the local filesystem, treating URLs as paths.
///
/// Decoding happens when the future is first polled, not when `load` is called.
#[derive(Debug, Clone, Default)]
pub struct FsImageLoader;

impl FsImageLoader {
    pub fn new() -> Self {
        Self
    }
}

fn read_image(url: String) -> Result<ImageData, ResourceLoadError> {
    let path = PathBuf::from(&url);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ResourceLoadError::NotFound { url });
        }
        Err(source) => return Err(ResourceLoadError::Io { url, source }),
    };
    let decoded = image::load_from_memory(&bytes)
        .map_err(|source| ResourceLoadError::Decode {
            url: url.clone(),
            source,
        })?
        .into_rgba8();
    tracing::debug!(
        %url,
        width = decoded.width(),
        height = decoded.height(),
        "image decoded"
    );
    Ok(ImageData {
        width: decoded.width(),
        height: decoded.height(),
        pixels: decoded.into_raw(),
    })
}

impl ImageLoader for FsImageLoader {
    fn load(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<ImageData, ResourceLoadError>> + 'static {
        let url = url.to_string();
        async move { read_image(url) }
    }
}
