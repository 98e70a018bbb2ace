use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use shoji_common::ImageId;

use crate::{ImageData, ImageLoader, ImageSource, ResourceLoadError};

#[derive(Debug, Clone)]
enum Entry {
    Ready(ImageData),
    Failing(String),
}

#[derive(Debug, Default)]
struct Shared {
    entries: HashMap<String, Entry>,
    held: HashMap<String, Vec<Waker>>,
    /// Most recent requests, capped at `REQUEST_LOG_CAPACITY`.
    requests: VecDeque<String>,
    request_count: u64,
}

/// In-memory loader with per-URL gating.
///
/// Clones share state, so a test can keep a handle, issue loads through
/// another, and later `release` a held URL to let its pending loads finish.
/// Single-threaded by construction (`Rc`).
#[derive(Debug, Clone, Default)]
pub struct MemoryImageLoader {
    shared: Rc<RefCell<Shared>>,
}

impl MemoryImageLoader {
    /// Number of recent requests kept by [`requests`](Self::requests).
    pub const REQUEST_LOG_CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::default()
    }

    /// Loader pre-filled with `count` blank images under `source`, cycling
    /// through landscape, portrait and square shapes.
    pub fn synthetic(source: &ImageSource, count: u32) -> Self {
        let loader = Self::new();
        const SHAPES: [(u32, u32); 3] = [(64, 36), (36, 64), (48, 48)];
        for n in 1..=count {
            let (w, h) = SHAPES[(n as usize - 1) % SHAPES.len()];
            loader.insert(source.url_for(ImageId(n)), ImageData::blank(w, h));
        }
        loader
    }

    pub fn insert(&self, url: impl Into<String>, image: ImageData) {
        self.shared
            .borrow_mut()
            .entries
            .insert(url.into(), Entry::Ready(image));
    }

    /// Make every load of `url` fail with `Unavailable`.
    pub fn fail(&self, url: impl Into<String>, reason: impl Into<String>) {
        self.shared
            .borrow_mut()
            .entries
            .insert(url.into(), Entry::Failing(reason.into()));
    }

    /// Keep loads of `url` pending until [`release`](Self::release).
    pub fn hold(&self, url: impl Into<String>) {
        self.shared.borrow_mut().held.entry(url.into()).or_default();
    }

    pub fn release(&self, url: &str) {
        let wakers = self.shared.borrow_mut().held.remove(url);
        for waker in wakers.into_iter().flatten() {
            waker.wake();
        }
    }

    /// The most recent requested URLs, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.shared.borrow().requests.iter().cloned().collect()
    }

    /// Total number of loads requested.
    pub fn request_count(&self) -> u64 {
        self.shared.borrow().request_count
    }

    /// Wakers parked on a held `url`, one per distinct waiting task.
    pub fn waiting(&self, url: &str) -> usize {
        self.shared.borrow().held.get(url).map_or(0, Vec::len)
    }
}

/// Future returned by [`MemoryImageLoader::load`].
#[derive(Debug)]
pub struct MemoryLoad {
    shared: Rc<RefCell<Shared>>,
    url: String,
}

impl Future for MemoryLoad {
    type Output = Result<ImageData, ResourceLoadError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.borrow_mut();
        if let Some(wakers) = shared.held.get_mut(&self.url) {
            if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                wakers.push(cx.waker().clone());
            }
            return Poll::Pending;
        }
        let url = self.url.clone();
        Poll::Ready(match shared.entries.get(&url) {
            Some(Entry::Ready(image)) => Ok(image.clone()),
            Some(Entry::Failing(reason)) => Err(ResourceLoadError::Unavailable {
                url,
                reason: reason.clone(),
            }),
            None => Err(ResourceLoadError::NotFound { url }),
        })
    }
}

impl ImageLoader for MemoryImageLoader {
    fn load(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<ImageData, ResourceLoadError>> + 'static {
        let mut shared = self.shared.borrow_mut();
        if shared.requests.len() == Self::REQUEST_LOG_CAPACITY {
            shared.requests.pop_front();
        }
        shared.requests.push_back(url.to_string());
        shared.request_count += 1;
        drop(shared);
        MemoryLoad {
            shared: Rc::clone(&self.shared),
            url: url.to_string(),
        }
    }
}
