//! Where asset bytes come from.
//!
//! The asset manager never touches the network or the filesystem directly;
//! it asks an [`AssetSource`] for the bytes behind a URL.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// Blocking byte fetcher keyed by URL.
pub trait AssetSource {
    fn fetch(&self, url: &str) -> ResourceResult<Vec<u8>>;
}

impl<S: AssetSource + ?Sized> AssetSource for Arc<S> {
    fn fetch(&self, url: &str) -> ResourceResult<Vec<u8>> {
        (**self).fetch(url)
    }
}

impl<S: AssetSource + ?Sized> AssetSource for Box<S> {
    fn fetch(&self, url: &str) -> ResourceResult<Vec<u8>> {
        (**self).fetch(url)
    }
}

/// Resolves URLs as paths below a root directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for FileSource {
    fn fetch(&self, url: &str) -> ResourceResult<Vec<u8>> {
        let relative = url.trim_start_matches("file://").trim_start_matches('/');
        let path = self.root.join(relative);
        if !path.exists() {
            return Err(ResourceError::NotFound(path.display().to_string()));
        }
        debug!(path = %path.display(), "Reading asset");
        Ok(std::fs::read(&path)?)
    }
}

/// In-memory source that records how often each URL was fetched.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(url.into(), bytes.into());
    }

    /// Number of fetches issued for `url`.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches
            .lock()
            .map(|f| f.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of fetches issued across all URLs.
    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().map(|f| f.values().sum()).unwrap_or(0)
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, url: &str) -> ResourceResult<Vec<u8>> {
        if let Ok(mut fetches) = self.fetches.lock() {
            *fetches.entry(url.to_string()).or_insert(0) += 1;
        }
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(url.to_string()))
    }
}
