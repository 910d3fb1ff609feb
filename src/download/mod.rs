//! Downloader registry.
//!
//! Strategies are consulted in registration order. The first one that does
//! not decline wins; if all decline, the [`Generic`] fallback runs.
//!
//! ## Strategies
//!
//! - Registered strategies implement [`Downloader`] and return
//!   [`Outcome::NotApplicable`] for URIs they do not handle
//! - [`Generic`] handles `http(s)://` files, `file://` URIs and plain paths

mod generic;
mod transport;

pub use generic::Generic;
pub use transport::{HttpTransport, MemoryTransport, Transport};

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of asking one strategy to download a URI.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The strategy handled the URI; the path is a file or `dst` itself.
    Fetched(PathBuf),
    /// The URI is not for this strategy; try the next one.
    NotApplicable,
}

pub trait Downloader {
    fn name(&self) -> &str;
    fn download(&self, dst: &Path, uri: &str) -> Result<Outcome>;
}

pub struct Registry {
    strategies: Vec<Box<dyn Downloader>>,
    fallback: Generic,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(HttpTransport::default())
    }
}

impl Registry {
    /// An empty registry whose fallback fetches remote files through `transport`.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            strategies: Vec::new(),
            fallback: Generic::new(transport),
        }
    }

    pub fn register(&mut self, downloader: impl Downloader + 'static) {
        self.strategies.push(Box::new(downloader));
    }

    /// Names of the registered strategies, in the order they are tried.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Download `uri` into `dst`, creating `dst` if needed.
    pub fn fetch(&self, dst: &Path, uri: &str) -> Result<PathBuf> {
        fs::create_dir_all(dst)?;
        for strategy in &self.strategies {
            match strategy.download(dst, uri)? {
                Outcome::Fetched(path) => return Ok(path),
                Outcome::NotApplicable => continue,
            }
        }
        self.fallback.fetch(dst, uri)
    }
}
