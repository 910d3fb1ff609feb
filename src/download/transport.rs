//! HTTP transport used by the generic downloader.

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read;
use std::rc::Rc;
use std::time::Duration;

const USER_AGENT: &str = concat!("pyvend/", env!("CARGO_PKG_VERSION"));
const TIMEOUT_SECS: u64 = 30;

/// Fetches the body of a remote URL.
pub trait Transport {
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        (**self).get(url)
    }
}

/// Blocking HTTP(S) transport backed by `ureq`.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl Default for HttpTransport {
    fn default() -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(TIMEOUT_SECS)))
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => Error::fetch(url, format!("HTTP {code}")),
                other => Error::fetch(url, other),
            })?;

        let mut data = Vec::new();
        response
            .into_body()
            .into_reader()
            .read_to_end(&mut data)
            .map_err(|e| Error::fetch(url, e))?;
        Ok(data)
    }
}

/// In-memory transport serving a fixed set of URLs.
///
/// Records every request so callers can check what was fetched. An empty one
/// backs `--offline` runs, where every http(s) fetch fails and only local
/// paths resolve.
#[derive(Default)]
pub struct MemoryTransport {
    files: RefCell<HashMap<String, Vec<u8>>>,
    requests: RefCell<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`, replacing any previous body.
    pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(url.into(), body.into());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl Transport for MemoryTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.borrow_mut().push(url.to_string());
        self.files
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::fetch(url, "not available offline"))
    }
}
