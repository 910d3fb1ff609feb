//! The fallback downloader.
//!
//! Runs after every registered strategy has declined and never declines
//! itself: it either materializes the URI or fails with a fetch error.

use super::transport::Transport;
use crate::error::{Error, Result};
use crate::fsutil::copy_dir_all;
use std::fs;
use std::path::{Path, PathBuf};
use ureq::http::Uri;

/// What a URI points at, decided before anything is fetched.
#[derive(Debug, PartialEq, Eq)]
enum Target {
    /// A single remote file and its file name.
    RemoteFile { name: String },
    LocalFile(PathBuf),
    LocalDir(PathBuf),
}

pub struct Generic {
    transport: Box<dyn Transport>,
}

impl Generic {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    /// Fetch `uri` into `dst`.
    ///
    /// A single file lands at `dst/<basename>` and that path is returned; a
    /// directory is merged into `dst` and `dst` is returned.
    pub fn fetch(&self, dst: &Path, uri: &str) -> Result<PathBuf> {
        fs::create_dir_all(dst)?;

        match probe(uri)? {
            Target::RemoteFile { name } => {
                let data = self.transport.get(uri)?;
                let path = dst.join(name);
                fs::write(&path, data)?;
                Ok(path)
            }
            Target::LocalFile(src) => {
                let name = src
                    .file_name()
                    .ok_or_else(|| Error::fetch(uri, "path has no file name"))?;
                let path = dst.join(name);
                fs::copy(&src, &path).map_err(|e| Error::fetch(uri, e))?;
                Ok(path)
            }
            Target::LocalDir(src) => {
                copy_dir_all(&src, dst).map_err(|e| Error::fetch(uri, e))?;
                Ok(dst.to_path_buf())
            }
        }
    }
}

fn probe(uri: &str) -> Result<Target> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        let parsed: Uri = uri.parse().map_err(|e| Error::fetch(uri, e))?;
        let name = parsed
            .path()
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::fetch(uri, "URL does not name a file"))?;
        return Ok(Target::RemoteFile {
            name: name.to_string(),
        });
    }

    let local = match uri.strip_prefix("file://") {
        Some(path) => PathBuf::from(path),
        None if uri.contains("://") => {
            return Err(Error::fetch(uri, "unsupported URI scheme"));
        }
        None => PathBuf::from(uri),
    };

    let metadata = fs::metadata(&local).map_err(|e| Error::fetch(uri, e))?;
    if metadata.is_dir() {
        Ok(Target::LocalDir(local))
    } else {
        Ok(Target::LocalFile(local))
    }
}
