//! Locator resolution.
//!
//! Turns the locator written in `pyvend.toml` into a URI the downloaders can
//! fetch directly. Repository web links are rewritten to their raw-content
//! equivalent; anything unrecognized is passed through untouched.
//!
//! ```text
//! https://github.com/acme/lib/blob/main/foo.py
//!   -> https://raw.githubusercontent.com/acme/lib/main/foo.py
//! ```

use crate::error::{Error, Result};
use ureq::http::Uri;

pub const GITHUB_HOST: &str = "github.com";
pub const GITHUB_RAW_HOST: &str = "raw.githubusercontent.com";

/// Rewrites locators for one hosting service.
///
/// `Ok(None)` means the locator is not for this host and the next rewriter
/// should be tried.
pub trait HostRewriter {
    fn rewrite(&self, host: &str, path: &str, locator: &str) -> Result<Option<String>>;
}

/// `github.com/<user>/<project>/<mode>/<branch>/<path>` and raw-content links.
pub struct GitHub;

impl HostRewriter for GitHub {
    fn rewrite(&self, host: &str, path: &str, locator: &str) -> Result<Option<String>> {
        match host {
            GITHUB_HOST => {
                // Leading '/' yields an empty first segment.
                let segments: Vec<&str> = path.split('/').skip(1).collect();
                if segments.len() < 4 {
                    return Err(Error::MalformedLocator {
                        host: GITHUB_HOST,
                        locator: locator.to_string(),
                        reason: "expected /<user>/<project>/<mode>/<branch>/<path>".to_string(),
                    });
                }
                let (user, project, branch) = (segments[0], segments[1], segments[3]);
                let rest = segments[4..].join("/");
                Ok(Some(format!(
                    "https://{GITHUB_RAW_HOST}/{user}/{project}/{branch}/{rest}"
                )))
            }
            GITHUB_RAW_HOST => Ok(Some(format!("https://{GITHUB_RAW_HOST}{path}"))),
            _ => Ok(None),
        }
    }
}

/// Ordered set of host rewriters. The first one that matches wins.
pub struct Resolver {
    rewriters: Vec<Box<dyn HostRewriter>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            rewriters: vec![Box::new(GitHub)],
        }
    }
}

impl Resolver {
    pub fn empty() -> Self {
        Self {
            rewriters: Vec::new(),
        }
    }

    pub fn register(&mut self, rewriter: impl HostRewriter + 'static) {
        self.rewriters.push(Box::new(rewriter));
    }

    /// Resolve `locator` into a fetchable URI.
    ///
    /// Only a malformed locator for a recognized host is an error; locators
    /// that do not parse as URIs or match no rewriter come back verbatim.
    pub fn resolve(&self, locator: &str) -> Result<String> {
        let Ok(uri) = locator.parse::<Uri>() else {
            return Ok(locator.to_string());
        };
        let Some(host) = uri.host() else {
            return Ok(locator.to_string());
        };
        let host = strip_www(host);

        for rewriter in &self.rewriters {
            if let Some(resolved) = rewriter.rewrite(host, uri.path(), locator)? {
                return Ok(resolved);
            }
        }

        Ok(locator.to_string())
    }
}

/// Resolve with the default set of rewriters.
pub fn resolve(locator: &str) -> Result<String> {
    Resolver::default().resolve(locator)
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
