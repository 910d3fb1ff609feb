//! Error types for pyvend.
//!
//! Configuration problems are raised while the manifest is turned into
//! groups, before anything touches the network. Everything else is scoped
//! to a single package and ends up as a failed status in the report.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A dependency declaration has a shape pyvend does not support.
    #[error("unsupported declaration for '{package}': {reason}")]
    UnsupportedDeclaration { package: String, reason: String },

    /// Optional groups are declared in the manifest schema but not supported.
    #[error("group '{0}' is marked optional; optional groups are not supported yet")]
    OptionalGroup(String),

    /// A package was requested that the group does not declare.
    #[error("package '{package}' is not declared in group '{group}'")]
    UnknownPackage { group: String, package: String },

    /// A group or package name cannot be used as its cache folder name.
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    /// Single-file mode only handles locators naming one script file.
    #[error("'{package}' cannot be fetched as a single file: {reason}")]
    NotSingleFile { package: String, reason: String },

    #[error("no pyvend.toml found in {} or any parent directory", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("invalid manifest {}: {reason}", .path.display())]
    InvalidManifest { path: PathBuf, reason: String },

    /// A locator for a recognized host does not have the expected shape.
    #[error("malformed {host} locator '{locator}': {reason}")]
    MalformedLocator {
        host: &'static str,
        locator: String,
        reason: String,
    },

    #[error("failed to fetch {uri}: {reason}")]
    Fetch { uri: String, reason: String },

    /// A staged script file did not parse.
    #[error("invalid Python in {}: {message}", .path.display())]
    Validation { path: PathBuf, message: String },

    #[error("failed to sync into {}: {reason}", .dest.display())]
    Sync { dest: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn fetch(uri: &str, reason: impl ToString) -> Self {
        Error::Fetch {
            uri: uri.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors raised while reading configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedDeclaration { .. }
                | Error::OptionalGroup(_)
                | Error::UnknownPackage { .. }
                | Error::InvalidName { .. }
                | Error::ManifestNotFound(_)
                | Error::InvalidManifest { .. }
        )
    }
}
