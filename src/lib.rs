//! # pyvend - Remote Python Source Dependencies
//!
//! pyvend mirrors small remote Python modules (typically MicroPython
//! libraries) into a per-project cache and keeps that cache in step with
//! `pyvend.toml`.
//!
//! ## Features
//!
//! - **Repository links**: GitHub `blob` links are rewritten to raw content
//! - **Pluggable downloaders**: registered strategies first, generic fallback last
//! - **Verified**: every staged `.py` file must parse before it is accepted
//! - **Minimal churn**: only files whose bytes changed are rewritten
//!
//! ## Quick Start
//!
//! ```bash
//! # Fetch everything declared in pyvend.toml
//! pyvend update
//!
//! # Copy the cache onto a device image
//! pyvend vendor build/device
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Manifest parsing (`pyvend.toml`)
//! - [`group`] - Groups and the update pipeline
//! - [`resolve`] - Locator rewriting
//! - [`download`] - Downloader registry
//! - [`verify`] - Staged artifact checks
//! - [`sync`] - Directory mirroring

/// Dependency cache inspection.
pub mod cache;

/// Manifest parsing (`pyvend.toml`).
pub mod config;

/// Downloader registry and transports.
pub mod download;

/// Error types.
pub mod error;

mod fsutil;

/// Dependency groups and the update pipeline.
pub mod group;

/// Flat single-file dependency mode.
pub mod legacy;

/// Progress reporting.
pub mod progress;

/// Locator resolution.
pub mod resolve;

/// Directory mirroring.
pub mod sync;

/// Dependency tree visualization.
pub mod tree;

/// Staged artifact verification.
pub mod verify;

pub use error::{Error, Result};
