//! Project manifest (`pyvend.toml`) parsing.
//!
//! ```toml
//! [project]
//! name = "blinky"
//! dependencies_path = ".pyvend/dependencies"
//!
//! [dependencies]
//! foo = "https://github.com/acme/lib/blob/main/foo.py"
//!
//! [group.dev.dependencies]
//! bar = { remote = "https://example.com/bar.py" }
//! ```
//!
//! The top-level `[dependencies]` table is the `main` group.

use crate::error::{Error, Result};
use crate::group::{Group, MAIN_GROUP};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "pyvend.toml";
pub const DEFAULT_DEPENDENCIES_PATH: &str = ".pyvend/dependencies";

#[derive(Deserialize, Debug, Default)]
pub struct Manifest {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub dependencies: toml::Table,
    /// `[group.<name>]` tables, kept raw so declaration order survives.
    #[serde(default)]
    pub group: toml::Table,
}

#[derive(Deserialize, Debug, Default)]
pub struct ProjectConfig {
    pub name: Option<String>,
    pub dependencies_path: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct GroupConfig {
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub dependencies: toml::Table,
}

#[derive(Debug)]
pub struct Config {
    path: PathBuf,
    manifest: Manifest,
}

impl Config {
    /// Find `pyvend.toml` in the current directory or one of its parents.
    pub fn find() -> Result<Self> {
        Self::find_from(&std::env::current_dir()?)
    }

    pub fn find_from(start: &Path) -> Result<Self> {
        start
            .ancestors()
            .map(|dir| dir.join(MANIFEST_FILE))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| Error::ManifestNotFound(start.to_path_buf()))
            .and_then(|path| Self::load(&path))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    /// Parse manifest text; `path` locates the project root.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let manifest: Manifest = toml::from_str(text).map_err(|e| Error::InvalidManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            manifest,
        })
    }

    pub fn manifest_path(&self) -> &Path {
        &self.path
    }

    pub fn project_root(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn project_name(&self) -> &str {
        self.manifest
            .project
            .name
            .as_deref()
            .or_else(|| self.project_root().file_name().and_then(|n| n.to_str()))
            .unwrap_or("project")
    }

    pub fn dependencies_root(&self) -> PathBuf {
        let relative = self
            .manifest
            .project
            .dependencies_path
            .as_deref()
            .unwrap_or(DEFAULT_DEPENDENCIES_PATH);
        self.project_root().join(relative)
    }

    /// Build every group, `main` first, then `[group.*]` in manifest order.
    pub fn groups(&self) -> Result<Vec<Group>> {
        let root = self.dependencies_root();
        let mut main = GroupConfig {
            optional: false,
            dependencies: self.manifest.dependencies.clone(),
        };
        let mut others = Vec::new();

        for (name, value) in &self.manifest.group {
            let config: GroupConfig =
                value
                    .clone()
                    .try_into()
                    .map_err(|e: toml::de::Error| Error::InvalidManifest {
                        path: self.path.clone(),
                        reason: format!("group '{name}': {e}"),
                    })?;
            if name == MAIN_GROUP {
                main.optional = config.optional;
                main.dependencies.extend(config.dependencies);
            } else {
                others.push((name.clone(), config));
            }
        }

        std::iter::once((MAIN_GROUP.to_string(), main))
            .chain(others)
            .map(|(name, config)| Group::new(&name, config.optional, config.dependencies, &root))
            .collect()
    }

    pub fn group(&self, name: &str) -> Result<Group> {
        self.groups()?
            .into_iter()
            .find(|group| group.name() == name)
            .ok_or_else(|| Error::InvalidManifest {
                path: self.path.clone(),
                reason: format!("no group named '{name}'"),
            })
    }
}
