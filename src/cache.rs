//! Dependency cache inspection.
//!
//! The cache lives under the project's dependencies root, one folder per
//! group and one subfolder per package.
//!
//! ## Commands
//!
//! - `pyvend cache path` - Print the dependencies root
//! - `pyvend cache ls` - List cached packages per group
//! - `pyvend cache clean` - Remove the whole dependencies root

use crate::config::Config;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

pub fn print_path(config: &Config) -> Result<()> {
    println!("{}", config.dependencies_root().display());
    Ok(())
}

/// Cached entries of each group folder, sorted by group then name.
pub fn cached_entries(root: &Path) -> Result<Vec<(String, Vec<String>)>> {
    let mut groups = Vec::new();
    if !root.exists() {
        return Ok(groups);
    }

    for entry in fs::read_dir(root).with_context(|| format!("Failed to read {}", root.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let mut packages: Vec<String> = fs::read_dir(entry.path())?
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        packages.sort();
        groups.push((entry.file_name().to_string_lossy().to_string(), packages));
    }
    groups.sort();
    Ok(groups)
}

pub fn list(config: &Config) -> Result<()> {
    let groups = cached_entries(&config.dependencies_root())?;
    if groups.is_empty() {
        println!("{} Cache is empty.", "ℹ".blue());
        return Ok(());
    }

    for (group, packages) in groups {
        println!("{} {}", "▸".cyan(), group.bold());
        if packages.is_empty() {
            println!("    {}", "(empty)".dimmed());
        }
        for package in packages {
            println!("    {}", package);
        }
    }
    Ok(())
}

pub fn clean(config: &Config) -> Result<()> {
    let root = config.dependencies_root();
    if root.exists() {
        println!("{} Cleaning cache...", "🧹".yellow());
        fs::remove_dir_all(&root).context("Failed to remove dependencies folder")?;
        println!("{} Cache cleaned.", "✓".green());
    } else {
        println!("{} Cache already empty.", "✓".green());
    }
    Ok(())
}
