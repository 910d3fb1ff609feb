//! Mirror a staged directory into a persistent destination.
//!
//! [`sync`] makes `dest` hold exactly the files of `src`. Files whose bytes
//! already match are left alone so their timestamps do not churn. Every file
//! that gets overwritten or removed is backed up first; if any step fails the
//! destination is rolled back to what it was before the call.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Relative paths of the files and directories below a root.
#[derive(Default)]
struct Listing {
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
}

impl Listing {
    fn scan(root: &Path) -> Result<Self> {
        let mut listing = Listing::default();
        if !root.exists() {
            return Ok(listing);
        }
        for entry in WalkDir::new(root).min_depth(1) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| Error::Io(std::io::Error::other(e)))?
                .to_path_buf();
            if entry.file_type().is_dir() {
                listing.dirs.insert(rel);
            } else {
                listing.files.insert(rel);
            }
        }
        Ok(listing)
    }
}

/// Changes needed to turn `dest` into a mirror of `src`.
#[derive(Debug, Default)]
struct Plan {
    remove_files: Vec<PathBuf>,
    /// Deepest first.
    remove_dirs: Vec<PathBuf>,
    write_files: Vec<PathBuf>,
}

impl Plan {
    fn build(src: &Path, dest: &Path) -> Result<Self> {
        let source = Listing::scan(src)?;
        let existing = Listing::scan(dest)?;
        let mut plan = Plan::default();

        for rel in &existing.files {
            if !source.files.contains(rel) {
                plan.remove_files.push(rel.clone());
            }
        }

        let mut stale_dirs: Vec<PathBuf> = existing
            .dirs
            .iter()
            .filter(|rel| !source.dirs.contains(*rel))
            .cloned()
            .collect();
        stale_dirs.sort_by_key(|rel| std::cmp::Reverse(rel.components().count()));
        plan.remove_dirs = stale_dirs;

        for rel in &source.files {
            if !existing.files.contains(rel) || !same_contents(&src.join(rel), &dest.join(rel))? {
                plan.write_files.push(rel.clone());
            }
        }

        Ok(plan)
    }

    fn is_empty(&self) -> bool {
        self.remove_files.is_empty() && self.remove_dirs.is_empty() && self.write_files.is_empty()
    }
}

fn same_contents(a: &Path, b: &Path) -> Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}

/// Record of applied changes, enough to put `dest` back.
struct Journal<'a> {
    dest: &'a Path,
    backup: TempDir,
    backed_up: Vec<PathBuf>,
    created_files: Vec<PathBuf>,
    created_dirs: Vec<PathBuf>,
    removed_dirs: Vec<PathBuf>,
}

impl<'a> Journal<'a> {
    fn new(dest: &'a Path) -> Result<Self> {
        Ok(Self {
            dest,
            backup: TempDir::new()?,
            backed_up: Vec::new(),
            created_files: Vec::new(),
            created_dirs: Vec::new(),
            removed_dirs: Vec::new(),
        })
    }

    fn save(&mut self, rel: &Path) -> Result<()> {
        let saved = self.backup.path().join(rel);
        if let Some(parent) = saved.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(self.dest.join(rel), saved)?;
        self.backed_up.push(rel.to_path_buf());
        Ok(())
    }

    fn remove_file(&mut self, rel: &Path) -> Result<()> {
        self.save(rel)?;
        fs::remove_file(self.dest.join(rel))?;
        Ok(())
    }

    fn remove_dir(&mut self, rel: &Path) -> Result<()> {
        fs::remove_dir(self.dest.join(rel))?;
        self.removed_dirs.push(rel.to_path_buf());
        Ok(())
    }

    fn write_file(&mut self, src: &Path, rel: &Path) -> Result<()> {
        let target = self.dest.join(rel);
        if target.is_file() {
            self.save(rel)?;
        } else {
            self.create_parents(rel)?;
            self.created_files.push(rel.to_path_buf());
        }

        // Copy next to the target and rename so readers never see half a file.
        let partial = target.with_file_name(format!(
            ".{}.pyvend-partial",
            target
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default()
        ));
        fs::copy(src.join(rel), &partial)?;
        if let Err(e) = fs::rename(&partial, &target) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }
        Ok(())
    }

    fn create_parents(&mut self, rel: &Path) -> Result<()> {
        let mut missing = Vec::new();
        let mut current = rel.parent();
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() || self.dest.join(dir).is_dir() {
                break;
            }
            missing.push(dir.to_path_buf());
            current = dir.parent();
        }
        for dir in missing.into_iter().rev() {
            fs::create_dir(self.dest.join(&dir))?;
            self.created_dirs.push(dir);
        }
        Ok(())
    }

    /// Best-effort restore of everything this journal touched.
    fn rollback(self) {
        for rel in self.created_files.iter().rev() {
            let _ = fs::remove_file(self.dest.join(rel));
        }
        for rel in self.created_dirs.iter().rev() {
            let _ = fs::remove_dir(self.dest.join(rel));
        }
        for rel in self.removed_dirs.iter().rev() {
            let _ = fs::create_dir_all(self.dest.join(rel));
        }
        for rel in &self.backed_up {
            let target = self.dest.join(rel);
            if let Some(parent) = target.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let _ = fs::copy(self.backup.path().join(rel), target);
        }
    }
}

/// Make `dest` an exact mirror of `src`.
///
/// Returns `true` if anything in `dest` changed. `dest` is created if it does
/// not exist yet.
pub fn sync(src: &Path, dest: &Path) -> Result<bool> {
    if !src.is_dir() {
        return Err(Error::Sync {
            dest: dest.to_path_buf(),
            reason: format!("source {} is not a directory", src.display()),
        });
    }
    fs::create_dir_all(dest)?;

    let plan = Plan::build(src, dest).map_err(|e| wrap(dest, e))?;
    if plan.is_empty() {
        return Ok(false);
    }

    let mut journal = Journal::new(dest)?;
    match apply(&plan, src, &mut journal) {
        Ok(()) => Ok(true),
        Err(e) => {
            journal.rollback();
            Err(wrap(dest, e))
        }
    }
}

fn apply(plan: &Plan, src: &Path, journal: &mut Journal<'_>) -> Result<()> {
    for rel in &plan.remove_files {
        journal.remove_file(rel)?;
    }
    for rel in &plan.remove_dirs {
        journal.remove_dir(rel)?;
    }
    for rel in &plan.write_files {
        journal.write_file(src, rel)?;
    }
    Ok(())
}

fn wrap(dest: &Path, err: Error) -> Error {
    match err {
        Error::Sync { .. } => err,
        other => Error::Sync {
            dest: dest.to_path_buf(),
            reason: other.to_string(),
        },
    }
}
