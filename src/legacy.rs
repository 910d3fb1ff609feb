//! Single-file dependency mode.
//!
//! The flat layout used before per-group folders existed: every dependency
//! is one `.py` module stored as `<local dir>/<package>.py`. The file is only
//! rewritten when the fetched text differs from what is already there.

use crate::error::{Error, Result};
use crate::group::{Fetcher, Group, Locator, Report, run_batch};
use crate::progress::Progress;
use crate::verify::{SCRIPT_EXTENSION, check_source, is_script};
use std::fs;
use std::path::Path;

/// Default target of single-file mode, relative to the project root.
pub const DEFAULT_LOCAL_DIR: &str = ".pyvend-lib";

/// Download `packages` of `group` (all when `None`) as single files into
/// `local_dir`.
pub fn download_single_files(
    group: &Group,
    local_dir: &Path,
    fetcher: &Fetcher,
    packages: Option<&[String]>,
    progress: &dyn Progress,
) -> Result<Report> {
    let selected = group.select(packages)?;
    Ok(run_batch(group.name(), selected, progress, |package, locator| {
        update_single_file(package, locator, local_dir, fetcher, progress)
    }))
}

fn update_single_file(
    package: &str,
    locator: &Locator,
    local_dir: &Path,
    fetcher: &Fetcher,
    progress: &dyn Progress,
) -> Result<bool> {
    let uri = fetcher.resolver.resolve(locator.remote())?;
    let remote_name = uri.split(['?', '#']).next().unwrap_or(&uri);
    if !is_script(Path::new(remote_name)) {
        return Err(Error::NotSingleFile {
            package: package.to_string(),
            reason: format!("{uri} is not a .{SCRIPT_EXTENSION} file"),
        });
    }
    progress.on_detail(package, &format!("resolved {uri}"));

    let staging = tempfile::Builder::new().prefix("pyvend-").tempdir()?;
    let fetched = fetcher.registry.fetch(staging.path(), &uri)?;
    if !fetched.is_file() {
        return Err(Error::NotSingleFile {
            package: package.to_string(),
            reason: format!("{uri} is a directory"),
        });
    }
    let new_code = fs::read_to_string(&fetched).map_err(|e| Error::Validation {
        path: fetched.clone(),
        message: e.to_string(),
    })?;
    check_source(&new_code, &fetched)?;

    let dst = local_dir.join(format!("{package}.{SCRIPT_EXTENSION}"));
    let old_code = match fs::read_to_string(&dst) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if new_code == old_code {
        return Ok(false);
    }

    fs::create_dir_all(local_dir)?;
    fs::write(&dst, new_code)?;
    Ok(true)
}
