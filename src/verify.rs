//! Sanity checks for staged downloads.
//!
//! Every `.py` file under the staged path must parse as Python. One bad file
//! rejects the whole package: truncated downloads and HTML error pages served
//! with a 200 never reach the dependency cache.

use crate::error::{Error, Result};
use rustpython_parser::{Parse, ast};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

pub const SCRIPT_EXTENSION: &str = "py";

/// Verify every script file under `staged`, which may be a directory or a
/// single file.
pub fn verify(staged: &Path) -> Result<()> {
    for entry in WalkDir::new(staged) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_script(path) {
            continue;
        }

        let code = fs::read_to_string(path).map_err(|e| Error::Validation {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        check_source(&code, path)?;
    }
    Ok(())
}

/// Syntax-only parse of `code`; `path` is used for error reporting.
pub fn check_source(code: &str, path: &Path) -> Result<()> {
    ast::Suite::parse(code, &path.to_string_lossy())
        .map(|_| ())
        .map_err(|e| Error::Validation {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

pub fn is_script(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "import machine\n\ndef blink(pin):\n    machine.Pin(pin).toggle()\n";
    const HTML: &str = "<!DOCTYPE html>\n<html><body>404: Not Found</body></html>\n";

    #[test]
    fn test_valid_tree_passes() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("pkg")).unwrap();
        fs::write(tmp.path().join("pkg").join("__init__.py"), VALID).unwrap();
        fs::write(tmp.path().join("README.md"), "# not python {").unwrap();

        verify(tmp.path()).unwrap();
    }

    #[test]
    fn test_one_bad_file_rejects_all() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("good.py"), VALID).unwrap();
        fs::create_dir_all(tmp.path().join("nested")).unwrap();
        fs::write(tmp.path().join("nested").join("bad.py"), HTML).unwrap();

        let err = verify(tmp.path()).unwrap_err();
        match err {
            Error::Validation { path, .. } => assert!(path.ends_with("nested/bad.py")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncated_source_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("cut.py");
        fs::write(&file, "def f(a, b:\n    return (a +").unwrap();

        assert!(verify(&file).is_err());
    }

    #[test]
    fn test_single_file_root() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("ok.py");
        fs::write(&file, VALID).unwrap();

        verify(&file).unwrap();
    }

    #[test]
    fn test_non_script_files_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("data.json"), HTML).unwrap();
        fs::write(tmp.path().join("py"), HTML).unwrap();

        verify(tmp.path()).unwrap();
    }
}
