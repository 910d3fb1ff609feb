//! Dependency groups and the update pipeline.
//!
//! A group is a named table of dependency declarations with one cache
//! folder, `<dependencies root>/<group name>`. Each package is updated by
//! staging a fresh download in a temporary directory, verifying it and
//! syncing it into `<group folder>/<package>`:
//!
//! ```text
//! locator -> resolve -> fetch (staging) -> verify -> sync (destination)
//! ```
//!
//! A failure at any step leaves that package's destination as it was and
//! does not stop the rest of the group.

use crate::download::Registry;
use crate::error::{Error, Result};
use crate::fsutil::{copy_dir_all, remove_path};
use crate::progress::Progress;
use crate::resolve::Resolver;
use crate::{sync, verify};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the group built from the top-level `[dependencies]` table.
pub const MAIN_GROUP: &str = "main";

/// A normalized dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// `foo = "https://..."`
    Plain(String),
    /// `foo = { remote = "https://..." }`
    Structured { remote: String },
}

impl Locator {
    /// Normalize a raw manifest value.
    ///
    /// Lists, tables with keys other than `remote`, and any other value type
    /// are rejected here rather than interpreted.
    pub fn from_value(package: &str, value: &toml::Value) -> Result<Self> {
        let unsupported = |reason: &str| Error::UnsupportedDeclaration {
            package: package.to_string(),
            reason: reason.to_string(),
        };

        match value {
            toml::Value::String(remote) => Ok(Locator::Plain(remote.clone())),
            toml::Value::Table(table) => {
                if let Some(key) = table.keys().find(|key| *key != "remote") {
                    return Err(unsupported(&format!("unknown field '{key}'")));
                }
                match table.get("remote") {
                    Some(toml::Value::String(remote)) => Ok(Locator::Structured {
                        remote: remote.clone(),
                    }),
                    Some(_) => Err(unsupported("'remote' must be a string")),
                    None => Err(unsupported("missing 'remote' field")),
                }
            }
            toml::Value::Array(_) => Err(unsupported("list dependencies are not supported")),
            other => Err(unsupported(&format!(
                "expected a string or table, found {}",
                other.type_str()
            ))),
        }
    }

    pub fn remote(&self) -> &str {
        match self {
            Locator::Plain(remote) => remote,
            Locator::Structured { remote } => remote,
        }
    }
}

/// Outcome of updating one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Updated,
    Unchanged,
    Failed(String),
}

/// Per-package statuses of one `download` call, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub group: String,
    pub entries: Vec<(String, Status)>,
}

impl Report {
    pub fn get(&self, package: &str) -> Option<&Status> {
        self.entries
            .iter()
            .find(|(name, _)| name == package)
            .map(|(_, status)| status)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, wanted: fn(&Status) -> bool) -> usize {
        self.entries.iter().filter(|(_, s)| wanted(s)).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(|s| matches!(s, Status::Failed(_))) > 0
    }
}

/// Resolver and downloader registry shared by every group in a run.
#[derive(Default)]
pub struct Fetcher {
    pub resolver: Resolver,
    pub registry: Registry,
}

impl Fetcher {
    pub fn new(resolver: Resolver, registry: Registry) -> Self {
        Self { resolver, registry }
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    name: String,
    dependencies: Vec<(String, Locator)>,
    folder: PathBuf,
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.dependencies == other.dependencies
    }
}

impl Eq for Group {}

impl Group {
    /// Build a group from raw manifest declarations.
    ///
    /// Optional groups and unsupported declarations are rejected here, before
    /// anything is downloaded.
    pub fn new<I>(name: &str, optional: bool, declarations: I, dependencies_root: &Path) -> Result<Self>
    where
        I: IntoIterator<Item = (String, toml::Value)>,
    {
        check_folder_name("group", name)?;
        if optional {
            return Err(Error::OptionalGroup(name.to_string()));
        }

        let mut dependencies = Vec::new();
        for (package, value) in declarations {
            check_folder_name("package", &package)?;
            let locator = Locator::from_value(&package, &value)?;
            dependencies.push((package, locator));
        }

        Ok(Self {
            name: name.to_string(),
            dependencies,
            folder: dependencies_root.join(name),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn dependencies(&self) -> &[(String, Locator)] {
        &self.dependencies
    }

    pub fn locator(&self, package: &str) -> Option<&Locator> {
        self.dependencies
            .iter()
            .find(|(name, _)| name == package)
            .map(|(_, locator)| locator)
    }

    /// Persistent destination folder of one package.
    pub fn package_folder(&self, package: &str) -> PathBuf {
        self.folder.join(package)
    }

    /// Update `packages` (all declared packages when `None`).
    ///
    /// Unknown package names are a configuration error and nothing is
    /// fetched. Per-package failures are reported in the [`Report`] and do
    /// not stop the batch.
    pub fn download(
        &self,
        fetcher: &Fetcher,
        packages: Option<&[String]>,
        progress: &dyn Progress,
    ) -> Result<Report> {
        let selected = self.select(packages)?;
        Ok(run_batch(&self.name, selected, progress, |package, locator| {
            self.update_package(fetcher, package, locator, progress)
        }))
    }

    /// Declared packages matching `packages`, in the order requested.
    pub(crate) fn select<'a>(
        &'a self,
        packages: Option<&'a [String]>,
    ) -> Result<Vec<(&'a str, &'a Locator)>> {
        match packages {
            None => Ok(self
                .dependencies
                .iter()
                .map(|(name, locator)| (name.as_str(), locator))
                .collect()),
            Some(names) => names
                .iter()
                .map(|name| {
                    self.locator(name)
                        .map(|locator| (name.as_str(), locator))
                        .ok_or_else(|| Error::UnknownPackage {
                            group: self.name.clone(),
                            package: name.clone(),
                        })
                })
                .collect(),
        }
    }

    fn update_package(
        &self,
        fetcher: &Fetcher,
        package: &str,
        locator: &Locator,
        progress: &dyn Progress,
    ) -> Result<bool> {
        // Removed on drop, whichever way this function returns.
        let staging = tempfile::Builder::new().prefix("pyvend-").tempdir()?;

        let uri = fetcher.resolver.resolve(locator.remote())?;
        progress.on_detail(package, &format!("resolved {uri}"));

        let fetched = fetcher.registry.fetch(staging.path(), &uri)?;
        progress.on_detail(package, &format!("staged {}", fetched.display()));

        verify::verify(staging.path())?;
        sync::sync(staging.path(), &self.package_folder(package))
    }

    /// Delete every entry in the group folder that is not a declared package.
    ///
    /// Returns the names removed, sorted.
    pub fn clean(&self) -> Result<Vec<String>> {
        if !self.folder.exists() {
            return Ok(Vec::new());
        }

        let declared: HashSet<&str> = self.dependencies.iter().map(|(n, _)| n.as_str()).collect();
        let mut removed = Vec::new();
        for entry in fs::read_dir(&self.folder)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if declared.contains(name.as_str()) {
                continue;
            }
            remove_path(&entry.path())?;
            removed.push(name);
        }
        removed.sort();
        Ok(removed)
    }

    /// Merge the group folder into `target`, leaving unrelated entries alone.
    pub fn copy_to(&self, target: &Path) -> Result<()> {
        if self.folder.exists() {
            copy_dir_all(&self.folder, target)?;
        }
        Ok(())
    }
}

/// Group and package names become single folder names under the cache, so
/// each one must name a distinct child of its parent.
fn check_folder_name(kind: &'static str, name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "empty"
    } else if name == "." || name == ".." {
        "reserved path component"
    } else if name.contains(['/', '\\']) {
        "contains a path separator"
    } else {
        return Ok(());
    };
    Err(Error::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    })
}

/// Run `update` for each selected package, reporting through `progress`.
///
/// `update` returns whether the package changed.
pub(crate) fn run_batch<F>(
    group: &str,
    selected: Vec<(&str, &Locator)>,
    progress: &dyn Progress,
    mut update: F,
) -> Report
where
    F: FnMut(&str, &Locator) -> Result<bool>,
{
    let mut report = Report {
        group: group.to_string(),
        entries: Vec::new(),
    };
    if selected.is_empty() {
        return report;
    }

    progress.on_group_start(group, selected.len());
    for (package, locator) in selected {
        progress.on_package_start(package);
        let status = match update(package, locator) {
            Ok(true) => {
                progress.on_package_updated(package);
                Status::Updated
            }
            Ok(false) => {
                progress.on_package_unchanged(package);
                Status::Unchanged
            }
            Err(e) => {
                progress.on_package_failed(package, &e);
                Status::Failed(e.to_string())
            }
        };
        report.entries.push((package.to_string(), status));
    }
    progress.on_group_finish(group);

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::MemoryTransport;
    use crate::progress::{self, Silent};
    use std::cell::RefCell;
    use std::rc::Rc;

    const FOO_URL: &str = "https://github.com/acme/lib/blob/main/foo.py";
    const FOO_RAW: &str = "https://raw.githubusercontent.com/acme/lib/main/foo.py";

    fn declarations(entries: &[(&str, toml::Value)]) -> Vec<(String, toml::Value)> {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn string(s: &str) -> toml::Value {
        toml::Value::String(s.to_string())
    }

    fn fetcher(transport: &Rc<MemoryTransport>) -> Fetcher {
        Fetcher::new(Resolver::default(), Registry::new(Rc::clone(transport)))
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<String>>);

    impl Progress for Recorder {
        fn on_package_start(&self, package: &str) {
            self.0.borrow_mut().push(progress::updating_line(package));
        }
        fn on_package_updated(&self, package: &str) {
            self.0.borrow_mut().push(progress::updated_line(package));
        }
        fn on_package_unchanged(&self, package: &str) {
            self.0.borrow_mut().push(progress::unchanged_line(package));
        }
        fn on_package_failed(&self, package: &str, _error: &Error) {
            self.0.borrow_mut().push(format!("{package}: Failed"));
        }
    }

    #[test]
    fn test_locator_normalization() {
        assert_eq!(
            Locator::from_value("foo", &string("https://x/foo.py")).unwrap(),
            Locator::Plain("https://x/foo.py".into())
        );

        let table: toml::Value = toml::from_str(r#"remote = "https://x/foo.py""#).unwrap();
        let locator = Locator::from_value("foo", &table).unwrap();
        assert_eq!(locator.remote(), "https://x/foo.py");
    }

    #[test]
    fn test_unsupported_declarations_rejected() {
        let list = toml::Value::Array(vec![string("a"), string("b")]);
        let extra: toml::Value = toml::from_str("remote = \"x\"\nbranch = \"dev\"").unwrap();
        let missing: toml::Value = toml::from_str("path = \"x\"").unwrap();
        for value in [list, extra, missing, toml::Value::Integer(3)] {
            let err = Locator::from_value("foo", &value).unwrap_err();
            assert!(matches!(err, Error::UnsupportedDeclaration { .. }));
        }
    }

    #[test]
    fn test_list_declaration_fails_before_network() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Rc::new(MemoryTransport::new());
        let result = Group::new(
            "main",
            false,
            declarations(&[
                ("foo", string(FOO_URL)),
                ("bar", toml::Value::Array(vec![string(FOO_URL)])),
            ]),
            tmp.path(),
        );

        assert!(matches!(result, Err(Error::UnsupportedDeclaration { .. })));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_optional_group_fails_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Group::new("dev", true, Vec::new(), tmp.path()).unwrap_err();
        assert!(matches!(err, Error::OptionalGroup(name) if name == "dev"));
    }

    #[test]
    fn test_names_must_be_single_folder_components() {
        let tmp = tempfile::tempdir().unwrap();
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            let err = Group::new(
                "main",
                false,
                declarations(&[("ok", string(FOO_URL)), (bad, string(FOO_URL))]),
                tmp.path(),
            )
            .unwrap_err();
            assert!(
                matches!(&err, Error::InvalidName { kind: "package", name, .. } if name == bad),
                "{bad:?}: {err}"
            );

            let err = Group::new(bad, false, Vec::new(), tmp.path()).unwrap_err();
            assert!(
                matches!(&err, Error::InvalidName { kind: "group", .. }),
                "{bad:?}: {err}"
            );
        }
        assert!(Group::new("main", false, declarations(&[("..a", string(FOO_URL))]), tmp.path()).is_ok());
    }

    #[test]
    fn test_empty_package_name_cannot_replace_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Rc::new(MemoryTransport::new());
        transport.insert("https://e.com/a.py", "a = 1\n");
        transport.insert("https://e.com/evil.py", "evil = 1\n");
        let good =
            Group::new("main", false, declarations(&[("a", string("https://e.com/a.py"))]), tmp.path())
                .unwrap();
        good.download(&fetcher(&transport), None, &Silent).unwrap();

        let result = Group::new(
            "main",
            false,
            declarations(&[
                ("a", string("https://e.com/a.py")),
                ("", string("https://e.com/evil.py")),
            ]),
            tmp.path(),
        );

        assert!(matches!(result, Err(Error::InvalidName { .. })));
        assert_eq!(transport.requests(), vec!["https://e.com/a.py"]);
        assert!(good.package_folder("a").join("a.py").is_file());
    }

    #[test]
    fn test_group_folder_and_equality() {
        let tmp = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let decl = declarations(&[("foo", string(FOO_URL))]);
        let a = Group::new("main", false, decl.clone(), tmp.path()).unwrap();
        let b = Group::new("main", false, decl, other.path()).unwrap();

        assert_eq!(a.folder(), tmp.path().join("main"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_download_then_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Rc::new(MemoryTransport::new());
        transport.insert(FOO_RAW, "def foo():\n    return 1\n");
        let fetcher = fetcher(&transport);
        let group =
            Group::new("main", false, declarations(&[("foo", string(FOO_URL))]), tmp.path()).unwrap();
        let recorder = Recorder::default();

        let first = group.download(&fetcher, None, &recorder).unwrap();
        assert_eq!(first.get("foo"), Some(&Status::Updated));
        let dest = tmp.path().join("main").join("foo").join("foo.py");
        assert_eq!(fs::read_to_string(&dest).unwrap(), "def foo():\n    return 1\n");
        let modified = fs::metadata(&dest).unwrap().modified().unwrap();

        let second = group.download(&fetcher, None, &recorder).unwrap();
        assert_eq!(second.get("foo"), Some(&Status::Unchanged));
        assert_eq!(fs::metadata(&dest).unwrap().modified().unwrap(), modified);

        assert_eq!(transport.requests(), vec![FOO_RAW, FOO_RAW]);
        assert_eq!(
            *recorder.0.borrow(),
            vec![
                "foo: Updating...",
                "foo: Updated.",
                "foo: Updating...",
                "foo: No changes detected."
            ]
        );
    }

    #[test]
    fn test_invalid_script_leaves_destination_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Rc::new(MemoryTransport::new());
        transport.insert(FOO_RAW, "x = 1\n");
        let fetcher = fetcher(&transport);
        let group =
            Group::new("main", false, declarations(&[("foo", string(FOO_URL))]), tmp.path()).unwrap();
        group.download(&fetcher, None, &Silent).unwrap();

        transport.insert(FOO_RAW, "<html><body>502 Bad Gateway</body></html>");
        let report = group.download(&fetcher, None, &Silent).unwrap();

        assert!(matches!(report.get("foo"), Some(Status::Failed(_))));
        let dest = tmp.path().join("main").join("foo").join("foo.py");
        assert_eq!(fs::read_to_string(dest).unwrap(), "x = 1\n");
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Rc::new(MemoryTransport::new());
        transport.insert("https://example.com/good.py", "ok = True\n");
        let fetcher = fetcher(&transport);
        let group = Group::new(
            "main",
            false,
            declarations(&[
                ("missing", string("https://example.com/missing.py")),
                ("malformed", string("https://github.com/acme")),
                ("good", string("https://example.com/good.py")),
            ]),
            tmp.path(),
        )
        .unwrap();

        let report = group.download(&fetcher, None, &Silent).unwrap();

        let names: Vec<&str> = report.entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["missing", "malformed", "good"]);
        assert!(matches!(report.get("missing"), Some(Status::Failed(_))));
        assert!(matches!(report.get("malformed"), Some(Status::Failed(_))));
        assert_eq!(report.get("good"), Some(&Status::Updated));
        assert!(report.has_failures());
        assert!(!tmp.path().join("main").join("missing").exists());
    }

    #[test]
    fn test_package_subset_selection() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Rc::new(MemoryTransport::new());
        transport.insert("https://example.com/a.py", "a = 1\n");
        transport.insert("https://example.com/b.py", "b = 1\n");
        let fetcher = fetcher(&transport);
        let group = Group::new(
            "main",
            false,
            declarations(&[
                ("a", string("https://example.com/a.py")),
                ("b", string("https://example.com/b.py")),
            ]),
            tmp.path(),
        )
        .unwrap();

        let empty = group.download(&fetcher, Some(&[][..]), &Silent).unwrap();
        assert!(empty.is_empty());
        assert!(transport.requests().is_empty());

        let only_b = group
            .download(&fetcher, Some(&["b".to_string()][..]), &Silent)
            .unwrap();
        assert_eq!(only_b.entries.len(), 1);
        assert_eq!(transport.requests(), vec!["https://example.com/b.py"]);

        let err = group
            .download(&fetcher, Some(&["nope".to_string()][..]), &Silent)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownPackage { .. }));
    }

    #[test]
    fn test_clean_removes_undeclared() {
        let tmp = tempfile::tempdir().unwrap();
        let group = Group::new(
            "main",
            false,
            declarations(&[("foo", string(FOO_URL)), ("bar", string(FOO_URL))]),
            tmp.path(),
        )
        .unwrap();
        for name in ["foo", "bar", "baz"] {
            fs::create_dir_all(group.package_folder(name)).unwrap();
            fs::write(group.package_folder(name).join("x.py"), "x = 1\n").unwrap();
        }
        fs::write(group.folder().join("stray.py"), "").unwrap();

        let removed = group.clean().unwrap();

        assert_eq!(removed, vec!["baz", "stray.py"]);
        assert!(group.package_folder("foo").join("x.py").exists());
        assert!(group.package_folder("bar").join("x.py").exists());
        assert!(!group.package_folder("baz").exists());
    }

    #[test]
    fn test_clean_without_folder_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let group = Group::new("main", false, Vec::new(), tmp.path()).unwrap();
        assert!(group.clean().unwrap().is_empty());
    }

    #[test]
    fn test_copy_to_merges() {
        let tmp = tempfile::tempdir().unwrap();
        let group =
            Group::new("main", false, declarations(&[("foo", string(FOO_URL))]), tmp.path()).unwrap();
        fs::create_dir_all(group.package_folder("foo")).unwrap();
        fs::write(group.package_folder("foo").join("foo.py"), "x = 1\n").unwrap();
        let target = tmp.path().join("device");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("main.py"), "import foo\n").unwrap();

        group.copy_to(&target).unwrap();

        assert!(target.join("foo").join("foo.py").exists());
        assert_eq!(fs::read_to_string(target.join("main.py")).unwrap(), "import foo\n");
    }
}
