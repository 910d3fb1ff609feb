//! Dependency tree visualization.
//!
//! This module provides the `pyvend tree` command which displays the declared
//! groups and their packages.
//!
//! ## Example Output
//!
//! ```text
//! blinky
//! ├── main
//! │   ├── foo ✓ (https://github.com/acme/lib/blob/main/foo.py)
//! │   └── bar (https://example.com/bar.py)
//! └── dev
//!     └── shim (https://example.com/shim.py)
//! ```

use crate::group::Group;
use colored::*;

/// Render the tree as plain lines. Packages already cached get a `✓`.
pub fn render(project: &str, groups: &[Group]) -> Vec<String> {
    let mut lines = vec![project.to_string()];

    for (gi, group) in groups.iter().enumerate() {
        let last_group = gi == groups.len() - 1;
        let (branch, indent) = if last_group {
            ("└──", "    ")
        } else {
            ("├──", "│   ")
        };
        lines.push(format!("{} {}", branch, group.name()));

        let deps = group.dependencies();
        for (i, (name, locator)) in deps.iter().enumerate() {
            let prefix = if i == deps.len() - 1 { "└──" } else { "├──" };
            let cached = if group.package_folder(name).exists() {
                " ✓"
            } else {
                ""
            };
            lines.push(format!(
                "{}{} {}{} ({})",
                indent,
                prefix,
                name,
                cached,
                locator.remote()
            ));
        }
    }

    lines
}

pub fn print_tree(project: &str, groups: &[Group]) {
    let lines = render(project, groups);
    if let Some((root, rest)) = lines.split_first() {
        println!("{}", root.bold().cyan());
        for line in rest {
            println!("{}", line);
        }
    }
    if groups.iter().all(|g| g.dependencies().is_empty()) {
        println!("{}", "(no dependencies)".dimmed());
    }
}
