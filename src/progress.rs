//! Progress reporting for dependency updates.
//!
//! Group operations report through a [`Progress`] observer. [`Silent`] drops
//! everything; [`ConsoleProgress`] shows a spinner while a group updates and
//! prints one coloured line per event:
//!
//! ```text
//! foo: Updating...
//! foo: Updated.
//! bar: No changes detected.
//! ```

use crate::error::Error;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::time::Duration;

pub trait Progress {
    fn on_group_start(&self, _group: &str, _packages: usize) {}
    fn on_package_start(&self, _package: &str) {}
    /// Extra per-step information, only shown in verbose mode.
    fn on_detail(&self, _package: &str, _message: &str) {}
    fn on_package_updated(&self, _package: &str) {}
    fn on_package_unchanged(&self, _package: &str) {}
    fn on_package_failed(&self, _package: &str, _error: &Error) {}
    fn on_group_finish(&self, _group: &str) {}
}

/// Reports nothing.
pub struct Silent;

impl Progress for Silent {}

pub fn updating_line(package: &str) -> String {
    format!("{package}: Updating...")
}

pub fn updated_line(package: &str) -> String {
    format!("{package}: Updated.")
}

pub fn unchanged_line(package: &str) -> String {
    format!("{package}: No changes detected.")
}

pub fn failed_line(package: &str, error: &Error) -> String {
    format!("{package}: Failed: {error}")
}

pub struct ConsoleProgress {
    verbose: bool,
    spinner: RefCell<Option<ProgressBar>>,
}

impl ConsoleProgress {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            spinner: RefCell::new(None),
        }
    }

    fn line(&self, text: String) {
        // A hidden bar (stdout not a terminal) swallows println.
        match self.spinner.borrow().as_ref() {
            Some(pb) if !pb.is_hidden() => pb.println(text),
            _ => println!("{}", text),
        }
    }
}

impl Progress for ConsoleProgress {
    fn on_group_start(&self, group: &str, packages: usize) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷"),
        );
        pb.set_message(format!(
            "{} ({} packages)",
            format!("Updating dependencies [{}]", group).bold().green(),
            packages
        ));
        pb.enable_steady_tick(Duration::from_millis(100));
        *self.spinner.borrow_mut() = Some(pb);
    }

    fn on_package_start(&self, package: &str) {
        self.line(updating_line(package));
    }

    fn on_detail(&self, package: &str, message: &str) {
        if self.verbose {
            self.line(format!("   {} {}: {}", "·".dimmed(), package, message.dimmed()));
        }
    }

    fn on_package_updated(&self, package: &str) {
        self.line(updated_line(package).bold().green().to_string());
    }

    fn on_package_unchanged(&self, package: &str) {
        self.line(unchanged_line(package));
    }

    fn on_package_failed(&self, package: &str, error: &Error) {
        self.line(failed_line(package, error).red().to_string());
    }

    fn on_group_finish(&self, _group: &str) {
        if let Some(pb) = self.spinner.borrow_mut().take() {
            pb.finish_and_clear();
        }
    }
}
