//! # pyvend CLI Entry Point
//!
//! This is the main executable for the `pyvend` command-line tool.
//! It parses CLI arguments using clap and routes commands to the library.
//!
//! ## Command Structure
//!
//! - **Sync**: `update`, `clean`, `fetch-single`
//! - **Deploy**: `vendor`
//! - **Inspect**: `tree`, `cache`
//! - **Shell**: `completion`

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::path::PathBuf;

use pyvend::cache;
use pyvend::config::Config;
use pyvend::download::{MemoryTransport, Registry};
use pyvend::group::{Fetcher, Group, MAIN_GROUP, Report, Status};
use pyvend::legacy;
use pyvend::progress::ConsoleProgress;
use pyvend::resolve::Resolver;
use pyvend::tree;

#[cfg(windows)]
#[link(name = "kernel32")]
unsafe extern "system" {
    fn SetConsoleOutputCP(wCodePageID: u32) -> i32;
}

#[cfg(windows)]
fn enable_windows_utf8_console() {
    unsafe {
        SetConsoleOutputCP(65001);
    }
}

#[cfg(not(windows))]
fn enable_windows_utf8_console() {}

#[derive(Parser)]
#[command(name = "pyvend")]
#[command(about = "Mirror remote Python source dependencies into a local cache", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download dependencies and sync them into the cache
    Update {
        /// Only update this group
        #[arg(short, long)]
        group: Option<String>,
        /// Only update these packages (of the selected group, default: main)
        packages: Vec<String>,
        /// Show resolved URLs and staging paths
        #[arg(short, long)]
        verbose: bool,
        /// Never touch the network; only local path dependencies update
        #[arg(long)]
        offline: bool,
    },
    /// Remove cached packages that are no longer declared
    Clean,
    /// Copy every group's cache into a target directory
    Vendor {
        /// Destination directory (merged, not replaced)
        target: PathBuf,
    },
    /// Visualize declared dependencies
    Tree,
    /// Inspect the dependency cache
    Cache {
        #[command(subcommand)]
        op: CacheOp,
    },
    /// Download single-module dependencies as flat `<name>.py` files
    FetchSingle {
        /// Output directory [default: .pyvend-lib next to pyvend.toml]
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Group to read declarations from
        #[arg(short, long, default_value = MAIN_GROUP)]
        group: String,
        /// Only fetch these packages
        packages: Vec<String>,
        #[arg(short, long)]
        verbose: bool,
        #[arg(long)]
        offline: bool,
    },
    /// Generate shell completion scripts
    Completion { shell: Shell },
}

#[derive(Subcommand)]
enum CacheOp {
    /// Remove the whole dependencies folder
    Clean,
    /// List cached packages
    Ls,
    /// Print the dependencies folder path
    Path,
}

fn main() -> Result<()> {
    enable_windows_utf8_console();

    let cli = Cli::parse();

    match cli.command {
        Commands::Update {
            group,
            packages,
            verbose,
            offline,
        } => update(group, packages, verbose, offline),
        Commands::Clean => clean(),
        Commands::Vendor { target } => vendor(target),
        Commands::Tree => {
            let config = load_config()?;
            let groups = config.groups()?;
            tree::print_tree(config.project_name(), &groups);
            Ok(())
        }
        Commands::Cache { op } => {
            let config = load_config()?;
            match op {
                CacheOp::Clean => cache::clean(&config),
                CacheOp::Ls => cache::list(&config),
                CacheOp::Path => cache::print_path(&config),
            }
        }
        Commands::FetchSingle {
            dir,
            group,
            packages,
            verbose,
            offline,
        } => fetch_single(dir, &group, packages, verbose, offline),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}

fn load_config() -> Result<Config> {
    Config::find().context("Could not load pyvend.toml")
}

fn selected_groups(config: &Config, name: Option<&str>) -> Result<Vec<Group>> {
    match name {
        Some(name) => Ok(vec![config.group(name)?]),
        None => Ok(config.groups()?),
    }
}

fn fetcher(offline: bool) -> Fetcher {
    if offline {
        Fetcher::new(Resolver::default(), Registry::new(MemoryTransport::new()))
    } else {
        Fetcher::default()
    }
}

fn update(group: Option<String>, packages: Vec<String>, verbose: bool, offline: bool) -> Result<()> {
    let config = load_config()?;

    // A package subset only makes sense for one group; default to main.
    let group = match (&group, packages.is_empty()) {
        (None, false) => Some(MAIN_GROUP.to_string()),
        _ => group,
    };
    let groups = selected_groups(&config, group.as_deref())?;
    let subset = (!packages.is_empty()).then_some(packages.as_slice());

    let fetcher = fetcher(offline);
    let progress = ConsoleProgress::new(verbose);
    let mut failed = false;

    for group in &groups {
        let report = group
            .download(&fetcher, subset, &progress)
            .with_context(|| format!("Failed to update group '{}'", group.name()))?;
        print_summary(&report);
        failed |= report.has_failures();
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(report: &Report) {
    if report.is_empty() {
        println!("{} [{}] nothing to update", "!".yellow(), report.group);
        return;
    }

    let updated = report.count(|s| *s == Status::Updated);
    let unchanged = report.count(|s| *s == Status::Unchanged);
    let failed = report.count(|s| matches!(s, Status::Failed(_)));
    let mark = if failed == 0 { "✓".green() } else { "x".red() };
    println!(
        "{} [{}] {} updated, {} unchanged, {} failed",
        mark, report.group, updated, unchanged, failed
    );
    for (name, status) in &report.entries {
        if let Status::Failed(reason) = status {
            println!("   {} {}: {}", "x".red(), name.bold(), reason);
        }
    }
}

fn clean() -> Result<()> {
    let config = load_config()?;
    let mut removed_count = 0;

    for group in config.groups()? {
        for name in group.clean()? {
            println!("   {} Removing unused: {}/{}", "🗑️".red(), group.name(), name);
            removed_count += 1;
        }
    }

    if removed_count == 0 {
        println!("{} All cached packages are in use.", "✓".green());
    } else {
        println!("{} Removed {} unused entries.", "✓".green(), removed_count);
    }
    Ok(())
}

fn vendor(target: PathBuf) -> Result<()> {
    let config = load_config()?;
    let groups = config.groups()?;

    println!(
        "{} Vendoring {} groups to {}...",
        "📦".blue(),
        groups.len(),
        target.display()
    );
    for group in &groups {
        group
            .copy_to(&target)
            .with_context(|| format!("Failed to copy group '{}'", group.name()))?;
    }
    println!("{} Vendor complete.", "✓".green());
    Ok(())
}

fn fetch_single(
    dir: Option<PathBuf>,
    group: &str,
    packages: Vec<String>,
    verbose: bool,
    offline: bool,
) -> Result<()> {
    let config = load_config()?;
    let group = config.group(group)?;
    let local_dir = dir.unwrap_or_else(|| config.project_root().join(legacy::DEFAULT_LOCAL_DIR));
    let subset = (!packages.is_empty()).then_some(packages.as_slice());

    let fetcher = fetcher(offline);
    let progress = ConsoleProgress::new(verbose);
    let report = legacy::download_single_files(&group, &local_dir, &fetcher, subset, &progress)?;
    print_summary(&report);

    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}
