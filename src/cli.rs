//! CLI surface for readme-sync: argument parsing and the `run` entrypoint.
//!
//! All decision logic lives in the library modules; this is glue. `run` is
//! split out of `main` so integration tests can drive the tool in-process.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::load_config::load_config;
use crate::synchronise::{synchronise, SyncOptions, SyncReport};

/// Synchronise source-repository READMEs into the documentation tree and
/// repair broken image references.
#[derive(Parser, Debug)]
#[clap(name = "readme-sync", version)]
pub struct Cli {
    /// Path to the YAML mapping configuration
    #[clap(long, default_value = "scripts/readme-sync.yml")]
    pub config: PathBuf,

    /// Directory containing the repository clones and the docs/ tree
    #[clap(long, default_value = ".")]
    pub base_dir: PathBuf,

    /// Report what would be done without making changes
    #[clap(long)]
    pub dry_run: bool,

    /// Repair image references in every markdown file under docs/, not just
    /// the files synced by this run
    #[clap(long)]
    pub fix_all_images: bool,

    /// Enable debug logging
    #[clap(long)]
    pub verbose: bool,
}

/// Runs one synchronisation. Fails (and exits non-zero via `main`) only when
/// the configuration cannot be loaded; skipped mappings and unresolved images
/// are reported in the summary and still exit 0.
pub fn run(cli: Cli) -> Result<SyncReport> {
    let config = load_config(&cli.config)?;

    println!("Synchronise starting...");
    let report = synchronise(
        &config,
        &cli.base_dir,
        &SyncOptions {
            dry_run: cli.dry_run,
            fix_all_images: cli.fix_all_images,
        },
    );
    println!("{}", report.render());
    Ok(report)
}
