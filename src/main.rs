use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use readme_sync::cli::{run, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    run(cli)?;
    Ok(())
}
