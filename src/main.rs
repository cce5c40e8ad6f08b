// Entrypoint for the CLI application.
// - Keeps `main` small: initialize logging, parse arguments, dispatch.
// - Returns `anyhow::Result` so fatal errors print once, at the top.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ebbp_cli::cli::{self, Cli};

fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr so stdout stays clean for results.
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cli::run(cli)
}
