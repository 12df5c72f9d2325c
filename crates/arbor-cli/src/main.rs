//! Arbor CLI - quote and simulate layered option trees.
//!
//! # Usage
//!
//! ```bash
//! # Quote a 30-day call struck at 50,000
//! arbor quote --strike 50000 --maturity-days 30
//!
//! # Quote a child layer at 55,000 under a 50,000 parent
//! arbor quote --strike 55000 --parent-strike 50000 --maturity-days 30
//!
//! # Run a scripted scenario
//! arbor simulate scenario.toml --stop-on-error
//!
//! # Inspect an engine configuration
//! arbor config show engine.toml
//! arbor config validate engine.toml
//! ```

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod error;
mod output;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so that json/csv output stays machine-readable
    let filter = if cli.verbose {
        EnvFilter::new("arbor=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let format = cli.format;

    match cli.command {
        Commands::Quote(args) => commands::quote::execute(args, format)?,
        Commands::Simulate(args) => commands::simulate::execute(args, format)?,
        Commands::Config(args) => commands::config::execute(args, format)?,
    }

    Ok(())
}
