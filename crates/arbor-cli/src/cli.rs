//! CLI argument definitions.

use clap::{Parser, Subcommand, ValueEnum};

use arbor_core::OptionType;

use crate::commands::{ConfigArgs, QuoteArgs, SimulateArgs};

/// Arbor - layered option trees backed by a single collateral pool
#[derive(Parser)]
#[command(name = "arbor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Preview collateral and premiums for a root or child option
    Quote(QuoteArgs),

    /// Run a scripted scenario against an in-memory engine
    Simulate(SimulateArgs),

    /// Inspect and validate engine configurations
    Config(ConfigArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
    /// Minimal output (just the value)
    Minimal,
}

/// Option kind as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OptionKind {
    /// Pays when spot ends above the strike
    #[default]
    Call,
    /// Pays when spot ends below the strike
    Put,
}

impl From<OptionKind> for OptionType {
    fn from(kind: OptionKind) -> Self {
        match kind {
            OptionKind::Call => OptionType::Call,
            OptionKind::Put => OptionType::Put,
        }
    }
}
