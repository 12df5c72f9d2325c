//! Config command implementation.
//!
//! Shows and validates engine configuration files.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};

use arbor_config::{ConfigError, EngineConfig, ValidationError};

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::output::{format_percent, print_error, print_header, print_output, print_success, KeyValue};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show a configuration (defaults when no file is given)
    Show(ShowArgs),

    /// Validate a configuration file and list every violated rule
    Validate(ValidateArgs),
}

/// Arguments for the show subcommand.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Configuration file (.toml or .json)
    pub file: Option<PathBuf>,
}

/// Arguments for the validate subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration file (.toml or .json)
    pub file: PathBuf,
}

/// Execute the config command.
pub fn execute(args: ConfigArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        ConfigCommand::Show(show_args) => execute_show(show_args, format),
        ConfigCommand::Validate(validate_args) => execute_validate(validate_args, format),
    }
}

/// Show a configuration.
fn execute_show(args: ShowArgs, format: OutputFormat) -> Result<()> {
    let config = match &args.file {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    match format {
        OutputFormat::Table | OutputFormat::Csv => {
            if format == OutputFormat::Table {
                print_header(&format!("Engine Configuration: {}", config.name));
            }
            print_output(&rows(&config), format)?;
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Minimal => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

fn rows(config: &EngineConfig) -> Vec<KeyValue> {
    vec![
        KeyValue::new("name", &config.name),
        KeyValue::new("contract_size", config.contract_size.normalize().to_string()),
        KeyValue::new("premium.parent_rate", format_percent(config.premium.parent_rate)),
        KeyValue::new("premium.child_rate", format_percent(config.premium.child_rate)),
        KeyValue::new(
            "premium.min_parent_premium",
            config.premium.min_parent_premium.normalize().to_string(),
        ),
        KeyValue::new(
            "premium.min_child_premium",
            config.premium.min_child_premium.normalize().to_string(),
        ),
        KeyValue::new(
            "settlement_asset",
            config
                .settlement_asset
                .as_ref()
                .map_or_else(|| "(parent premium token)".to_string(), ToString::to_string),
        ),
        KeyValue::new("maturity_policy", format!("{:?}", config.maturity_policy).to_lowercase()),
        KeyValue::new("allow_legacy_exercise", config.allow_legacy_exercise.to_string()),
    ]
}

/// Validate a configuration file.
fn execute_validate(args: ValidateArgs, format: OutputFormat) -> Result<()> {
    let errors = match EngineConfig::from_file(&args.file) {
        Ok(_) => Vec::new(),
        Err(ConfigError::Validation { field, message }) => vec![ValidationError::new(field, message)],
        Err(ConfigError::MultipleValidationErrors(errors)) => errors,
        Err(other) => return Err(other.into()),
    };

    if errors.is_empty() {
        print_success(&format!("{} is valid", args.file.display()));
        return Ok(());
    }

    report_errors(&args.file, &errors, format)?;
    Err(CliError::InvalidConfig {
        path: args.file,
        count: errors.len(),
    }
    .into())
}

fn report_errors(path: &Path, errors: &[ValidationError], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            for error in errors {
                print_error(&format!("{}: {}", path.display(), error));
            }
        }
        _ => {
            let rows: Vec<KeyValue> = errors
                .iter()
                .map(|e| KeyValue::new(&e.field, &e.message))
                .collect();
            print_output(&rows, format)?;
        }
    }
    Ok(())
}
