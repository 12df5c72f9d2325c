//! CLI error types.

use std::path::PathBuf;

use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// A numeric argument is out of range.
    #[error("Invalid {name}: {value}. {hint}")]
    InvalidArgument {
        /// Argument name.
        name: &'static str,
        /// Value supplied.
        value: String,
        /// What a valid value looks like.
        hint: &'static str,
    },

    /// Scenario file could not be read or parsed.
    #[error("Invalid scenario {path}: {reason}")]
    Scenario {
        /// Scenario file.
        path: PathBuf,
        /// Parse or read failure.
        reason: String,
    },

    /// A scenario step failed and the run was asked to stop.
    #[error("Step {step} ({action}) failed: {reason}")]
    StepFailed {
        /// 1-based step number.
        step: usize,
        /// Step action name.
        action: String,
        /// Engine error message.
        reason: String,
    },

    /// Configuration failed validation.
    #[error("Configuration {path} is invalid ({count} error(s))")]
    InvalidConfig {
        /// Configuration file.
        path: PathBuf,
        /// Number of violated rules.
        count: usize,
    },
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
