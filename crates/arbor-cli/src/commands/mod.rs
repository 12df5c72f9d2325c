//! CLI command implementations.

pub mod config;
pub mod quote;
pub mod simulate;

pub use config::ConfigArgs;
pub use quote::QuoteArgs;
pub use simulate::SimulateArgs;

use rust_decimal::Decimal;

use arbor_core::types::MAX_DECIMALS;
use arbor_core::Amount;

use crate::error::{CliError, CliResult};

/// Converts a human-unit value into a raw amount of an asset with `decimals`.
pub fn to_amount(name: &'static str, value: Decimal, decimals: u32) -> CliResult<Amount> {
    if value.is_sign_negative() {
        return Err(CliError::InvalidArgument {
            name,
            value: value.to_string(),
            hint: "Must not be negative.",
        });
    }
    Amount::from_units(value, decimals).map_err(|_| CliError::InvalidArgument {
        name,
        value: value.to_string(),
        hint: "Does not fit the asset's scale.",
    })
}

/// Validates an asset decimals argument.
pub fn validate_decimals(decimals: u32) -> CliResult<u32> {
    if decimals > MAX_DECIMALS {
        return Err(CliError::InvalidArgument {
            name: "decimals",
            value: decimals.to_string(),
            hint: "Must be between 0 and 18.",
        });
    }
    Ok(decimals)
}

/// Validates a day count that must lie in the future.
pub fn validate_days(days: i64) -> CliResult<i64> {
    if days <= 0 {
        return Err(CliError::InvalidArgument {
            name: "maturity days",
            value: days.to_string(),
            hint: "Must be at least 1.",
        });
    }
    Ok(days)
}
