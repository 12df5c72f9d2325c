//! Engine configuration types.
//!
//! This module defines the parameters of premium and collateral calculation
//! and the policies the option engine enforces.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

use arbor_core::AssetId;

use crate::error::{ConfigError, ConfigResult, Validate, ValidationError};

// =============================================================================
// MATURITY POLICY
// =============================================================================

/// How a child option's maturity is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaturityPolicy {
    /// Children always mature with their root. An explicit maturity is only
    /// accepted when it equals the root's.
    #[default]
    Inherit,
    /// Children may pick their own maturity, as long as it is in the future
    /// and not after the parent's.
    Explicit,
}

// =============================================================================
// PREMIUM CONFIGURATION
// =============================================================================

/// Parameters of the deterministic premium formulas.
///
/// Rates are annualised fractions; minimums are in human units of the
/// premium token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumConfig {
    /// Annual rate applied to the strike notional of a root.
    #[serde(default = "default_parent_rate")]
    pub parent_rate: Decimal,

    /// Annual rate applied to the strike distance of a child.
    #[serde(default = "default_child_rate")]
    pub child_rate: Decimal,

    /// Floor of a root premium quote.
    #[serde(default = "default_min_parent_premium")]
    pub min_parent_premium: Decimal,

    /// Floor of every child premium; must be positive.
    #[serde(default = "default_min_child_premium")]
    pub min_child_premium: Decimal,
}

fn default_parent_rate() -> Decimal {
    dec!(0.05)
}

fn default_child_rate() -> Decimal {
    dec!(0.05)
}

fn default_min_parent_premium() -> Decimal {
    dec!(0.0001)
}

fn default_min_child_premium() -> Decimal {
    dec!(0.0001)
}

impl Default for PremiumConfig {
    fn default() -> Self {
        Self {
            parent_rate: default_parent_rate(),
            child_rate: default_child_rate(),
            min_parent_premium: default_min_parent_premium(),
            min_child_premium: default_min_child_premium(),
        }
    }
}

impl Validate for PremiumConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.parent_rate.is_sign_negative() {
            errors.push(ValidationError::with_rule(
                "premium.parent_rate",
                "must not be negative",
                "non_negative",
            ));
        }
        if self.child_rate.is_sign_negative() {
            errors.push(ValidationError::with_rule(
                "premium.child_rate",
                "must not be negative",
                "non_negative",
            ));
        }
        if self.min_parent_premium.is_sign_negative() {
            errors.push(ValidationError::with_rule(
                "premium.min_parent_premium",
                "must not be negative",
                "non_negative",
            ));
        }
        if self.min_child_premium <= Decimal::ZERO {
            errors.push(ValidationError::with_rule(
                "premium.min_child_premium",
                "must be positive",
                "positive",
            ));
        }

        errors
    }
}

// =============================================================================
// ENGINE CONFIGURATION
// =============================================================================

/// Configuration of an option engine.
///
/// # Example
///
/// ```rust
/// use arbor_config::{EngineConfig, MaturityPolicy, Validate};
/// use rust_decimal_macros::dec;
///
/// let config = EngineConfig::new("desk")
///     .with_contract_size(dec!(0.1))
///     .with_settlement_asset("USDC")
///     .with_maturity_policy(MaturityPolicy::Explicit);
/// assert!(config.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Configuration name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Units of the underlying per option; scales collateral and premiums.
    #[serde(default = "default_contract_size")]
    pub contract_size: Decimal,

    /// Premium formula parameters.
    #[serde(default)]
    pub premium: PremiumConfig,

    /// Asset child premiums are paid in. When unset, children use their
    /// parent's premium token.
    #[serde(default)]
    pub settlement_asset: Option<AssetId>,

    /// Child maturity policy.
    #[serde(default)]
    pub maturity_policy: MaturityPolicy,

    /// Enables the legacy, non-maturity-gated `exercise_option` path.
    #[serde(default)]
    pub allow_legacy_exercise: bool,
}

fn default_name() -> String {
    "default".to_string()
}

fn default_contract_size() -> Decimal {
    Decimal::ONE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(default_name())
    }
}

impl EngineConfig {
    /// Creates a configuration with default parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract_size: default_contract_size(),
            premium: PremiumConfig::default(),
            settlement_asset: None,
            maturity_policy: MaturityPolicy::default(),
            allow_legacy_exercise: false,
        }
    }

    /// Sets the contract size.
    #[must_use]
    pub fn with_contract_size(mut self, contract_size: Decimal) -> Self {
        self.contract_size = contract_size;
        self
    }

    /// Sets the premium parameters.
    #[must_use]
    pub fn with_premium(mut self, premium: PremiumConfig) -> Self {
        self.premium = premium;
        self
    }

    /// Sets the asset child premiums are paid in.
    #[must_use]
    pub fn with_settlement_asset(mut self, asset: impl Into<AssetId>) -> Self {
        self.settlement_asset = Some(asset.into());
        self
    }

    /// Sets the child maturity policy.
    #[must_use]
    pub fn with_maturity_policy(mut self, policy: MaturityPolicy) -> Self {
        self.maturity_policy = policy;
        self
    }

    /// Enables or disables the legacy exercise path.
    #[must_use]
    pub fn with_legacy_exercise(mut self, enabled: bool) -> Self {
        self.allow_legacy_exercise = enabled;
        self
    }

    /// Parses a TOML document and validates it.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate_or_error()?;
        Ok(config)
    }

    /// Parses a JSON document and validates it.
    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate_or_error()?;
        Ok(config)
    }

    /// Loads a configuration file; the extension (`.toml` or `.json`)
    /// selects the format.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(ValidationError::new("name", "must not be empty"));
        }
        if self.contract_size <= Decimal::ZERO {
            errors.push(ValidationError::with_rule(
                "contract_size",
                "must be positive",
                "positive",
            ));
        }
        if let Some(asset) = &self.settlement_asset {
            if asset.as_str().trim().is_empty() {
                errors.push(ValidationError::new(
                    "settlement_asset",
                    "must not be empty when set",
                ));
            }
        }
        errors.extend(self.premium.validate());

        errors
    }
}
