//! Deterministic premium and collateral formulas.
//!
//! Amounts are converted to human units through their asset's decimals,
//! combined in `Decimal`, and converted back truncating toward zero.
//!
//! - Collateral: `strike × contract_size`
//! - Parent premium: `max(strike × contract_size × parent_rate × years, min_parent_premium)`
//! - Child premium: `min_child_premium + |child − parent| × contract_size × child_rate × years`
//!
//! `years` is the time to maturity on a 365-day basis. Both premiums are
//! floored at one raw unit of the premium token so a quote is never zero.

use rust_decimal::Decimal;
use tracing::debug;

use arbor_config::{EngineConfig, PremiumConfig};
use arbor_core::{Amount, ArborError, ArborResult};

fn checked_mul(a: Decimal, b: Decimal, operation: &str) -> ArborResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| ArborError::overflow(operation))
}

/// Premium and collateral calculator.
#[derive(Debug, Clone)]
pub struct PremiumCalculator {
    contract_size: Decimal,
    premium: PremiumConfig,
}

impl PremiumCalculator {
    /// Creates a calculator from the engine configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            contract_size: config.contract_size,
            premium: config.premium.clone(),
        }
    }

    /// Contract size the calculator scales by.
    pub fn contract_size(&self) -> Decimal {
        self.contract_size
    }

    /// Collateral a writer posts for a root option, in the strike's scale.
    ///
    /// The same for calls and puts: a put can lose at most its strike, and
    /// call payoffs are clamped to the posted collateral at settlement.
    pub fn collateral_required(&self, strike: Amount, decimals: u32) -> ArborResult<Amount> {
        let strike_units = strike.to_units(decimals)?;
        let collateral = checked_mul(strike_units, self.contract_size, "collateral")?;
        Amount::from_units(collateral, decimals)
    }

    /// Baseline premium of a root option, in the strike's scale.
    pub fn parent_premium(
        &self,
        strike: Amount,
        decimals: u32,
        years: Decimal,
    ) -> ArborResult<Amount> {
        let strike_units = strike.to_units(decimals)?;
        let notional = checked_mul(strike_units, self.contract_size, "parent premium")?;
        let rate_per_year = checked_mul(notional, self.premium.parent_rate, "parent premium")?;
        let time_value = checked_mul(rate_per_year, years, "parent premium")?;
        let units = time_value.max(self.premium.min_parent_premium);

        let premium = Amount::from_units(units, decimals)?.max(Amount::new(1));
        debug!(
            "parent premium: strike={} years={} units={} raw={}",
            strike, years, units, premium
        );
        Ok(premium)
    }

    /// Premium of a child layered on a parent.
    ///
    /// `strike_decimals` is the scale of both strikes; the result is in
    /// `premium_decimals`, the scale of the premium token. The quote is
    /// non-decreasing in the strike distance and never below the configured
    /// minimum.
    pub fn child_premium(
        &self,
        parent_strike: Amount,
        child_strike: Amount,
        strike_decimals: u32,
        premium_decimals: u32,
        years: Decimal,
    ) -> ArborResult<Amount> {
        let distance = parent_strike.abs_diff(child_strike).to_units(strike_decimals)?;
        let scaled = checked_mul(distance, self.contract_size, "child premium")?;
        let rate_per_year = checked_mul(scaled, self.premium.child_rate, "child premium")?;
        let time_value = checked_mul(rate_per_year, years, "child premium")?;
        let units = self
            .premium
            .min_child_premium
            .checked_add(time_value)
            .ok_or_else(|| ArborError::overflow("child premium"))?;

        let premium = Amount::from_units(units, premium_decimals)?.max(Amount::new(1));
        debug!(
            "child premium: distance={} years={} units={} raw={}",
            distance, years, units, premium
        );
        Ok(premium)
    }
}
