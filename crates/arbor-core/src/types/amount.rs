//! Fixed-point amount type.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{ArborError, ArborResult};

/// Largest number of decimals an asset may declare.
pub const MAX_DECIMALS: u32 = 18;

/// A non-negative fixed-point amount in an asset's native scale.
///
/// The raw value is an integer count of the asset's smallest unit, so an
/// 8-decimal asset represents `1.0` as `100_000_000`. Strikes, premiums,
/// collateral and payoffs are all `Amount`s.
///
/// Amounts serialize as decimal strings so that 18-decimal values survive
/// formats limited to 64-bit integers.
///
/// # Example
///
/// ```rust
/// use arbor_core::types::Amount;
/// use rust_decimal_macros::dec;
///
/// let strike = Amount::from_units(dec!(50000), 8).unwrap();
/// assert_eq!(strike.raw(), 5_000_000_000_000);
/// assert_eq!(strike.to_units(8).unwrap(), dec!(50000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u128);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// The largest representable amount.
    pub const MAX: Amount = Amount(u128::MAX);

    /// Creates an amount from a raw integer value.
    #[must_use]
    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn raw(self) -> u128 {
        self.0
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Converts human units (e.g. `0.1` BTC) to a raw amount, truncating
    /// digits beyond `decimals`.
    pub fn from_units(units: Decimal, decimals: u32) -> ArborResult<Self> {
        if units.is_sign_negative() && !units.is_zero() {
            return Err(ArborError::invalid_parameter(format!(
                "amount must not be negative, got {units}"
            )));
        }
        let raw = units
            .checked_mul(scale_factor(decimals)?)
            .ok_or_else(|| ArborError::overflow("units to raw amount"))?
            .trunc();
        raw.to_u128()
            .map(Self)
            .ok_or_else(|| ArborError::overflow("units to raw amount"))
    }

    /// Converts the raw amount to human units.
    pub fn to_units(self, decimals: u32) -> ArborResult<Decimal> {
        if decimals > MAX_DECIMALS {
            return Err(ArborError::invalid_parameter(format!(
                "decimals must be at most {MAX_DECIMALS}, got {decimals}"
            )));
        }
        let raw = i128::try_from(self.0).map_err(|_| ArborError::overflow("raw amount to units"))?;
        Decimal::try_from_i128_with_scale(raw, decimals)
            .map(|d| d.normalize())
            .map_err(|_| ArborError::overflow("raw amount to units"))
    }

    /// Checked addition.
    pub fn checked_add(self, rhs: Amount) -> ArborResult<Amount> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or_else(|| ArborError::overflow("amount addition"))
    }

    /// Checked subtraction; fails if the result would be negative.
    pub fn checked_sub(self, rhs: Amount) -> ArborResult<Amount> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or_else(|| ArborError::overflow("amount subtraction"))
    }

    /// Subtraction clamped at zero.
    #[must_use]
    pub const fn saturating_sub(self, rhs: Amount) -> Amount {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Absolute difference between two amounts.
    #[must_use]
    pub const fn abs_diff(self, other: Amount) -> Amount {
        Self(self.0.abs_diff(other.0))
    }
}

fn scale_factor(decimals: u32) -> ArborResult<Decimal> {
    if decimals > MAX_DECIMALS {
        return Err(ArborError::invalid_parameter(format!(
            "decimals must be at most {MAX_DECIMALS}, got {decimals}"
        )));
    }
    Ok(Decimal::from(10u64.pow(decimals)))
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .replace('_', "")
            .parse::<u128>()
            .map(Self)
            .map_err(|e| ArborError::invalid_parameter(format!("invalid amount '{s}': {e}")))
    }
}

impl From<u64> for Amount {
    fn from(raw: u64) -> Self {
        Self(u128::from(raw))
    }
}

impl From<u128> for Amount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or an integer string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
        Ok(Amount(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        u128::try_from(v)
            .map(Amount)
            .map_err(|_| E::custom(format!("amount must not be negative, got {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(E::custom)
    }
}
