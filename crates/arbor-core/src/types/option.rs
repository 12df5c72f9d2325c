//! Option records and the call/put distinction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Amount, AssetId, OptionId, PartyId, Timestamp};
use crate::error::ArborError;

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    /// Pays `spot - strike` when positive.
    Call,
    /// Pays `strike - spot` when positive.
    Put,
}

impl OptionType {
    /// Intrinsic value at `spot`, never negative.
    #[must_use]
    pub fn intrinsic_value(self, strike: Amount, spot: Amount) -> Amount {
        match self {
            OptionType::Call => spot.saturating_sub(strike),
            OptionType::Put => strike.saturating_sub(spot),
        }
    }

    /// Returns true if a child strike is strictly further out of the money
    /// than its parent's: above it for calls, below it for puts.
    ///
    /// This ordering bounds every child's payoff by its parent's, which is
    /// what lets the root collateral back an entire tree.
    #[must_use]
    pub fn is_valid_child_strike(self, parent_strike: Amount, child_strike: Amount) -> bool {
        match self {
            OptionType::Call => child_strike > parent_strike,
            OptionType::Put => child_strike < parent_strike,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "CALL"),
            OptionType::Put => write!(f, "PUT"),
        }
    }
}

impl FromStr for OptionType {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CALL" | "C" => Ok(OptionType::Call),
            "PUT" | "P" => Ok(OptionType::Put),
            other => Err(ArborError::invalid_parameter(format!(
                "unknown option type '{other}'"
            ))),
        }
    }
}

/// Outcome recorded when an option settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Spot price the option settled at (shared by every node of a tree).
    pub settlement_price: Amount,
    /// Payoff owed to this node before children carve out their share.
    pub gross_payoff: Amount,
    /// Escrowed for the holder: gross payoff minus what the children take.
    pub holder_proceeds: Amount,
    /// Released to the writer at settlement (unused collateral of a root).
    pub writer_proceeds: Amount,
    /// Time of settlement.
    pub settled_at: Timestamp,
    /// Set once the holder has withdrawn the proceeds.
    pub claimed: bool,
}

/// One node of an option tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionRecord {
    /// Identifier, assigned at creation.
    pub id: OptionId,
    /// Underlying asset.
    pub base_asset: AssetId,
    /// Strike in the base asset's native scale.
    pub strike_price: Amount,
    /// Settlement is permitted at or after this instant.
    pub maturity: Timestamp,
    /// Price of acquiring the option, in `premium_token`.
    pub premium: Amount,
    /// Asset the premium is paid in.
    pub premium_token: AssetId,
    /// Parent id, or [`OptionId::NONE`] for a root.
    pub parent_id: OptionId,
    /// Call or put; shared across a tree.
    pub option_type: OptionType,
    /// Party whose collateral backs the option.
    pub writer: PartyId,
    /// Party entitled to the settlement proceeds.
    pub holder: PartyId,
    /// Bound on this option's payoff, in the base asset's scale.
    pub collateral_locked: Amount,
    /// Terminal flag; never reset once set.
    pub is_settled: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Present once settled.
    pub settlement: Option<Settlement>,
}

impl OptionRecord {
    /// Returns true if the option has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns true once `now` has reached maturity.
    #[must_use]
    pub fn is_matured(&self, now: Timestamp) -> bool {
        now >= self.maturity
    }

    /// Returns true once the holder has withdrawn the proceeds.
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.settlement.as_ref().is_some_and(|s| s.claimed)
    }

    /// Intrinsic value at `spot`.
    #[must_use]
    pub fn intrinsic_value(&self, spot: Amount) -> Amount {
        self.option_type.intrinsic_value(self.strike_price, spot)
    }
}
