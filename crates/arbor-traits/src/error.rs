//! Error types for collaborator operations.

use arbor_core::{Amount, ArborError, AssetId, PartyId};
use thiserror::Error;

/// Common error type for collaborator operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraitError {
    /// No price is available for the asset
    #[error("price unavailable for {0}")]
    PriceUnavailable(AssetId),

    /// The paying party's balance is too small
    #[error("insufficient balance: {party} holds {available} of {asset}, needs {required}")]
    InsufficientBalance {
        /// Asset being moved
        asset: AssetId,
        /// Paying party
        party: PartyId,
        /// Amount required across the batch
        required: Amount,
        /// Current balance
        available: Amount,
    },

    /// The paying party has not approved the engine for enough
    #[error("insufficient allowance: {owner} approved {available} of {asset}, needs {required}")]
    InsufficientAllowance {
        /// Asset being moved
        asset: AssetId,
        /// Paying party
        owner: PartyId,
        /// Amount required across the batch
        required: Amount,
        /// Current allowance
        available: Amount,
    },

    /// Balance arithmetic overflowed
    #[error("balance overflow for {0}")]
    Overflow(AssetId),

    /// Invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl TraitError {
    /// The asset that ran short, for balance or allowance shortfalls.
    pub fn shortfall_asset(&self) -> Option<&AssetId> {
        match self {
            TraitError::InsufficientBalance { asset, .. }
            | TraitError::InsufficientAllowance { asset, .. } => Some(asset),
            _ => None,
        }
    }
}

impl From<TraitError> for ArborError {
    fn from(e: TraitError) -> Self {
        ArborError::collaborator(e.to_string())
    }
}
