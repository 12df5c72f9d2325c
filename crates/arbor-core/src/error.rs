//! Error types for Arbor.
//!
//! Every public operation either applies completely or fails with one of
//! these variants before any state is mutated.

use thiserror::Error;

use crate::types::{Amount, AssetId, OptionId, OptionType, PartyId, Timestamp};

/// A specialized Result type for Arbor operations.
pub type ArborResult<T> = Result<T, ArborError>;

/// The main error type for Arbor operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArborError {
    /// The asset has not been added to the asset registry.
    #[error("Asset not supported: {asset}")]
    AssetNotSupported {
        /// The rejected asset.
        asset: AssetId,
    },

    /// The maturity is in the past or conflicts with the maturity policy.
    #[error("Invalid maturity {maturity}: {reason}")]
    InvalidMaturity {
        /// The rejected maturity.
        maturity: Timestamp,
        /// Why it was rejected.
        reason: String,
    },

    /// A child strike is not strictly beyond its parent's strike.
    #[error(
        "Strike order violation: {option_type} child strike {child_strike} must be {} parent strike {parent_strike}",
        strike_direction(.option_type)
    )]
    StrikeOrderViolation {
        /// Type shared by parent and child.
        option_type: OptionType,
        /// Strike of the parent option.
        parent_strike: Amount,
        /// Requested child strike.
        child_strike: Amount,
    },

    /// Only the holder of the parent may layer a child on it.
    #[error("Caller {caller} is not the holder of parent option {parent_id}")]
    NotParentHolder {
        /// The parent option.
        parent_id: OptionId,
        /// The rejected caller.
        caller: PartyId,
    },

    /// The caller does not hold the option.
    #[error("Caller {caller} is not the holder of option {option_id}")]
    NotOptionHolder {
        /// The option.
        option_id: OptionId,
        /// The rejected caller.
        caller: PartyId,
    },

    /// Settlement was attempted before maturity.
    #[error("Option {option_id} matures at {maturity}, current time is {now}")]
    NotYetMatured {
        /// The option.
        option_id: OptionId,
        /// Its maturity.
        maturity: Timestamp,
        /// Clock reading at the time of the call.
        now: Timestamp,
    },

    /// The option has already been settled.
    #[error("Option {option_id} is already settled")]
    AlreadySettled {
        /// The option.
        option_id: OptionId,
    },

    /// Settlement proceeds were already withdrawn.
    #[error("Settlement of option {option_id} was already claimed")]
    AlreadyClaimed {
        /// The option.
        option_id: OptionId,
    },

    /// The option has not been settled yet.
    #[error("Option {option_id} is not settled")]
    NotSettled {
        /// The option.
        option_id: OptionId,
    },

    /// The paying party cannot cover a premium.
    #[error("Insufficient premium balance: {party} cannot pay {required} of {asset}")]
    InsufficientPremiumBalance {
        /// The paying party.
        party: PartyId,
        /// Premium token.
        asset: AssetId,
        /// Premium amount.
        required: Amount,
    },

    /// No option exists with this id.
    #[error("Option not found: {option_id}")]
    OptionNotFound {
        /// The missing id.
        option_id: OptionId,
    },

    /// A child cannot settle before its parent.
    #[error("Option {option_id} cannot settle before its parent {parent_id}")]
    ParentNotSettled {
        /// The child option.
        option_id: OptionId,
        /// Its unsettled parent.
        parent_id: OptionId,
    },

    /// The writer cannot post the required collateral.
    #[error("Insufficient collateral: {party} cannot lock {required} of {asset}")]
    InsufficientCollateral {
        /// The writer.
        party: PartyId,
        /// Collateral asset.
        asset: AssetId,
        /// Required collateral.
        required: Amount,
    },

    /// A parameter is outside its valid domain.
    #[error("Invalid parameter: {reason}")]
    InvalidParameter {
        /// Description of what's invalid.
        reason: String,
    },

    /// The legacy exercise path is switched off.
    #[error("Legacy exercise is disabled; use settle_option and claim_settlement")]
    LegacyExerciseDisabled,

    /// Fixed-point arithmetic overflowed.
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow {
        /// The operation that overflowed.
        operation: String,
    },

    /// A collaborator (clock, price source, ledger) failed.
    #[error("Collaborator error: {reason}")]
    Collaborator {
        /// Description of the failure.
        reason: String,
    },
}

fn strike_direction(option_type: &OptionType) -> &'static str {
    match option_type {
        OptionType::Call => "above",
        OptionType::Put => "below",
    }
}

impl ArborError {
    /// Creates an invalid maturity error.
    #[must_use]
    pub fn invalid_maturity(maturity: Timestamp, reason: impl Into<String>) -> Self {
        Self::InvalidMaturity {
            maturity,
            reason: reason.into(),
        }
    }

    /// Creates an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    /// Creates an arithmetic overflow error.
    #[must_use]
    pub fn overflow(operation: impl Into<String>) -> Self {
        Self::ArithmeticOverflow {
            operation: operation.into(),
        }
    }

    /// Creates an option not found error.
    #[must_use]
    pub fn not_found(option_id: OptionId) -> Self {
        Self::OptionNotFound { option_id }
    }

    /// Creates a collaborator error.
    #[must_use]
    pub fn collaborator(reason: impl Into<String>) -> Self {
        Self::Collaborator {
            reason: reason.into(),
        }
    }
}
