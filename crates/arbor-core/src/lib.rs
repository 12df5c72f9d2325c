//! # Arbor Core
//!
//! Core types and the error taxonomy for Arbor layered option trees.
//!
//! This crate provides the foundational building blocks used throughout Arbor:
//!
//! - **Types**: Identifiers (`OptionId`, `AssetId`, `PartyId`), fixed-point
//!   `Amount`, `Timestamp`, `OptionType` and the `OptionRecord` stored per node
//! - **Errors**: [`ArborError`], the single caller-visible rejection type
//!
//! ## Design Philosophy
//!
//! - **Type Safety**: Newtypes prevent mixing raw amounts, ids and timestamps
//! - **Exact Arithmetic**: Raw amounts are integers; scaled math goes through `Decimal`
//! - **Explicit Over Implicit**: Checked arithmetic, never silent wrap-around
//!
//! ## Example
//!
//! ```rust
//! use arbor_core::prelude::*;
//!
//! let strike = Amount::new(50_000);
//! let spot = Amount::new(53_500);
//! assert_eq!(OptionType::Call.intrinsic_value(strike, spot), Amount::new(3_500));
//! assert_eq!(OptionType::Put.intrinsic_value(strike, spot), Amount::ZERO);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::return_self_not_must_use)]

pub mod error;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ArborError, ArborResult};
    pub use crate::types::{
        Amount, AssetId, AssetSpec, OptionId, OptionRecord, OptionType, PartyId, Settlement,
        Timestamp,
    };
}

// Re-export commonly used types at crate root
pub use error::{ArborError, ArborResult};
pub use types::{
    Amount, AssetId, AssetSpec, OptionId, OptionRecord, OptionType, PartyId, Settlement,
    Timestamp,
};
