//! Domain types for layered option trees.
//!
//! - [`OptionId`], [`AssetId`], [`PartyId`]: identifiers
//! - [`Amount`]: non-negative fixed-point amount in an asset's native scale
//! - [`Timestamp`]: unix seconds
//! - [`AssetSpec`]: registered asset with its precision
//! - [`OptionType`], [`OptionRecord`], [`Settlement`]: tree nodes

mod amount;
mod asset;
mod ids;
mod option;
mod timestamp;

pub use amount::{Amount, MAX_DECIMALS};
pub use asset::AssetSpec;
pub use ids::{AssetId, OptionId, PartyId};
pub use option::{OptionRecord, OptionType, Settlement};
pub use timestamp::{Timestamp, SECONDS_PER_DAY, SECONDS_PER_YEAR};
