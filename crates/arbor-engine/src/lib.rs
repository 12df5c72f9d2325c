//! # Arbor Engine
//!
//! Lifecycle and settlement of layered option trees.
//!
//! This crate provides:
//! - [`AssetRegistry`]: Whitelist of underlyings and premium tokens
//! - [`OptionRegistry`]: Arena of option records and parent/child links
//! - [`PremiumCalculator`]: Deterministic premium and collateral formulas
//! - [`Waterfall`]: Payoff distribution across a tree at one price fixing
//! - [`OptionEngine`]: The public operation surface
//! - [`SharedEngine`]: Lock-protected handle for multi-threaded hosts
//!
//! ## Architecture
//!
//! ```text
//! create_root_option ─> AssetRegistry ─> OptionRegistry ─> ledger (lock collateral)
//!
//! create_child_option ─> holder check ─> strike ordering ─> PremiumCalculator
//!                                                        ─> OptionRegistry ─> ledger (premium)
//!
//! settle_option(_tree) ─> PriceSource (root fixing) ─> Waterfall ─> ledger (writer remainder)
//! claim_settlement ─> ledger (holder proceeds)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = OptionEngineBuilder::new()
//!     .with_clock(clock)
//!     .with_price_source(prices)
//!     .with_ledger(ledger)
//!     .with_config(config)
//!     .with_asset(AssetSpec::new("WBTC", 8))
//!     .build()?;
//!
//! let root = engine.create_root_option(&writer, request)?;
//! let child = engine.create_child_option(&writer, root, higher_strike, None)?;
//! // ... after maturity
//! engine.settle_option_tree(root)?;
//! engine.claim_settlement(&writer, child)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod asset_registry;
pub mod builder;
pub mod engine;
pub mod premium;
pub mod registry;
pub mod settlement;
pub mod shared;

// Re-exports
pub use asset_registry::AssetRegistry;
pub use builder::OptionEngineBuilder;
pub use engine::{OptionEngine, RootOptionRequest};
pub use premium::PremiumCalculator;
pub use registry::OptionRegistry;
pub use settlement::{Payout, Waterfall};
pub use shared::SharedEngine;
