//! # Arbor Traits
//!
//! Collaborator interfaces consumed by the Arbor option engine.
//!
//! The engine never reads ambient state: time, prices and balances arrive
//! through these traits, injected when the engine is built.
//!
//! ## Module Structure
//!
//! - [`clock`]: Current time ([`Clock`], [`SystemClock`], [`ManualClock`])
//! - [`price`]: Spot prices per asset ([`PriceSource`], [`FixedPriceSource`])
//! - [`ledger`]: Fungible balances, approvals and transfers ([`AssetLedger`], [`InMemoryLedger`])
//!
//! ## Dependency Injection
//!
//! ```ignore
//! OptionEngineBuilder::new()
//!     .with_clock(ManualClock::new(start))
//!     .with_price_source(FixedPriceSource::new())
//!     .with_ledger(InMemoryLedger::new())
//!     .with_config(EngineConfig::default())
//!     .build()
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod error;
pub mod ledger;
pub mod price;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::TraitError;
pub use ledger::{AssetLedger, InMemoryLedger, Transfer};
pub use price::{FixedPriceSource, PriceSource};
