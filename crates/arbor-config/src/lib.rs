//! # Arbor Config
//!
//! Configuration for the Arbor option engine.
//!
//! - [`EngineConfig`]: contract size, premium formula parameters, settlement
//!   asset, child maturity policy and the legacy exercise switch
//! - [`PremiumConfig`]: rates and floors of the premium quotes
//! - [`Validate`]: field-level validation shared by every configuration type
//!
//! Configurations load from TOML or JSON; every field has a default, so an
//! empty document yields [`EngineConfig::default`].
//!
//! ```rust
//! use arbor_config::{EngineConfig, MaturityPolicy};
//!
//! let config = EngineConfig::from_toml_str("maturity_policy = \"explicit\"").unwrap();
//! assert_eq!(config.maturity_policy, MaturityPolicy::Explicit);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;

pub use engine::{EngineConfig, MaturityPolicy, PremiumConfig};
pub use error::{ConfigError, ConfigResult, Validate, ValidationError};
