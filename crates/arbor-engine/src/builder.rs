//! Builder pattern for the option engine.

use std::sync::Arc;

use arbor_config::{EngineConfig, Validate};
use arbor_core::{ArborError, ArborResult, AssetSpec};
use arbor_traits::{AssetLedger, Clock, PriceSource, SystemClock};

use crate::engine::OptionEngine;

/// Builder for constructing an [`OptionEngine`].
///
/// The price source and ledger are required. The clock defaults to
/// [`SystemClock`] and the configuration to [`EngineConfig::default`].
#[derive(Default)]
pub struct OptionEngineBuilder {
    config: Option<EngineConfig>,
    clock: Option<Arc<dyn Clock>>,
    prices: Option<Arc<dyn PriceSource>>,
    ledger: Option<Arc<dyn AssetLedger>>,
    assets: Vec<AssetSpec>,
}

impl OptionEngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Set the price source.
    #[must_use]
    pub fn with_price_source(mut self, prices: impl PriceSource + 'static) -> Self {
        self.prices = Some(Arc::new(prices));
        self
    }

    /// Set the asset ledger.
    #[must_use]
    pub fn with_ledger(mut self, ledger: impl AssetLedger + 'static) -> Self {
        self.ledger = Some(Arc::new(ledger));
        self
    }

    /// Register a supported asset at build time.
    #[must_use]
    pub fn with_asset(mut self, spec: AssetSpec) -> Self {
        self.assets.push(spec);
        self
    }

    /// Build the option engine.
    pub fn build(self) -> ArborResult<OptionEngine> {
        let config = self.config.unwrap_or_default();
        let errors = config.validate();
        if !errors.is_empty() {
            let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(ArborError::invalid_parameter(format!(
                "invalid engine configuration: {}",
                reasons.join("; ")
            )));
        }

        let prices = self
            .prices
            .ok_or_else(|| ArborError::invalid_parameter("price source not configured"))?;
        let ledger = self
            .ledger
            .ok_or_else(|| ArborError::invalid_parameter("ledger not configured"))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let mut engine = OptionEngine::new(config, clock, prices, ledger);
        for spec in self.assets {
            engine.add_supported_asset(spec)?;
        }
        Ok(engine)
    }
}
