//! Spot price collaborators.
//!
//! Prices are trusted inputs: the engine does not check staleness or
//! manipulation. A price is an [`Amount`] in the asset's native scale, the
//! same scale as the strikes it is compared against.

use std::collections::HashMap;
use std::sync::Arc;

use arbor_core::{Amount, AssetId};
use parking_lot::RwLock;

use crate::error::TraitError;

/// Source of spot prices.
pub trait PriceSource: Send + Sync {
    /// Current spot price of `asset`.
    fn get_price(&self, asset: &AssetId) -> Result<Amount, TraitError>;
}

/// A price table set by hand.
///
/// Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct FixedPriceSource {
    prices: Arc<RwLock<HashMap<AssetId, Amount>>>,
}

impl FixedPriceSource {
    /// Creates an empty price table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the price of an asset, returning the table for chaining.
    pub fn with_price(self, asset: impl Into<AssetId>, price: Amount) -> Self {
        self.set_price(asset, price);
        self
    }

    /// Sets the price of an asset.
    pub fn set_price(&self, asset: impl Into<AssetId>, price: Amount) {
        self.prices.write().insert(asset.into(), price);
    }

    /// Removes the price of an asset.
    pub fn clear_price(&self, asset: &AssetId) {
        self.prices.write().remove(asset);
    }
}

impl PriceSource for FixedPriceSource {
    fn get_price(&self, asset: &AssetId) -> Result<Amount, TraitError> {
        self.prices
            .read()
            .get(asset)
            .copied()
            .ok_or_else(|| TraitError::PriceUnavailable(asset.clone()))
    }
}

impl<P: PriceSource + ?Sized> PriceSource for Arc<P> {
    fn get_price(&self, asset: &AssetId) -> Result<Amount, TraitError> {
        (**self).get_price(asset)
    }
}
