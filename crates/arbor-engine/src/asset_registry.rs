//! Whitelist of assets usable as option underlyings and premium tokens.

use std::collections::BTreeMap;

use arbor_core::{ArborError, ArborResult, AssetId, AssetSpec};

/// Registered assets, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: BTreeMap<AssetId, AssetSpec>,
}

impl AssetRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an asset as supported.
    ///
    /// Adding the same spec twice is a no-op and returns `false`. Re-adding
    /// an asset with different decimals is rejected, since every amount
    /// already recorded against it is scaled by the original precision.
    pub fn add_supported_asset(&mut self, spec: AssetSpec) -> ArborResult<bool> {
        spec.validate()?;
        if let Some(existing) = self.assets.get(&spec.id) {
            if existing.decimals != spec.decimals {
                return Err(ArborError::invalid_parameter(format!(
                    "asset {} is registered with {} decimals, cannot re-register with {}",
                    spec.id, existing.decimals, spec.decimals
                )));
            }
            return Ok(false);
        }
        self.assets.insert(spec.id.clone(), spec);
        Ok(true)
    }

    /// Returns true if the asset has been added.
    pub fn is_supported(&self, asset: &AssetId) -> bool {
        self.assets.contains_key(asset)
    }

    /// Returns the registered spec.
    pub fn asset_spec(&self, asset: &AssetId) -> ArborResult<&AssetSpec> {
        self.assets
            .get(asset)
            .ok_or_else(|| ArborError::AssetNotSupported {
                asset: asset.clone(),
            })
    }

    /// Decimals of a supported asset.
    pub fn decimals(&self, asset: &AssetId) -> ArborResult<u32> {
        self.asset_spec(asset).map(|spec| spec.decimals)
    }

    /// Supported assets in id order.
    pub fn supported_assets(&self) -> impl Iterator<Item = &AssetSpec> {
        self.assets.values()
    }

    /// Number of supported assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Returns true if no asset is supported.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
