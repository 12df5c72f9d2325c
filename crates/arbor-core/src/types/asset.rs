//! Asset specifications.

use serde::{Deserialize, Serialize};

use super::amount::MAX_DECIMALS;
use super::AssetId;
use crate::error::{ArborError, ArborResult};

/// A registered asset and the precision of its raw amounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Identifier.
    pub id: AssetId,
    /// Display symbol.
    pub symbol: String,
    /// Number of decimals in the native scale (observed: 6, 8, 18).
    pub decimals: u32,
}

impl AssetSpec {
    /// Creates a spec whose symbol equals its id.
    pub fn new(id: impl Into<AssetId>, decimals: u32) -> Self {
        let id = id.into();
        Self {
            symbol: id.as_str().to_string(),
            id,
            decimals,
        }
    }

    /// Overrides the display symbol.
    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    /// Validates the precision.
    pub fn validate(&self) -> ArborResult<()> {
        if self.decimals > MAX_DECIMALS {
            return Err(ArborError::invalid_parameter(format!(
                "asset {} declares {} decimals, at most {MAX_DECIMALS} supported",
                self.id, self.decimals
            )));
        }
        if self.id.as_str().trim().is_empty() {
            return Err(ArborError::invalid_parameter("asset id must not be empty"));
        }
        Ok(())
    }
}
