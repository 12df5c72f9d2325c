//! Identifier types used across Arbor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Option identifier.
///
/// Ids are assigned from a monotonically increasing counter starting at 1.
/// The value 0 is reserved and means "no parent".
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(u64);

impl OptionId {
    /// The reserved "no parent" id.
    pub const NONE: OptionId = OptionId(0);

    /// Create a new option ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns true for the reserved "no parent" id.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OptionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Asset identifier (ticker or token address).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    /// Create a new asset ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Party identifier (writer, holder, buyer, or the engine's custody account).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub String);

impl PartyId {
    const VAULT: &'static str = "arbor:vault";

    /// Create a new party ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The custody account holding locked collateral and escrowed proceeds.
    pub fn vault() -> Self {
        Self(Self::VAULT.to_string())
    }

    /// Returns true if this is the custody account.
    pub fn is_vault(&self) -> bool {
        self.0 == Self::VAULT
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PartyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PartyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
