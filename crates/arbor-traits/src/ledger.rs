//! Fungible asset ledger collaborators.
//!
//! The engine moves funds only through [`AssetLedger`]. Pulls from a party
//! (collateral, premiums) spend that party's allowance to the engine's
//! custody account, [`PartyId::vault`]; payouts from the vault need none.
//!
//! Every batch is all-or-nothing. [`AssetLedger::check`] is a dry run with
//! the same rules as [`AssetLedger::execute`], which lets the engine validate
//! fund movements before it mutates its own state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arbor_core::{Amount, AssetId, PartyId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::TraitError;

/// One fund movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Asset moved.
    pub asset: AssetId,
    /// Paying party.
    pub from: PartyId,
    /// Receiving party.
    pub to: PartyId,
    /// Amount in the asset's native scale.
    pub amount: Amount,
}

impl Transfer {
    /// Creates a transfer.
    pub fn new(asset: AssetId, from: PartyId, to: PartyId, amount: Amount) -> Self {
        Self {
            asset,
            from,
            to,
            amount,
        }
    }
}

/// Balance/allowance/transfer interface.
pub trait AssetLedger: Send + Sync {
    /// Balance of `party` in `asset`.
    fn balance_of(&self, asset: &AssetId, party: &PartyId) -> Amount;

    /// Amount of `asset` that `owner` lets `spender` move.
    fn allowance(&self, asset: &AssetId, owner: &PartyId, spender: &PartyId) -> Amount;

    /// Sets the allowance of `spender` over `owner`'s `asset`.
    fn approve(
        &self,
        asset: &AssetId,
        owner: &PartyId,
        spender: &PartyId,
        amount: Amount,
    ) -> Result<(), TraitError>;

    /// Dry run: succeeds iff `execute` would succeed for the same batch.
    fn check(&self, transfers: &[Transfer]) -> Result<(), TraitError>;

    /// Applies the whole batch or nothing.
    fn execute(&self, transfers: &[Transfer]) -> Result<(), TraitError>;
}

impl<L: AssetLedger + ?Sized> AssetLedger for Arc<L> {
    fn balance_of(&self, asset: &AssetId, party: &PartyId) -> Amount {
        (**self).balance_of(asset, party)
    }

    fn allowance(&self, asset: &AssetId, owner: &PartyId, spender: &PartyId) -> Amount {
        (**self).allowance(asset, owner, spender)
    }

    fn approve(
        &self,
        asset: &AssetId,
        owner: &PartyId,
        spender: &PartyId,
        amount: Amount,
    ) -> Result<(), TraitError> {
        (**self).approve(asset, owner, spender, amount)
    }

    fn check(&self, transfers: &[Transfer]) -> Result<(), TraitError> {
        (**self).check(transfers)
    }

    fn execute(&self, transfers: &[Transfer]) -> Result<(), TraitError> {
        (**self).execute(transfers)
    }
}

type BalanceKey = (AssetId, PartyId);
type AllowanceKey = (AssetId, PartyId, PartyId);

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<BalanceKey, Amount>,
    allowances: HashMap<AllowanceKey, Amount>,
}

impl LedgerState {
    fn balance(&self, asset: &AssetId, party: &PartyId) -> Amount {
        self.balances
            .get(&(asset.clone(), party.clone()))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    fn allowance(&self, asset: &AssetId, owner: &PartyId, spender: &PartyId) -> Amount {
        self.allowances
            .get(&(asset.clone(), owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Computes the post-batch balances and allowances of every touched key
    /// without writing them.
    fn plan(
        &self,
        transfers: &[Transfer],
    ) -> Result<(HashMap<BalanceKey, Amount>, HashMap<AllowanceKey, Amount>), TraitError> {
        let vault = PartyId::vault();
        let mut balances: HashMap<BalanceKey, Amount> = HashMap::new();
        let mut allowances: HashMap<AllowanceKey, Amount> = HashMap::new();

        for t in transfers {
            if !t.from.is_vault() {
                let key = (t.asset.clone(), t.from.clone(), vault.clone());
                let current = *allowances
                    .entry(key.clone())
                    .or_insert_with(|| self.allowance(&t.asset, &t.from, &vault));
                if current != Amount::MAX {
                    let remaining = current.checked_sub(t.amount).map_err(|_| {
                        TraitError::InsufficientAllowance {
                            asset: t.asset.clone(),
                            owner: t.from.clone(),
                            required: t.amount,
                            available: current,
                        }
                    })?;
                    allowances.insert(key, remaining);
                }
            }

            let from_key = (t.asset.clone(), t.from.clone());
            let from_balance = *balances
                .entry(from_key.clone())
                .or_insert_with(|| self.balance(&t.asset, &t.from));
            let debited =
                from_balance
                    .checked_sub(t.amount)
                    .map_err(|_| TraitError::InsufficientBalance {
                        asset: t.asset.clone(),
                        party: t.from.clone(),
                        required: t.amount,
                        available: from_balance,
                    })?;
            balances.insert(from_key, debited);

            let to_key = (t.asset.clone(), t.to.clone());
            let to_balance = *balances
                .entry(to_key.clone())
                .or_insert_with(|| self.balance(&t.asset, &t.to));
            let credited = to_balance
                .checked_add(t.amount)
                .map_err(|_| TraitError::Overflow(t.asset.clone()))?;
            balances.insert(to_key, credited);
        }

        Ok((balances, allowances))
    }
}

/// An in-memory ledger.
///
/// Clones share the same books, so tests can keep a handle for inspecting
/// balances after moving a clone into the engine. An allowance of
/// [`Amount::MAX`] is treated as unlimited and never decremented.
///
/// # Example
///
/// ```rust
/// use arbor_core::{Amount, AssetId, PartyId};
/// use arbor_traits::{AssetLedger, InMemoryLedger, Transfer};
///
/// let ledger = InMemoryLedger::new();
/// let usdc = AssetId::new("USDC");
/// let alice = PartyId::new("alice");
/// ledger.mint(&usdc, &alice, Amount::new(100)).unwrap();
/// ledger.approve(&usdc, &alice, &PartyId::vault(), Amount::MAX).unwrap();
///
/// let pull = Transfer::new(usdc.clone(), alice.clone(), PartyId::vault(), Amount::new(40));
/// ledger.execute(&[pull]).unwrap();
/// assert_eq!(ledger.balance_of(&usdc, &alice), Amount::new(60));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits newly issued funds to a party.
    pub fn mint(&self, asset: &AssetId, party: &PartyId, amount: Amount) -> Result<(), TraitError> {
        let mut state = self.state.write();
        let balance = state.balance(asset, party);
        let credited = balance
            .checked_add(amount)
            .map_err(|_| TraitError::Overflow(asset.clone()))?;
        state
            .balances
            .insert((asset.clone(), party.clone()), credited);
        Ok(())
    }

    /// Mints `amount` to `party` and grants the engine an unlimited allowance.
    pub fn fund(&self, asset: &AssetId, party: &PartyId, amount: Amount) -> Result<(), TraitError> {
        self.mint(asset, party, amount)?;
        self.approve(asset, party, &PartyId::vault(), Amount::MAX)
    }

    /// All non-zero balances, ordered by asset then party.
    pub fn snapshot(&self) -> Vec<(AssetId, PartyId, Amount)> {
        let state = self.state.read();
        let ordered: BTreeMap<&BalanceKey, &Amount> = state
            .balances
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .collect();
        ordered
            .into_iter()
            .map(|((asset, party), amount)| (asset.clone(), party.clone(), *amount))
            .collect()
    }
}

impl AssetLedger for InMemoryLedger {
    fn balance_of(&self, asset: &AssetId, party: &PartyId) -> Amount {
        self.state.read().balance(asset, party)
    }

    fn allowance(&self, asset: &AssetId, owner: &PartyId, spender: &PartyId) -> Amount {
        self.state.read().allowance(asset, owner, spender)
    }

    fn approve(
        &self,
        asset: &AssetId,
        owner: &PartyId,
        spender: &PartyId,
        amount: Amount,
    ) -> Result<(), TraitError> {
        if owner == spender {
            return Err(TraitError::InvalidInput(format!(
                "{owner} cannot approve itself"
            )));
        }
        self.state
            .write()
            .allowances
            .insert((asset.clone(), owner.clone(), spender.clone()), amount);
        Ok(())
    }

    fn check(&self, transfers: &[Transfer]) -> Result<(), TraitError> {
        self.state.read().plan(transfers).map(|_| ())
    }

    fn execute(&self, transfers: &[Transfer]) -> Result<(), TraitError> {
        let mut state = self.state.write();
        let (balances, allowances) = state.plan(transfers)?;
        state.balances.extend(balances);
        state.allowances.extend(allowances);
        Ok(())
    }
}
