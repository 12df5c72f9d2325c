//! Settlement waterfall.
//!
//! A tree settles at a single price fixing. The root's gross payoff is its
//! intrinsic value clamped to the posted collateral. Each node's gross payoff
//! is then split among its children in ascending id order: a child receives
//! its intrinsic value, clamped to what its parent has left after the earlier
//! siblings. Whatever a node keeps after its children is the holder's share.
//!
//! Summed over a tree, holder shares equal the root's gross payoff, so the
//! payouts of a whole tree never exceed the root collateral.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use arbor_core::{Amount, ArborError, ArborResult, OptionId};

use crate::registry::OptionRegistry;

/// One node's share of a waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Payoff before the node's children carve out their shares.
    pub gross: Amount,
    /// Left for the holder after the children.
    pub holder: Amount,
}

/// Payouts of every node of one tree at one price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waterfall {
    root: OptionId,
    price: Amount,
    payouts: BTreeMap<OptionId, Payout>,
}

impl Waterfall {
    /// Distributes the payoff of the tree rooted at `root` at `price`.
    pub fn compute(registry: &OptionRegistry, root: OptionId, price: Amount) -> ArborResult<Self> {
        let root_record = registry.get(root)?;
        if !root_record.is_root() {
            return Err(ArborError::invalid_parameter(format!(
                "option {root} is not the root of its tree"
            )));
        }

        let root_gross = root_record
            .intrinsic_value(price)
            .min(root_record.collateral_locked);

        let mut payouts = BTreeMap::new();
        let mut pending = vec![(root, root_gross)];
        while let Some((id, gross)) = pending.pop() {
            let mut remaining = gross;
            for &child in registry.children(id)? {
                let share = registry.get(child)?.intrinsic_value(price).min(remaining);
                remaining = remaining.checked_sub(share)?;
                pending.push((child, share));
            }
            payouts.insert(
                id,
                Payout {
                    gross,
                    holder: remaining,
                },
            );
        }

        Ok(Self {
            root,
            price,
            payouts,
        })
    }

    /// Root of the tree.
    pub fn root(&self) -> OptionId {
        self.root
    }

    /// Price the tree settled at.
    pub fn price(&self) -> Amount {
        self.price
    }

    /// Payout of one node.
    pub fn payout(&self, id: OptionId) -> ArborResult<Payout> {
        self.payouts
            .get(&id)
            .copied()
            .ok_or_else(|| ArborError::not_found(id))
    }

    /// Payouts in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (OptionId, Payout)> + '_ {
        self.payouts.iter().map(|(id, payout)| (*id, *payout))
    }

    /// Sum of every holder share.
    pub fn total_holder_proceeds(&self) -> ArborResult<Amount> {
        self.payouts
            .values()
            .try_fold(Amount::ZERO, |acc, p| acc.checked_add(p.holder))
    }
}
