//! The option engine.
//!
//! [`OptionEngine`] ties the asset registry, option registry, premium
//! calculator and settlement waterfall to the injected collaborators. Every
//! public operation follows the same order: validate, dry-run the ledger
//! transfers, mutate the registry, then execute the transfers. A transfer
//! failure after the mutation restores the previous records, so an operation
//! either applies completely or leaves no trace.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use arbor_config::{EngineConfig, MaturityPolicy};
use arbor_core::{
    Amount, ArborError, ArborResult, AssetId, AssetSpec, OptionId, OptionRecord, OptionType,
    PartyId, Settlement, Timestamp,
};
use arbor_traits::{AssetLedger, Clock, PriceSource, TraitError, Transfer};

use crate::asset_registry::AssetRegistry;
use crate::premium::PremiumCalculator;
use crate::registry::OptionRegistry;
use crate::settlement::Waterfall;

/// Parameters of a root option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootOptionRequest {
    /// Underlying asset; also the collateral asset.
    pub base_asset: AssetId,
    /// Strike in the base asset's native scale.
    pub strike: Amount,
    /// Settlement date; must be in the future.
    pub maturity: Timestamp,
    /// Asking price of the option.
    pub premium: Amount,
    /// Asset the premium is paid in.
    pub premium_token: AssetId,
    /// Call or put.
    pub option_type: OptionType,
}

impl RootOptionRequest {
    /// Creates a request.
    pub fn new(
        base_asset: impl Into<AssetId>,
        strike: Amount,
        maturity: Timestamp,
        premium: Amount,
        premium_token: impl Into<AssetId>,
        option_type: OptionType,
    ) -> Self {
        Self {
            base_asset: base_asset.into(),
            strike,
            maturity,
            premium,
            premium_token: premium_token.into(),
            option_type,
        }
    }
}

/// How to undo a registry mutation when the ledger rejects its transfers.
enum Undo {
    /// Remove this many freshly inserted records.
    Pop(usize),
    /// Put these records back.
    Restore(Vec<OptionRecord>),
}

/// Maps a ledger shortfall to a domain error; other failures stay
/// collaborator errors.
fn shortfall_or(err: TraitError, shortfall: impl FnOnce(&AssetId) -> ArborError) -> ArborError {
    match err.shortfall_asset() {
        Some(asset) => shortfall(asset),
        None => err.into(),
    }
}

/// Layered option engine.
///
/// # Example
///
/// ```rust
/// use arbor_core::{Amount, AssetSpec, OptionType, PartyId, Timestamp};
/// use arbor_engine::{OptionEngineBuilder, RootOptionRequest};
/// use arbor_traits::{FixedPriceSource, InMemoryLedger, ManualClock};
///
/// let start = Timestamp::from_secs(1_700_000_000);
/// let clock = ManualClock::new(start);
/// let ledger = InMemoryLedger::new();
/// let mut engine = OptionEngineBuilder::new()
///     .with_clock(clock.clone())
///     .with_price_source(FixedPriceSource::new())
///     .with_ledger(ledger.clone())
///     .with_asset(AssetSpec::new("WBTC", 8))
///     .build()
///     .unwrap();
///
/// let alice = PartyId::new("alice");
/// ledger.fund(&"WBTC".into(), &alice, Amount::new(10_000)).unwrap();
///
/// let request = RootOptionRequest::new(
///     "WBTC",
///     Amount::new(5_000),
///     start.plus_days(30),
///     Amount::new(10),
///     "WBTC",
///     OptionType::Call,
/// );
/// let id = engine.create_root_option(&alice, request).unwrap();
/// assert_eq!(engine.get_option(id).unwrap().holder, alice);
/// ```
pub struct OptionEngine {
    config: EngineConfig,
    premiums: PremiumCalculator,
    assets: AssetRegistry,
    options: OptionRegistry,
    clock: Arc<dyn Clock>,
    prices: Arc<dyn PriceSource>,
    ledger: Arc<dyn AssetLedger>,
}

impl fmt::Debug for OptionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionEngine")
            .field("config", &self.config.name)
            .field("assets", &self.assets.len())
            .field("options", &self.options.len())
            .finish_non_exhaustive()
    }
}

impl OptionEngine {
    /// Creates an engine with no supported assets and no options.
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        prices: Arc<dyn PriceSource>,
        ledger: Arc<dyn AssetLedger>,
    ) -> Self {
        info!("Creating option engine: {}", config.name);
        Self {
            premiums: PremiumCalculator::new(&config),
            config,
            assets: AssetRegistry::new(),
            options: OptionRegistry::new(),
            clock,
            prices,
            ledger,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current clock reading.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// The ledger funds move through.
    pub fn ledger(&self) -> &dyn AssetLedger {
        self.ledger.as_ref()
    }

    /// Asset whitelist.
    pub fn assets(&self) -> &AssetRegistry {
        &self.assets
    }

    /// Option store.
    pub fn options(&self) -> &OptionRegistry {
        &self.options
    }

    // =========================================================================
    // Assets
    // =========================================================================

    /// Marks an asset usable as an underlying or premium token. Idempotent.
    pub fn add_supported_asset(&mut self, spec: AssetSpec) -> ArborResult<()> {
        let id = spec.id.clone();
        let decimals = spec.decimals;
        if self.assets.add_supported_asset(spec)? {
            info!("Added supported asset {} ({} decimals)", id, decimals);
        }
        Ok(())
    }

    /// Returns true if the asset is supported.
    pub fn is_supported(&self, asset: &AssetId) -> bool {
        self.assets.is_supported(asset)
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates a root option and locks its collateral from `writer`.
    pub fn create_root_option(
        &mut self,
        writer: &PartyId,
        request: RootOptionRequest,
    ) -> ArborResult<OptionId> {
        let ids = self.create_roots(writer, vec![request])?;
        ids.into_iter()
            .next()
            .ok_or_else(|| ArborError::invalid_parameter("no option was created"))
    }

    /// Creates a root option priced by [`calculate_parent_premium`](Self::calculate_parent_premium),
    /// with the premium paid in the base asset.
    pub fn create_layered_option(
        &mut self,
        writer: &PartyId,
        base_asset: &AssetId,
        strike: Amount,
        maturity: Timestamp,
        option_type: OptionType,
    ) -> ArborResult<OptionId> {
        let premium = self.calculate_parent_premium(base_asset, strike, maturity, option_type)?;
        let request = RootOptionRequest::new(
            base_asset.clone(),
            strike,
            maturity,
            premium,
            base_asset.clone(),
            option_type,
        );
        self.create_root_option(writer, request)
    }

    /// Creates several root options for one writer. Either every option is
    /// created or none is, including when the writer cannot cover the
    /// combined collateral.
    pub fn batch_create_options(
        &mut self,
        writer: &PartyId,
        requests: Vec<RootOptionRequest>,
    ) -> ArborResult<Vec<OptionId>> {
        if requests.is_empty() {
            return Err(ArborError::invalid_parameter("batch must contain at least one option"));
        }
        self.create_roots(writer, requests)
    }

    fn create_roots(
        &mut self,
        writer: &PartyId,
        requests: Vec<RootOptionRequest>,
    ) -> ArborResult<Vec<OptionId>> {
        if writer.is_vault() {
            return Err(ArborError::invalid_parameter("the engine vault cannot write options"));
        }
        let now = self.clock.now();

        let mut collateral = Vec::with_capacity(requests.len());
        let mut totals: BTreeMap<AssetId, Amount> = BTreeMap::new();
        for request in &requests {
            let amount = self.validate_root(request, now)?;
            let total = totals.entry(request.base_asset.clone()).or_insert(Amount::ZERO);
            *total = total.checked_add(amount)?;
            collateral.push(amount);
        }

        let vault = PartyId::vault();
        let transfers: Vec<Transfer> = totals
            .iter()
            .map(|(asset, amount)| {
                Transfer::new(asset.clone(), writer.clone(), vault.clone(), *amount)
            })
            .collect();
        self.check_transfers(&transfers, |asset| ArborError::InsufficientCollateral {
            party: writer.clone(),
            asset: asset.clone(),
            required: totals.get(asset).copied().unwrap_or(Amount::ZERO),
        })?;

        let mut ids = Vec::with_capacity(requests.len());
        for (request, collateral_locked) in requests.into_iter().zip(collateral) {
            let record = OptionRecord {
                id: self.options.next_id(),
                base_asset: request.base_asset,
                strike_price: request.strike,
                maturity: request.maturity,
                premium: request.premium,
                premium_token: request.premium_token,
                parent_id: OptionId::NONE,
                option_type: request.option_type,
                writer: writer.clone(),
                holder: writer.clone(),
                collateral_locked,
                is_settled: false,
                created_at: now,
                settlement: None,
            };
            match self.options.insert(record) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    self.rollback(Undo::Pop(ids.len()));
                    return Err(e);
                }
            }
        }
        self.apply_transfers(&transfers, Undo::Pop(ids.len()))?;

        for id in &ids {
            if let Ok(record) = self.options.get(*id) {
                info!(
                    "Created root option {}: {} {} strike {} maturity {} collateral {}",
                    id,
                    record.option_type,
                    record.base_asset,
                    record.strike_price,
                    record.maturity,
                    record.collateral_locked
                );
            }
        }
        Ok(ids)
    }

    /// Validates a root request and returns the collateral it requires.
    fn validate_root(&self, request: &RootOptionRequest, now: Timestamp) -> ArborResult<Amount> {
        let decimals = self.assets.decimals(&request.base_asset)?;
        self.assets.asset_spec(&request.premium_token)?;
        if request.maturity <= now {
            return Err(ArborError::invalid_maturity(
                request.maturity,
                format!("must be after the current time {now}"),
            ));
        }
        if request.strike.is_zero() {
            return Err(ArborError::invalid_parameter("strike must be positive"));
        }
        if request.premium.is_zero() {
            return Err(ArborError::invalid_parameter("premium must be positive"));
        }
        let collateral = self.premiums.collateral_required(request.strike, decimals)?;
        if collateral.is_zero() {
            return Err(ArborError::invalid_parameter(format!(
                "strike {} requires no collateral at contract size {}",
                request.strike,
                self.premiums.contract_size()
            )));
        }
        Ok(collateral)
    }

    /// Layers a child option on a parent held by `caller`.
    ///
    /// The child inherits the parent's underlying, type and collateral bound,
    /// and its strike must lie strictly beyond the parent's. The caller pays
    /// the child premium to the root writer and becomes the child's writer
    /// and holder.
    ///
    /// The payee is the root writer because the root's locked collateral is
    /// the only pool any layer is ever paid from. The child's payoff is
    /// carved out of its parent holder's share at settlement, so the
    /// writer's exposure stays at the posted collateral while the premium
    /// prices the extra claim written against it.
    pub fn create_child_option(
        &mut self,
        caller: &PartyId,
        parent_id: OptionId,
        child_strike: Amount,
        child_maturity: Option<Timestamp>,
    ) -> ArborResult<OptionId> {
        let now = self.clock.now();
        let parent = self.options.get(parent_id)?.clone();

        if parent.holder != *caller {
            return Err(ArborError::NotParentHolder {
                parent_id,
                caller: caller.clone(),
            });
        }
        let root = self.options.get(self.options.root_of(parent_id)?)?.clone();
        if parent.is_settled {
            return Err(ArborError::AlreadySettled { option_id: parent_id });
        }
        if root.is_settled {
            return Err(ArborError::AlreadySettled { option_id: root.id });
        }
        if parent.is_matured(now) {
            return Err(ArborError::invalid_maturity(
                parent.maturity,
                "the parent option has matured",
            ));
        }

        let maturity = self.resolve_child_maturity(&parent, root.maturity, child_maturity, now)?;
        if !parent
            .option_type
            .is_valid_child_strike(parent.strike_price, child_strike)
        {
            return Err(ArborError::StrikeOrderViolation {
                option_type: parent.option_type,
                parent_strike: parent.strike_price,
                child_strike,
            });
        }
        if child_strike.is_zero() {
            return Err(ArborError::invalid_parameter("strike must be positive"));
        }

        let premium_token = self.child_premium_token(&parent);
        let premium = self.child_premium(&parent, child_strike, maturity, &premium_token, now)?;

        let transfers = if root.writer == *caller {
            Vec::new()
        } else {
            vec![Transfer::new(
                premium_token.clone(),
                caller.clone(),
                root.writer.clone(),
                premium,
            )]
        };
        self.check_transfers(&transfers, |asset| ArborError::InsufficientPremiumBalance {
            party: caller.clone(),
            asset: asset.clone(),
            required: premium,
        })?;

        let record = OptionRecord {
            id: self.options.next_id(),
            base_asset: parent.base_asset.clone(),
            strike_price: child_strike,
            maturity,
            premium,
            premium_token,
            parent_id,
            option_type: parent.option_type,
            writer: caller.clone(),
            holder: caller.clone(),
            collateral_locked: parent.collateral_locked,
            is_settled: false,
            created_at: now,
            settlement: None,
        };
        let id = self.options.insert(record)?;
        self.apply_transfers(&transfers, Undo::Pop(1))?;

        info!(
            "Created child option {} under {}: strike {} maturity {} premium {}",
            id, parent_id, child_strike, maturity, premium
        );
        Ok(id)
    }

    fn resolve_child_maturity(
        &self,
        parent: &OptionRecord,
        root_maturity: Timestamp,
        requested: Option<Timestamp>,
        now: Timestamp,
    ) -> ArborResult<Timestamp> {
        match (self.config.maturity_policy, requested) {
            (MaturityPolicy::Inherit, None) => Ok(root_maturity),
            (MaturityPolicy::Inherit, Some(m)) if m == root_maturity => Ok(m),
            (MaturityPolicy::Inherit, Some(m)) => Err(ArborError::invalid_maturity(
                m,
                format!("children inherit the root maturity {root_maturity}"),
            )),
            (MaturityPolicy::Explicit, None) => Ok(parent.maturity),
            (MaturityPolicy::Explicit, Some(m)) if m <= now => Err(ArborError::invalid_maturity(
                m,
                format!("must be after the current time {now}"),
            )),
            (MaturityPolicy::Explicit, Some(m)) if m > parent.maturity => {
                Err(ArborError::invalid_maturity(
                    m,
                    format!("must not be after the parent maturity {}", parent.maturity),
                ))
            }
            (MaturityPolicy::Explicit, Some(m)) => Ok(m),
        }
    }

    fn child_premium_token(&self, parent: &OptionRecord) -> AssetId {
        self.config
            .settlement_asset
            .clone()
            .unwrap_or_else(|| parent.premium_token.clone())
    }

    fn child_premium(
        &self,
        parent: &OptionRecord,
        child_strike: Amount,
        maturity: Timestamp,
        premium_token: &AssetId,
        now: Timestamp,
    ) -> ArborResult<Amount> {
        let strike_decimals = self.assets.decimals(&parent.base_asset)?;
        let premium_decimals = self.assets.decimals(premium_token)?;
        self.premiums.child_premium(
            parent.strike_price,
            child_strike,
            strike_decimals,
            premium_decimals,
            now.years_until(maturity),
        )
    }

    // =========================================================================
    // Ownership
    // =========================================================================

    /// Hands an option to another party.
    pub fn transfer(&mut self, caller: &PartyId, id: OptionId, to: &PartyId) -> ArborResult<()> {
        let record = self.options.get(id)?;
        if record.holder != *caller {
            return Err(ArborError::NotOptionHolder {
                option_id: id,
                caller: caller.clone(),
            });
        }
        if record.is_settled {
            return Err(ArborError::AlreadySettled { option_id: id });
        }
        if to.is_vault() {
            return Err(ArborError::invalid_parameter("options cannot be sent to the engine vault"));
        }

        self.options.get_mut(id)?.holder = to.clone();
        info!("Transferred option {} from {} to {}", id, caller, to);
        Ok(())
    }

    /// Buys an option from its current holder at its listed premium.
    ///
    /// The writer is unchanged; only the claim moves.
    pub fn purchase_option(&mut self, buyer: &PartyId, id: OptionId) -> ArborResult<()> {
        let now = self.clock.now();
        let record = self.options.get(id)?.clone();
        if record.is_settled {
            return Err(ArborError::AlreadySettled { option_id: id });
        }
        if record.is_matured(now) {
            return Err(ArborError::invalid_maturity(
                record.maturity,
                "matured options cannot be purchased",
            ));
        }
        if record.holder == *buyer {
            return Err(ArborError::invalid_parameter(format!(
                "{buyer} already holds option {id}"
            )));
        }
        if buyer.is_vault() {
            return Err(ArborError::invalid_parameter("the engine vault cannot buy options"));
        }

        let transfers = vec![Transfer::new(
            record.premium_token.clone(),
            buyer.clone(),
            record.holder.clone(),
            record.premium,
        )];
        self.check_transfers(&transfers, |asset| ArborError::InsufficientPremiumBalance {
            party: buyer.clone(),
            asset: asset.clone(),
            required: record.premium,
        })?;

        self.options.get_mut(id)?.holder = buyer.clone();
        self.apply_transfers(&transfers, Undo::Restore(vec![record.clone()]))?;

        info!(
            "Option {} purchased by {} from {} for {} {}",
            id, buyer, record.holder, record.premium, record.premium_token
        );
        Ok(())
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Collateral a writer posts for a root option.
    pub fn calculate_collateral_required(
        &self,
        asset: &AssetId,
        strike: Amount,
        option_type: OptionType,
    ) -> ArborResult<Amount> {
        let decimals = self.assets.decimals(asset)?;
        let collateral = self.premiums.collateral_required(strike, decimals)?;
        debug!("collateral for {} {} strike {}: {}", option_type, asset, strike, collateral);
        Ok(collateral)
    }

    /// Baseline premium of a root option maturing at `maturity`.
    pub fn calculate_parent_premium(
        &self,
        asset: &AssetId,
        strike: Amount,
        maturity: Timestamp,
        option_type: OptionType,
    ) -> ArborResult<Amount> {
        let decimals = self.assets.decimals(asset)?;
        let years = self.clock.now().years_until(maturity);
        let premium = self.premiums.parent_premium(strike, decimals, years)?;
        debug!("parent premium for {} {} strike {}: {}", option_type, asset, strike, premium);
        Ok(premium)
    }

    /// Premium a child at `child_strike` would cost under `parent_id`.
    ///
    /// The maturity resolves as it would at creation. Strike ordering is not
    /// checked, so quotes are available on both sides of the parent.
    pub fn calculate_child_premium(
        &self,
        parent_id: OptionId,
        child_strike: Amount,
        child_maturity: Option<Timestamp>,
    ) -> ArborResult<Amount> {
        let now = self.clock.now();
        let parent = self.options.get(parent_id)?;
        let root = self.options.get(self.options.root_of(parent_id)?)?;
        let maturity = self.resolve_child_maturity(parent, root.maturity, child_maturity, now)?;
        let premium_token = self.child_premium_token(parent);
        self.child_premium(parent, child_strike, maturity, &premium_token, now)
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Settles one matured option.
    ///
    /// A root fixes the spot price of its tree; a child settles at its
    /// root's fixing once its parent has settled. The writer's unused
    /// collateral is released immediately; holder proceeds stay escrowed
    /// until [`claim_settlement`](Self::claim_settlement).
    pub fn settle_option(&mut self, id: OptionId) -> ArborResult<Settlement> {
        let now = self.clock.now();
        let record = self.options.get(id)?;
        if !record.is_matured(now) {
            return Err(ArborError::NotYetMatured {
                option_id: id,
                maturity: record.maturity,
                now,
            });
        }
        if record.is_settled {
            return Err(ArborError::AlreadySettled { option_id: id });
        }
        self.ensure_parent_settled(record)?;

        let waterfall = self.waterfall_for(id)?;
        let mut settled = self.settle_nodes(&[id], &waterfall, now, false)?;
        settled
            .pop()
            .ok_or_else(|| ArborError::invalid_parameter("no option was settled"))
    }

    /// Settles an option and every unsettled descendant, parent before child
    /// and siblings by ascending id. Already settled nodes are skipped.
    /// Returns the ids settled, in order.
    pub fn settle_option_tree(&mut self, id: OptionId) -> ArborResult<Vec<OptionId>> {
        let now = self.clock.now();
        let pending: Vec<OptionId> = self
            .options
            .subtree(id)?
            .into_iter()
            .filter(|n| self.options.get(*n).is_ok_and(|r| !r.is_settled))
            .collect();
        if pending.is_empty() {
            return Ok(pending);
        }

        let pending_set: BTreeSet<OptionId> = pending.iter().copied().collect();
        for node in &pending {
            let record = self.options.get(*node)?;
            if !record.is_matured(now) {
                return Err(ArborError::NotYetMatured {
                    option_id: *node,
                    maturity: record.maturity,
                    now,
                });
            }
            if !pending_set.contains(&record.parent_id) {
                self.ensure_parent_settled(record)?;
            }
        }

        let waterfall = self.waterfall_for(id)?;
        self.settle_nodes(&pending, &waterfall, now, false)?;
        info!("Settled {} option(s) in the tree of {}", pending.len(), waterfall.root());
        Ok(pending)
    }

    /// Pays escrowed settlement proceeds to the holder. Returns the amount
    /// paid, in the base asset; a zero payout still marks the claim.
    pub fn claim_settlement(&mut self, caller: &PartyId, id: OptionId) -> ArborResult<Amount> {
        let record = self.options.get(id)?.clone();
        let settlement = match (&record.settlement, record.is_settled) {
            (Some(settlement), true) => settlement,
            _ => return Err(ArborError::NotSettled { option_id: id }),
        };
        if record.holder != *caller {
            return Err(ArborError::NotOptionHolder {
                option_id: id,
                caller: caller.clone(),
            });
        }
        if settlement.claimed {
            return Err(ArborError::AlreadyClaimed { option_id: id });
        }

        let amount = settlement.holder_proceeds;
        let transfers = if amount.is_zero() {
            Vec::new()
        } else {
            vec![Transfer::new(
                record.base_asset.clone(),
                PartyId::vault(),
                caller.clone(),
                amount,
            )]
        };
        self.check_transfers(&transfers, |_| {
            ArborError::collaborator(format!("engine vault cannot pay settlement of option {id}"))
        })?;

        if let Some(s) = self.options.get_mut(id)?.settlement.as_mut() {
            s.claimed = true;
        }
        self.apply_transfers(&transfers, Undo::Restore(vec![record.clone()]))?;

        info!("Option {} claimed by {}: {} {}", id, caller, amount, record.base_asset);
        Ok(amount)
    }

    /// Gross payoff of a root option if its tree settled at `spot`.
    pub fn calculate_parent_profit(&self, id: OptionId, spot: Amount) -> ArborResult<Amount> {
        if !self.options.get(id)?.is_root() {
            return Err(ArborError::invalid_parameter(format!(
                "option {id} is a child, use calculate_child_profit"
            )));
        }
        Ok(Waterfall::compute(&self.options, id, spot)?.payout(id)?.gross)
    }

    /// Gross payoff of a child option if its tree settled at `spot`, after
    /// the waterfall through its ancestors and earlier siblings.
    pub fn calculate_child_profit(&self, id: OptionId, spot: Amount) -> ArborResult<Amount> {
        if self.options.get(id)?.is_root() {
            return Err(ArborError::invalid_parameter(format!(
                "option {id} is a root, use calculate_parent_profit"
            )));
        }
        let root = self.options.root_of(id)?;
        Ok(Waterfall::compute(&self.options, root, spot)?.payout(id)?.gross)
    }

    /// Legacy settle-and-claim at the current spot, without the maturity
    /// gate. Only available when `allow_legacy_exercise` is configured.
    /// Returns the amount paid to the holder.
    pub fn exercise_option(&mut self, caller: &PartyId, id: OptionId) -> ArborResult<Amount> {
        if !self.config.allow_legacy_exercise {
            warn!("Rejected legacy exercise of option {} by {}", id, caller);
            return Err(ArborError::LegacyExerciseDisabled);
        }
        let now = self.clock.now();
        let record = self.options.get(id)?;
        if record.holder != *caller {
            return Err(ArborError::NotOptionHolder {
                option_id: id,
                caller: caller.clone(),
            });
        }
        if record.is_settled {
            return Err(ArborError::AlreadySettled { option_id: id });
        }
        self.ensure_parent_settled(record)?;

        let waterfall = self.waterfall_for(id)?;
        let settled = self.settle_nodes(&[id], &waterfall, now, true)?;
        let paid = settled
            .first()
            .map(|s| s.holder_proceeds)
            .unwrap_or(Amount::ZERO);
        warn!("Option {} exercised through the legacy path, paid {}", id, paid);
        Ok(paid)
    }

    fn ensure_parent_settled(&self, record: &OptionRecord) -> ArborResult<()> {
        if record.is_root() {
            return Ok(());
        }
        if self.options.get(record.parent_id)?.is_settled {
            Ok(())
        } else {
            Err(ArborError::ParentNotSettled {
                option_id: record.id,
                parent_id: record.parent_id,
            })
        }
    }

    /// Waterfall of the tree containing `id`, at the root's recorded fixing
    /// or, for an unsettled root, at the current spot.
    fn waterfall_for(&self, id: OptionId) -> ArborResult<Waterfall> {
        let root_id = self.options.root_of(id)?;
        let root = self.options.get(root_id)?;
        let price = match &root.settlement {
            Some(settlement) => settlement.settlement_price,
            None => self.prices.get_price(&root.base_asset)?,
        };
        debug!("settlement fixing for tree {}: {}", root_id, price);
        Waterfall::compute(&self.options, root_id, price)
    }

    fn settle_nodes(
        &mut self,
        ids: &[OptionId],
        waterfall: &Waterfall,
        now: Timestamp,
        claim: bool,
    ) -> ArborResult<Vec<Settlement>> {
        let vault = PartyId::vault();
        let mut previous = Vec::with_capacity(ids.len());
        let mut settlements = Vec::with_capacity(ids.len());
        let mut transfers = Vec::new();

        for id in ids {
            let record = self.options.get(*id)?;
            let payout = waterfall.payout(*id)?;
            let writer_proceeds = if record.is_root() {
                record.collateral_locked.checked_sub(payout.gross)?
            } else {
                Amount::ZERO
            };
            if !writer_proceeds.is_zero() {
                transfers.push(Transfer::new(
                    record.base_asset.clone(),
                    vault.clone(),
                    record.writer.clone(),
                    writer_proceeds,
                ));
            }
            if claim && !payout.holder.is_zero() {
                transfers.push(Transfer::new(
                    record.base_asset.clone(),
                    vault.clone(),
                    record.holder.clone(),
                    payout.holder,
                ));
            }
            debug!(
                "option {}: gross {} holder {} writer {}",
                id, payout.gross, payout.holder, writer_proceeds
            );
            settlements.push(Settlement {
                settlement_price: waterfall.price(),
                gross_payoff: payout.gross,
                holder_proceeds: payout.holder,
                writer_proceeds,
                settled_at: now,
                claimed: claim,
            });
            previous.push(record.clone());
        }

        self.check_transfers(&transfers, |asset| {
            ArborError::collaborator(format!("engine vault is short of {asset}"))
        })?;

        for (id, settlement) in ids.iter().zip(&settlements) {
            let record = self.options.get_mut(*id)?;
            record.is_settled = true;
            record.settlement = Some(settlement.clone());
        }
        self.apply_transfers(&transfers, Undo::Restore(previous))?;

        for (id, settlement) in ids.iter().zip(&settlements) {
            info!(
                "Settled option {} at {}: holder {} writer {}",
                id, settlement.settlement_price, settlement.holder_proceeds, settlement.writer_proceeds
            );
        }
        Ok(settlements)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Looks up an option.
    pub fn get_option(&self, id: OptionId) -> ArborResult<&OptionRecord> {
        self.options.get(id)
    }

    /// Direct children of an option, in ascending id order.
    pub fn get_option_children(&self, id: OptionId) -> ArborResult<&[OptionId]> {
        self.options.children(id)
    }

    /// Returns true once the option has reached maturity.
    pub fn is_option_matured(&self, id: OptionId) -> ArborResult<bool> {
        Ok(self.options.get(id)?.is_matured(self.clock.now()))
    }

    /// Alias of [`is_option_matured`](Self::is_option_matured).
    pub fn is_option_expired(&self, id: OptionId) -> ArborResult<bool> {
        self.is_option_matured(id)
    }

    /// Root-most ancestor of an option.
    pub fn root_of(&self, id: OptionId) -> ArborResult<OptionId> {
        self.options.root_of(id)
    }

    /// The option and its descendants, parent before child.
    pub fn subtree(&self, id: OptionId) -> ArborResult<Vec<OptionId>> {
        self.options.subtree(id)
    }

    /// Number of options created.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Returns true if no option has been created.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    // =========================================================================
    // Ledger plumbing
    // =========================================================================

    fn check_transfers(
        &self,
        transfers: &[Transfer],
        shortfall: impl FnOnce(&AssetId) -> ArborError,
    ) -> ArborResult<()> {
        if transfers.is_empty() {
            return Ok(());
        }
        self.ledger
            .check(transfers)
            .map_err(|e| shortfall_or(e, shortfall))
    }

    fn apply_transfers(&mut self, transfers: &[Transfer], undo: Undo) -> ArborResult<()> {
        if transfers.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.ledger.execute(transfers) {
            warn!("Ledger rejected a checked batch, rolling back: {}", e);
            self.rollback(undo);
            return Err(e.into());
        }
        Ok(())
    }

    fn rollback(&mut self, undo: Undo) {
        match undo {
            Undo::Pop(count) => {
                for _ in 0..count {
                    self.options.pop();
                }
            }
            Undo::Restore(records) => {
                for record in records {
                    if let Ok(slot) = self.options.get_mut(record.id) {
                        *slot = record;
                    }
                }
            }
        }
    }
}
