//! End-to-end scenarios for the option engine.
//!
//! Each test drives a fresh engine through the public surface with a manual
//! clock, a settable price table and an in-memory ledger.

use arbor_config::{EngineConfig, MaturityPolicy};
use arbor_core::{
    Amount, ArborError, AssetId, AssetSpec, OptionId, OptionType, PartyId, Timestamp,
};
use arbor_engine::{OptionEngine, OptionEngineBuilder, RootOptionRequest};
use arbor_traits::{
    AssetLedger, FixedPriceSource, InMemoryLedger, ManualClock, TraitError, Transfer,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// =============================================================================
// TEST FIXTURES
// =============================================================================

const START: i64 = 1_700_000_000;

fn start() -> Timestamp {
    Timestamp::from_secs(START)
}

fn wbtc_id() -> AssetId {
    AssetId::new("WBTC")
}

fn usdc_id() -> AssetId {
    AssetId::new("USDC")
}

fn wbtc(units: Decimal) -> Amount {
    Amount::from_units(units, 8).unwrap()
}

fn usdc(units: Decimal) -> Amount {
    Amount::from_units(units, 6).unwrap()
}

fn party(name: &str) -> PartyId {
    PartyId::new(name)
}

fn id(value: u64) -> OptionId {
    OptionId::new(value)
}

struct Harness {
    engine: OptionEngine,
    clock: ManualClock,
    prices: FixedPriceSource,
    ledger: InMemoryLedger,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Engine with WBTC (8 decimals) and USDC (6 decimals); alice, bob and
    /// carol each hold a million of both.
    fn with_config(config: EngineConfig) -> Self {
        let ledger = InMemoryLedger::new();
        Self::with_ledger(config, ledger.clone(), ledger)
    }

    /// The engine talks to `engine_ledger`; `ledger` is the book behind it.
    fn with_ledger(
        config: EngineConfig,
        engine_ledger: impl AssetLedger + 'static,
        ledger: InMemoryLedger,
    ) -> Self {
        let clock = ManualClock::new(start());
        let prices = FixedPriceSource::new();
        let engine = OptionEngineBuilder::new()
            .with_config(config)
            .with_clock(clock.clone())
            .with_price_source(prices.clone())
            .with_ledger(engine_ledger)
            .with_asset(AssetSpec::new("WBTC", 8))
            .with_asset(AssetSpec::new("USDC", 6))
            .build()
            .unwrap();

        for name in ["alice", "bob", "carol"] {
            ledger
                .fund(&wbtc_id(), &party(name), wbtc(dec!(1_000_000)))
                .unwrap();
            ledger
                .fund(&usdc_id(), &party(name), usdc(dec!(1_000_000)))
                .unwrap();
        }

        Self {
            engine,
            clock,
            prices,
            ledger,
        }
    }

    fn maturity(&self) -> Timestamp {
        start().plus_days(30)
    }

    fn request(&self, option_type: OptionType, strike: Decimal) -> RootOptionRequest {
        RootOptionRequest::new(
            wbtc_id(),
            wbtc(strike),
            self.maturity(),
            wbtc(dec!(0.1)),
            wbtc_id(),
            option_type,
        )
    }

    fn root(&mut self, writer: &str, option_type: OptionType, strike: Decimal) -> OptionId {
        let request = self.request(option_type, strike);
        self.engine.create_root_option(&party(writer), request).unwrap()
    }

    fn child(&mut self, caller: &str, parent: OptionId, strike: Decimal) -> OptionId {
        self.engine
            .create_child_option(&party(caller), parent, wbtc(strike), None)
            .unwrap()
    }

    fn wbtc_balance(&self, name: &str) -> Amount {
        self.ledger.balance_of(&wbtc_id(), &party(name))
    }

    fn expire(&self) {
        self.clock.set(self.maturity());
    }
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn scenario_a_call_tree() {
    let mut h = Harness::new();

    let root = h.root("alice", OptionType::Call, dec!(50_000));
    assert_eq!(root, id(1));

    let child = h.child("alice", root, dec!(52_000));
    assert_eq!(child, id(2));
    let record = h.engine.get_option(child).unwrap();
    assert_eq!(record.parent_id, root);
    assert_eq!(record.maturity, h.maturity());

    let err = h
        .engine
        .create_child_option(&party("alice"), child, wbtc(dec!(51_000)), None)
        .unwrap_err();
    assert_eq!(
        err,
        ArborError::StrikeOrderViolation {
            option_type: OptionType::Call,
            parent_strike: wbtc(dec!(52_000)),
            child_strike: wbtc(dec!(51_000)),
        }
    );
    assert_eq!(h.engine.len(), 2);
}

#[test]
fn scenario_b_put_tree() {
    let mut h = Harness::new();

    let root = h.root("alice", OptionType::Put, dec!(40_000));
    assert_eq!(root, id(1));

    let err = h
        .engine
        .create_child_option(&party("alice"), root, wbtc(dec!(41_000)), None)
        .unwrap_err();
    assert!(matches!(err, ArborError::StrikeOrderViolation { .. }));

    let child = h.child("alice", root, dec!(38_000));
    let minimum = wbtc(h.engine.config().premium.min_child_premium);
    assert!(h.engine.get_option(child).unwrap().premium > minimum);
}

#[test]
fn scenario_c_settlement_is_maturity_gated() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(50_000));
    h.prices.set_price(wbtc_id(), wbtc(dec!(53_500)));

    assert_eq!(
        h.engine.settle_option(root),
        Err(ArborError::NotYetMatured {
            option_id: root,
            maturity: h.maturity(),
            now: start(),
        })
    );

    h.clock.advance_days(31);
    let settlement = h.engine.settle_option(root).unwrap();
    assert_eq!(settlement.gross_payoff, wbtc(dec!(3_500)));
    assert!(h.engine.get_option(root).unwrap().is_settled);

    assert_eq!(
        h.engine.settle_option(root),
        Err(ArborError::AlreadySettled { option_id: root })
    );
}

// =============================================================================
// CREATION
// =============================================================================

#[test]
fn root_option_round_trips() {
    let mut h = Harness::new();
    let request = RootOptionRequest::new(
        wbtc_id(),
        wbtc(dec!(30_000)),
        h.maturity(),
        usdc(dec!(250)),
        usdc_id(),
        OptionType::Put,
    );
    let root = h.engine.create_root_option(&party("bob"), request).unwrap();

    let record = h.engine.get_option(root).unwrap();
    assert_eq!(record.base_asset, wbtc_id());
    assert_eq!(record.strike_price, wbtc(dec!(30_000)));
    assert_eq!(record.maturity, h.maturity());
    assert_eq!(record.premium, usdc(dec!(250)));
    assert_eq!(record.premium_token, usdc_id());
    assert_eq!(record.option_type, OptionType::Put);
    assert_eq!(record.writer, party("bob"));
    assert_eq!(record.holder, party("bob"));
    assert_eq!(record.parent_id, OptionId::NONE);
    assert_eq!(record.collateral_locked, wbtc(dec!(30_000)));
    assert!(!record.is_settled);
    assert_eq!(record.created_at, start());

    assert_eq!(h.wbtc_balance("bob"), wbtc(dec!(970_000)));
    assert_eq!(
        h.ledger.balance_of(&wbtc_id(), &PartyId::vault()),
        wbtc(dec!(30_000))
    );
}

#[test]
fn root_creation_rejections() {
    let mut h = Harness::new();
    let alice = party("alice");

    let mut request = h.request(OptionType::Call, dec!(100));
    request.base_asset = AssetId::new("DOGE");
    assert_eq!(
        h.engine.create_root_option(&alice, request),
        Err(ArborError::AssetNotSupported {
            asset: AssetId::new("DOGE")
        })
    );

    let mut request = h.request(OptionType::Call, dec!(100));
    request.maturity = start();
    assert!(matches!(
        h.engine.create_root_option(&alice, request),
        Err(ArborError::InvalidMaturity { .. })
    ));

    let mut request = h.request(OptionType::Call, dec!(100));
    request.premium = Amount::ZERO;
    assert!(matches!(
        h.engine.create_root_option(&alice, request),
        Err(ArborError::InvalidParameter { .. })
    ));

    let request = h.request(OptionType::Call, dec!(100));
    assert_eq!(
        h.engine.create_root_option(&party("erin"), request),
        Err(ArborError::InsufficientCollateral {
            party: party("erin"),
            asset: wbtc_id(),
            required: wbtc(dec!(100)),
        })
    );

    assert!(h.engine.is_empty());
    assert_eq!(h.wbtc_balance("alice"), wbtc(dec!(1_000_000)));
}

#[test]
fn layered_option_uses_computed_premium() {
    let mut h = Harness::new();
    let maturity = h.maturity();
    let quote = h
        .engine
        .calculate_parent_premium(&wbtc_id(), wbtc(dec!(50_000)), maturity, OptionType::Call)
        .unwrap();

    let root = h
        .engine
        .create_layered_option(
            &party("alice"),
            &wbtc_id(),
            wbtc(dec!(50_000)),
            maturity,
            OptionType::Call,
        )
        .unwrap();
    let record = h.engine.get_option(root).unwrap();
    assert_eq!(record.premium, quote);
    assert_eq!(record.premium_token, wbtc_id());
}

#[test]
fn only_the_holder_layers_children() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));

    assert_eq!(
        h.engine
            .create_child_option(&party("bob"), root, wbtc(dec!(110)), None),
        Err(ArborError::NotParentHolder {
            parent_id: root,
            caller: party("bob"),
        })
    );

    h.engine
        .transfer(&party("alice"), root, &party("bob"))
        .unwrap();
    assert!(matches!(
        h.engine
            .create_child_option(&party("alice"), root, wbtc(dec!(110)), None),
        Err(ArborError::NotParentHolder { .. })
    ));
    let child = h.child("bob", root, dec!(110));
    assert_eq!(h.engine.get_option(child).unwrap().holder, party("bob"));
}

#[test]
fn child_premium_is_paid_to_the_root_writer() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));
    h.engine
        .transfer(&party("alice"), root, &party("bob"))
        .unwrap();

    let quote = h
        .engine
        .calculate_child_premium(root, wbtc(dec!(120)), None)
        .unwrap();
    let alice_before = h.wbtc_balance("alice");
    let bob_before = h.wbtc_balance("bob");

    let child = h.child("bob", root, dec!(120));
    let record = h.engine.get_option(child).unwrap();
    assert_eq!(record.premium, quote);
    assert_eq!(record.writer, party("bob"));
    assert_eq!(record.collateral_locked, wbtc(dec!(100)));

    assert_eq!(
        h.wbtc_balance("alice"),
        Amount::new(alice_before.raw() + quote.raw())
    );
    assert_eq!(
        h.wbtc_balance("bob"),
        Amount::new(bob_before.raw() - quote.raw())
    );
}

#[test]
fn child_premium_in_configured_settlement_asset() {
    let mut h = Harness::with_config(EngineConfig::default().with_settlement_asset("USDC"));
    let root = h.root("alice", OptionType::Call, dec!(100));
    h.engine
        .transfer(&party("alice"), root, &party("bob"))
        .unwrap();

    let child = h.child("bob", root, dec!(110));
    let record = h.engine.get_option(child).unwrap();
    // 0.0001 + 10 × 0.05 × 30/365, truncated to 6 decimals
    assert_eq!(record.premium, Amount::new(41_195));
    assert_eq!(record.premium_token, usdc_id());
    assert_eq!(
        h.ledger.balance_of(&usdc_id(), &party("alice")),
        usdc(dec!(1_000_000.041195))
    );
}

#[test]
fn unaffordable_child_is_not_created() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));
    h.engine
        .transfer(&party("alice"), root, &party("erin"))
        .unwrap();

    let err = h
        .engine
        .create_child_option(&party("erin"), root, wbtc(dec!(120)), None)
        .unwrap_err();
    assert!(matches!(
        err,
        ArborError::InsufficientPremiumBalance { ref party, .. } if *party == PartyId::new("erin")
    ));
    assert_eq!(h.engine.len(), 1);
    assert!(h.engine.get_option_children(root).unwrap().is_empty());
}

#[test]
fn children_cannot_be_added_to_matured_or_settled_trees() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));

    h.expire();
    assert!(matches!(
        h.engine
            .create_child_option(&party("alice"), root, wbtc(dec!(120)), None),
        Err(ArborError::InvalidMaturity { .. })
    ));

    h.prices.set_price(wbtc_id(), wbtc(dec!(90)));
    h.engine.settle_option(root).unwrap();
    assert_eq!(
        h.engine
            .create_child_option(&party("alice"), root, wbtc(dec!(120)), None),
        Err(ArborError::AlreadySettled { option_id: root })
    );
}

#[test]
fn inherited_maturity_policy() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));
    let alice = party("alice");

    assert!(matches!(
        h.engine.create_child_option(
            &alice,
            root,
            wbtc(dec!(110)),
            Some(start().plus_days(10))
        ),
        Err(ArborError::InvalidMaturity { .. })
    ));

    let maturity = h.maturity();
    let child = h
        .engine
        .create_child_option(&alice, root, wbtc(dec!(110)), Some(maturity))
        .unwrap();
    let grandchild = h.child("alice", child, dec!(120));
    assert_eq!(h.engine.get_option(grandchild).unwrap().maturity, maturity);
}

#[test]
fn explicit_maturity_policy() {
    let mut h = Harness::with_config(
        EngineConfig::default().with_maturity_policy(MaturityPolicy::Explicit),
    );
    let root = h.root("alice", OptionType::Call, dec!(100));
    let alice = party("alice");

    let early = start().plus_days(10);
    let child = h
        .engine
        .create_child_option(&alice, root, wbtc(dec!(110)), Some(early))
        .unwrap();
    assert_eq!(h.engine.get_option(child).unwrap().maturity, early);

    // Not after the parent, not in the past.
    assert!(matches!(
        h.engine
            .create_child_option(&alice, child, wbtc(dec!(120)), Some(start().plus_days(20))),
        Err(ArborError::InvalidMaturity { .. })
    ));
    assert!(matches!(
        h.engine
            .create_child_option(&alice, root, wbtc(dec!(120)), Some(start().plus_secs(-1))),
        Err(ArborError::InvalidMaturity { .. })
    ));

    // Without an explicit maturity the child takes its parent's.
    let grandchild = h.child("alice", child, dec!(120));
    assert_eq!(h.engine.get_option(grandchild).unwrap().maturity, early);

    h.expire();
    h.prices.set_price(wbtc_id(), wbtc(dec!(130)));
    assert_eq!(
        h.engine.settle_option_tree(root).unwrap(),
        vec![root, child, grandchild]
    );
}

#[test]
fn batch_creation_is_all_or_nothing() {
    let mut h = Harness::new();
    let alice = party("alice");

    let mut bad = h.request(OptionType::Call, dec!(200));
    bad.base_asset = AssetId::new("DOGE");
    let batch = vec![
        h.request(OptionType::Call, dec!(100)),
        bad,
        h.request(OptionType::Put, dec!(300)),
    ];
    assert!(matches!(
        h.engine.batch_create_options(&alice, batch),
        Err(ArborError::AssetNotSupported { .. })
    ));
    assert!(h.engine.is_empty());
    assert_eq!(h.wbtc_balance("alice"), wbtc(dec!(1_000_000)));

    let batch = vec![
        h.request(OptionType::Call, dec!(100)),
        h.request(OptionType::Call, dec!(200)),
        h.request(OptionType::Put, dec!(300)),
    ];
    let ids = h.engine.batch_create_options(&alice, batch).unwrap();
    assert_eq!(ids, vec![id(1), id(2), id(3)]);
    assert_eq!(h.wbtc_balance("alice"), wbtc(dec!(999_400)));

    assert!(matches!(
        h.engine.batch_create_options(&alice, Vec::new()),
        Err(ArborError::InvalidParameter { .. })
    ));
}

#[test]
fn batch_checks_aggregate_collateral() {
    let mut h = Harness::new();
    let dave = party("dave");
    h.ledger.fund(&wbtc_id(), &dave, wbtc(dec!(150))).unwrap();

    let batch = vec![
        h.request(OptionType::Call, dec!(100)),
        h.request(OptionType::Call, dec!(100)),
    ];
    assert_eq!(
        h.engine.batch_create_options(&dave, batch),
        Err(ArborError::InsufficientCollateral {
            party: dave.clone(),
            asset: wbtc_id(),
            required: wbtc(dec!(200)),
        })
    );
    assert!(h.engine.is_empty());
    assert_eq!(h.ledger.balance_of(&wbtc_id(), &dave), wbtc(dec!(150)));
}

// =============================================================================
// OWNERSHIP
// =============================================================================

#[test]
fn purchase_moves_premium_and_claim() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));

    h.engine.purchase_option(&party("bob"), root).unwrap();
    let record = h.engine.get_option(root).unwrap();
    assert_eq!(record.holder, party("bob"));
    assert_eq!(record.writer, party("alice"));
    assert_eq!(h.wbtc_balance("bob"), wbtc(dec!(999_999.9)));
    assert_eq!(h.wbtc_balance("alice"), wbtc(dec!(999_900.1)));

    assert!(matches!(
        h.engine.purchase_option(&party("bob"), root),
        Err(ArborError::InvalidParameter { .. })
    ));
    assert_eq!(
        h.engine.purchase_option(&party("erin"), root),
        Err(ArborError::InsufficientPremiumBalance {
            party: party("erin"),
            asset: wbtc_id(),
            required: wbtc(dec!(0.1)),
        })
    );
    assert_eq!(h.engine.get_option(root).unwrap().holder, party("bob"));

    h.expire();
    assert!(matches!(
        h.engine.purchase_option(&party("carol"), root),
        Err(ArborError::InvalidMaturity { .. })
    ));
}

#[test]
fn transfer_requires_holder_and_open_option() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Put, dec!(100));

    assert_eq!(
        h.engine.transfer(&party("bob"), root, &party("carol")),
        Err(ArborError::NotOptionHolder {
            option_id: root,
            caller: party("bob"),
        })
    );

    h.expire();
    h.prices.set_price(wbtc_id(), wbtc(dec!(120)));
    h.engine.settle_option(root).unwrap();
    assert_eq!(
        h.engine.transfer(&party("alice"), root, &party("bob")),
        Err(ArborError::AlreadySettled { option_id: root })
    );
}

// =============================================================================
// SETTLEMENT
// =============================================================================

#[test]
fn tree_settlement_waterfall_conserves_collateral() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));
    h.engine.purchase_option(&party("bob"), root).unwrap();
    let child = h.child("bob", root, dec!(120));
    let child_premium = h.engine.get_option(child).unwrap().premium;
    h.engine
        .transfer(&party("bob"), child, &party("carol"))
        .unwrap();

    h.expire();
    h.prices.set_price(wbtc_id(), wbtc(dec!(150)));
    assert_eq!(h.engine.settle_option_tree(root).unwrap(), vec![root, child]);

    let root_settlement = h.engine.get_option(root).unwrap().settlement.clone().unwrap();
    assert_eq!(root_settlement.gross_payoff, wbtc(dec!(50)));
    assert_eq!(root_settlement.holder_proceeds, wbtc(dec!(20)));
    assert_eq!(root_settlement.writer_proceeds, wbtc(dec!(50)));
    let child_settlement = h.engine.get_option(child).unwrap().settlement.clone().unwrap();
    assert_eq!(child_settlement.settlement_price, wbtc(dec!(150)));
    assert_eq!(child_settlement.gross_payoff, wbtc(dec!(30)));
    assert_eq!(child_settlement.holder_proceeds, wbtc(dec!(30)));
    assert_eq!(child_settlement.writer_proceeds, Amount::ZERO);

    assert_eq!(
        h.engine.claim_settlement(&party("bob"), root).unwrap(),
        wbtc(dec!(20))
    );
    assert_eq!(
        h.engine.claim_settlement(&party("carol"), child).unwrap(),
        wbtc(dec!(30))
    );

    assert_eq!(
        h.wbtc_balance("alice"),
        Amount::new(wbtc(dec!(999_950.1)).raw() + child_premium.raw())
    );
    assert_eq!(
        h.wbtc_balance("bob"),
        Amount::new(wbtc(dec!(1_000_019.9)).raw() - child_premium.raw())
    );
    assert_eq!(h.wbtc_balance("carol"), wbtc(dec!(1_000_030)));
    assert_eq!(h.ledger.balance_of(&wbtc_id(), &PartyId::vault()), Amount::ZERO);
}

#[test]
fn deep_tree_settles_parent_before_child() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));
    let a = h.child("alice", root, dec!(120));
    let b = h.child("alice", root, dec!(130));
    let c = h.child("alice", a, dec!(150));
    h.prices.set_price(wbtc_id(), wbtc(dec!(160)));

    assert!(matches!(
        h.engine.settle_option_tree(root),
        Err(ArborError::NotYetMatured { .. })
    ));
    assert!(!h.engine.get_option(root).unwrap().is_settled);

    h.expire();
    assert_eq!(
        h.engine.settle_option(c),
        Err(ArborError::ParentNotSettled {
            option_id: c,
            parent_id: a,
        })
    );
    assert!(matches!(
        h.engine.settle_option_tree(a),
        Err(ArborError::ParentNotSettled { .. })
    ));

    assert_eq!(h.engine.settle_option_tree(root).unwrap(), vec![root, a, b, c]);
    assert!(h.engine.settle_option_tree(root).unwrap().is_empty());

    let gross = |option: OptionId| {
        h.engine
            .get_option(option)
            .unwrap()
            .settlement
            .as_ref()
            .unwrap()
            .gross_payoff
    };
    assert_eq!(gross(root), wbtc(dec!(60)));
    assert_eq!(gross(a), wbtc(dec!(40)));
    assert_eq!(gross(b), wbtc(dec!(20)));
    assert_eq!(gross(c), wbtc(dec!(10)));
}

#[test]
fn children_settle_individually_at_the_root_fixing() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Put, dec!(400));
    let child = h.child("alice", root, dec!(380));

    h.expire();
    h.prices.set_price(wbtc_id(), wbtc(dec!(350)));
    h.engine.settle_option(root).unwrap();

    // A later price move does not change the tree's fixing.
    h.prices.set_price(wbtc_id(), wbtc(dec!(100)));
    let settlement = h.engine.settle_option(child).unwrap();
    assert_eq!(settlement.settlement_price, wbtc(dec!(350)));
    assert_eq!(settlement.gross_payoff, wbtc(dec!(30)));
}

#[test]
fn claim_lifecycle() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));
    h.engine
        .transfer(&party("alice"), root, &party("bob"))
        .unwrap();

    assert_eq!(
        h.engine.claim_settlement(&party("bob"), root),
        Err(ArborError::NotSettled { option_id: root })
    );

    h.expire();
    h.prices.set_price(wbtc_id(), wbtc(dec!(90)));
    let settlement = h.engine.settle_option(root).unwrap();
    assert_eq!(settlement.gross_payoff, Amount::ZERO);
    assert_eq!(settlement.writer_proceeds, wbtc(dec!(100)));
    assert_eq!(h.wbtc_balance("alice"), wbtc(dec!(1_000_000)));

    assert!(matches!(
        h.engine.claim_settlement(&party("alice"), root),
        Err(ArborError::NotOptionHolder { .. })
    ));
    assert_eq!(
        h.engine.claim_settlement(&party("bob"), root).unwrap(),
        Amount::ZERO
    );
    assert!(h.engine.get_option(root).unwrap().is_claimed());
    assert_eq!(
        h.engine.claim_settlement(&party("bob"), root),
        Err(ArborError::AlreadyClaimed { option_id: root })
    );
}

#[test]
fn missing_price_leaves_option_open() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));
    h.expire();

    assert!(matches!(
        h.engine.settle_option(root),
        Err(ArborError::Collaborator { .. })
    ));
    assert!(!h.engine.get_option(root).unwrap().is_settled);
}

#[test]
fn profit_previews_follow_the_waterfall() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));
    let child = h.child("alice", root, dec!(120));

    let spot = wbtc(dec!(150));
    assert_eq!(h.engine.calculate_parent_profit(root, spot).unwrap(), wbtc(dec!(50)));
    assert_eq!(h.engine.calculate_child_profit(child, spot).unwrap(), wbtc(dec!(30)));
    assert_eq!(
        h.engine.calculate_parent_profit(root, wbtc(dec!(1_000))).unwrap(),
        wbtc(dec!(100))
    );
    assert_eq!(
        h.engine.calculate_child_profit(child, wbtc(dec!(110))).unwrap(),
        Amount::ZERO
    );

    assert!(matches!(
        h.engine.calculate_parent_profit(child, spot),
        Err(ArborError::InvalidParameter { .. })
    ));
    assert!(matches!(
        h.engine.calculate_child_profit(root, spot),
        Err(ArborError::InvalidParameter { .. })
    ));
}

#[test]
fn maturity_reads() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));
    assert!(!h.engine.is_option_matured(root).unwrap());
    assert!(!h.engine.is_option_expired(root).unwrap());

    h.expire();
    assert!(h.engine.is_option_matured(root).unwrap());
    assert_eq!(
        h.engine.is_option_matured(id(9)),
        Err(ArborError::OptionNotFound { option_id: id(9) })
    );
}

#[test]
fn asset_whitelist_and_tree_navigation() {
    let mut h = Harness::new();
    let weth = AssetId::new("WETH");
    let request = RootOptionRequest::new(
        weth.clone(),
        Amount::new(1_000),
        h.maturity(),
        Amount::new(1),
        weth.clone(),
        OptionType::Call,
    );
    assert_eq!(
        h.engine.create_root_option(&party("alice"), request),
        Err(ArborError::AssetNotSupported { asset: weth.clone() })
    );

    // Re-registering with the same decimals is a no-op.
    h.engine.add_supported_asset(AssetSpec::new("WETH", 18)).unwrap();
    h.engine.add_supported_asset(AssetSpec::new("WETH", 18)).unwrap();
    assert!(h.engine.is_supported(&weth));
    assert!(h.engine.add_supported_asset(AssetSpec::new("WETH", 6)).is_err());

    assert_eq!(
        h.engine
            .calculate_collateral_required(&wbtc_id(), wbtc(dec!(30_000)), OptionType::Put)
            .unwrap(),
        wbtc(dec!(30_000))
    );

    let root = h.root("alice", OptionType::Call, dec!(100));
    let a = h.child("alice", root, dec!(110));
    let b = h.child("alice", root, dec!(120));
    let c = h.child("alice", a, dec!(130));

    assert_eq!(h.engine.get_option_children(root).unwrap(), &[a, b]);
    assert_eq!(h.engine.root_of(c).unwrap(), root);
    assert_eq!(h.engine.subtree(root).unwrap(), vec![root, a, b, c]);
    assert_eq!(h.engine.subtree(a).unwrap(), vec![a, c]);
    assert_eq!(h.engine.len(), 4);
}

/// Ledger whose next `execute` fails after `check` has passed.
#[derive(Clone)]
struct FlakyLedger {
    inner: InMemoryLedger,
    fail_next: Arc<AtomicBool>,
}

impl FlakyLedger {
    fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl AssetLedger for FlakyLedger {
    fn balance_of(&self, asset: &AssetId, party: &PartyId) -> Amount {
        self.inner.balance_of(asset, party)
    }

    fn allowance(&self, asset: &AssetId, owner: &PartyId, spender: &PartyId) -> Amount {
        self.inner.allowance(asset, owner, spender)
    }

    fn approve(
        &self,
        asset: &AssetId,
        owner: &PartyId,
        spender: &PartyId,
        amount: Amount,
    ) -> Result<(), TraitError> {
        self.inner.approve(asset, owner, spender, amount)
    }

    fn check(&self, transfers: &[Transfer]) -> Result<(), TraitError> {
        self.inner.check(transfers)
    }

    fn execute(&self, transfers: &[Transfer]) -> Result<(), TraitError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(TraitError::Internal("ledger offline".to_string()));
        }
        self.inner.execute(transfers)
    }
}

fn is_ledger_failure<T>(result: Result<T, ArborError>) -> bool {
    matches!(result, Err(ArborError::Collaborator { .. }))
}

#[test]
fn failed_ledger_execution_rolls_back_every_operation() {
    let ledger = InMemoryLedger::new();
    let flaky = FlakyLedger {
        inner: ledger.clone(),
        fail_next: Arc::new(AtomicBool::new(false)),
    };
    let mut h = Harness::with_ledger(EngineConfig::default(), flaky.clone(), ledger);
    let alice = party("alice");
    let bob = party("bob");

    // Root creation: nothing is registered and no collateral moves
    flaky.fail_next();
    let request = h.request(OptionType::Call, dec!(100));
    assert!(is_ledger_failure(h.engine.create_root_option(&alice, request)));
    assert_eq!(h.engine.len(), 0);
    assert_eq!(h.wbtc_balance("alice"), wbtc(dec!(1_000_000)));

    let root = h.root("alice", OptionType::Call, dec!(100));
    assert_eq!(root, id(1));

    // Purchase: the claim stays with the seller
    flaky.fail_next();
    assert!(is_ledger_failure(h.engine.purchase_option(&bob, root)));
    assert_eq!(h.engine.get_option(root).unwrap().holder, alice);
    assert_eq!(h.wbtc_balance("bob"), wbtc(dec!(1_000_000)));

    h.engine.purchase_option(&bob, root).unwrap();

    // Child creation: the node is popped and unlinked from its parent
    flaky.fail_next();
    assert!(is_ledger_failure(h.engine.create_child_option(
        &bob,
        root,
        wbtc(dec!(120)),
        None
    )));
    assert_eq!(h.engine.len(), 1);
    assert!(h.engine.get_option_children(root).unwrap().is_empty());

    // Settlement: the fixing and the settled flag are undone
    h.expire();
    h.prices.set_price(wbtc_id(), wbtc(dec!(150)));
    flaky.fail_next();
    assert!(is_ledger_failure(h.engine.settle_option(root)));
    let record = h.engine.get_option(root).unwrap();
    assert!(!record.is_settled);
    assert!(record.settlement.is_none());

    flaky.fail_next();
    assert!(is_ledger_failure(h.engine.settle_option_tree(root)));
    assert!(!h.engine.get_option(root).unwrap().is_settled);

    let settlement = h.engine.settle_option(root).unwrap();
    assert_eq!(settlement.gross_payoff, wbtc(dec!(50)));

    // Claim: the proceeds stay escrowed and the claim can be retried
    flaky.fail_next();
    assert!(is_ledger_failure(h.engine.claim_settlement(&bob, root)));
    assert!(!h.engine.get_option(root).unwrap().is_claimed());

    assert_eq!(
        h.engine.claim_settlement(&bob, root).unwrap(),
        wbtc(dec!(50))
    );
    assert!(h.engine.get_option(root).unwrap().is_claimed());
}

// =============================================================================
// LEGACY EXERCISE
// =============================================================================

#[test]
fn legacy_exercise_is_disabled_by_default() {
    let mut h = Harness::new();
    let root = h.root("alice", OptionType::Call, dec!(100));
    assert_eq!(
        h.engine.exercise_option(&party("alice"), root),
        Err(ArborError::LegacyExerciseDisabled)
    );
}

#[test]
fn legacy_exercise_excludes_settlement() {
    let mut h = Harness::with_config(EngineConfig::default().with_legacy_exercise(true));
    let root = h.root("alice", OptionType::Call, dec!(100));
    h.engine
        .transfer(&party("alice"), root, &party("bob"))
        .unwrap();
    h.prices.set_price(wbtc_id(), wbtc(dec!(130)));

    assert!(matches!(
        h.engine.exercise_option(&party("alice"), root),
        Err(ArborError::NotOptionHolder { .. })
    ));

    let paid = h.engine.exercise_option(&party("bob"), root).unwrap();
    assert_eq!(paid, wbtc(dec!(30)));
    assert_eq!(h.wbtc_balance("bob"), wbtc(dec!(1_000_030)));
    assert_eq!(h.wbtc_balance("alice"), wbtc(dec!(999_970)));

    assert_eq!(
        h.engine.exercise_option(&party("bob"), root),
        Err(ArborError::AlreadySettled { option_id: root })
    );
    assert_eq!(
        h.engine
            .create_child_option(&party("bob"), root, wbtc(dec!(120)), None),
        Err(ArborError::AlreadySettled { option_id: root })
    );

    h.expire();
    assert_eq!(
        h.engine.settle_option(root),
        Err(ArborError::AlreadySettled { option_id: root })
    );
    assert_eq!(
        h.engine.claim_settlement(&party("bob"), root),
        Err(ArborError::AlreadyClaimed { option_id: root })
    );
}
