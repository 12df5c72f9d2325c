//! Quote command implementation.
//!
//! Previews collateral and premiums against a fresh engine, without any
//! funds changing hands.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use arbor_config::EngineConfig;
use arbor_core::{Amount, ArborError, AssetId, AssetSpec, OptionType, PartyId, Timestamp};
use arbor_engine::{OptionEngine, OptionEngineBuilder, RootOptionRequest};
use arbor_traits::{FixedPriceSource, InMemoryLedger, ManualClock};

use crate::cli::{OptionKind, OutputFormat};
use crate::commands::{to_amount, validate_days, validate_decimals};
use crate::output::{format_amount, format_percent, print_header, print_output, print_single, KeyValue};

const QUOTE_ASSET: &str = "UNDERLYING";

/// Arguments for the quote command.
#[derive(Args, Debug)]
pub struct QuoteArgs {
    /// Strike in units of the underlying (the child strike with --parent-strike)
    #[arg(short, long)]
    pub strike: Decimal,

    /// Days until maturity
    #[arg(short, long)]
    pub maturity_days: i64,

    /// Strike of the parent option; quotes a child layer when given
    #[arg(short, long)]
    pub parent_strike: Option<Decimal>,

    /// Decimals of the underlying asset
    #[arg(short, long, default_value = "8")]
    pub decimals: u32,

    /// Option type
    #[arg(short = 't', long = "type", value_enum, default_value = "call")]
    pub option_type: OptionKind,

    /// Engine configuration file (.toml or .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Quote result, amounts in units of the underlying.
#[derive(Debug, Serialize)]
pub struct QuoteResult {
    pub option_type: OptionType,
    pub strike: String,
    pub parent_strike: Option<String>,
    pub maturity: Timestamp,
    pub collateral: String,
    pub premium: String,
    pub child_premium: Option<String>,
}

/// Execute the quote command.
pub fn execute(args: QuoteArgs, format: OutputFormat) -> Result<()> {
    let decimals = validate_decimals(args.decimals)?;
    let days = validate_days(args.maturity_days)?;
    let option_type = OptionType::from(args.option_type);

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    // Quotes are denominated in the underlying
    config.settlement_asset = None;

    let now = Timestamp::from_datetime(Utc::now());
    let maturity = now.plus_days(days);
    let ledger = InMemoryLedger::new();
    let mut engine = OptionEngineBuilder::new()
        .with_config(config)
        .with_clock(ManualClock::new(now))
        .with_price_source(FixedPriceSource::new())
        .with_ledger(ledger.clone())
        .with_asset(AssetSpec::new(QUOTE_ASSET, decimals))
        .build()?;
    let asset = AssetId::new(QUOTE_ASSET);

    let strike = to_amount("strike", args.strike, decimals)?;
    let collateral = engine.calculate_collateral_required(&asset, strike, option_type)?;
    let premium = engine.calculate_parent_premium(&asset, strike, maturity, option_type)?;

    let mut result = QuoteResult {
        option_type,
        strike: format_amount(strike, decimals)?,
        parent_strike: None,
        maturity,
        collateral: format_amount(collateral, decimals)?,
        premium: format_amount(premium, decimals)?,
        child_premium: None,
    };

    if let Some(parent_strike) = args.parent_strike {
        let parent_strike = to_amount("parent strike", parent_strike, decimals)?;
        let child_premium = quote_child(
            &mut engine,
            &ledger,
            &asset,
            parent_strike,
            strike,
            maturity,
            option_type,
        )?;
        result.parent_strike = Some(format_amount(parent_strike, decimals)?);
        result.child_premium = Some(format_amount(child_premium, decimals)?);
    }

    match format {
        OutputFormat::Table => {
            print_header("Option Quote");
            let ratio = if collateral.is_zero() {
                None
            } else {
                Some(premium.to_units(decimals)? / collateral.to_units(decimals)?)
            };
            print_output(&rows(&result, ratio), format)?;
        }
        OutputFormat::Json | OutputFormat::Csv => print_single(&result, format)?,
        OutputFormat::Minimal => {
            println!("{}", result.child_premium.as_ref().unwrap_or(&result.premium));
        }
    }

    Ok(())
}

/// Writes a parent at `parent_strike` and prices a child layer under it.
fn quote_child(
    engine: &mut OptionEngine,
    ledger: &InMemoryLedger,
    asset: &AssetId,
    parent_strike: Amount,
    child_strike: Amount,
    maturity: Timestamp,
    option_type: OptionType,
) -> Result<Amount> {
    if !option_type.is_valid_child_strike(parent_strike, child_strike) {
        return Err(ArborError::StrikeOrderViolation {
            option_type,
            parent_strike,
            child_strike,
        }
        .into());
    }

    let writer = PartyId::new("quote-writer");
    let collateral = engine.calculate_collateral_required(asset, parent_strike, option_type)?;
    let premium = engine.calculate_parent_premium(asset, parent_strike, maturity, option_type)?;
    ledger.fund(asset, &writer, collateral)?;

    let request = RootOptionRequest::new(
        asset.clone(),
        parent_strike,
        maturity,
        premium,
        asset.clone(),
        option_type,
    );
    let parent = engine.create_root_option(&writer, request)?;
    let child_premium = engine.calculate_child_premium(parent, child_strike, None)?;
    debug!("child quote under {}: {}", parent, child_premium);
    Ok(child_premium)
}

fn rows(result: &QuoteResult, ratio: Option<Decimal>) -> Vec<KeyValue> {
    let mut rows = vec![
        KeyValue::new("Option Type", result.option_type.to_string()),
        KeyValue::new("Strike", &result.strike),
    ];
    if let Some(parent_strike) = &result.parent_strike {
        rows.push(KeyValue::new("Parent Strike", parent_strike));
    }
    rows.push(KeyValue::new("Maturity", result.maturity.to_string()));
    rows.push(KeyValue::new("Collateral", &result.collateral));
    rows.push(KeyValue::new("Root Premium", &result.premium));
    if let Some(ratio) = ratio {
        rows.push(KeyValue::new("Premium / Collateral", format_percent(ratio.round_dp(6))));
    }
    if let Some(child_premium) = &result.child_premium {
        rows.push(KeyValue::new("Child Premium", child_premium));
    }
    rows
}
