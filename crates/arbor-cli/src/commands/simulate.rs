//! Simulate command implementation.
//!
//! Runs a scripted scenario against an in-memory engine with a manual clock
//! and settable prices, then prints the step log, the final option table and
//! the ledger balances.
//!
//! # Scenario format
//!
//! ```toml
//! name = "covered call ladder"
//! start = 1704067200          # unix seconds, optional
//!
//! [config]                    # optional engine configuration
//! settlement_asset = "USDC"
//!
//! [[assets]]
//! id = "WBTC"
//! decimals = 8
//! price = 50000               # optional initial spot
//!
//! [[balances]]
//! party = "alice"
//! asset = "WBTC"
//! amount = 10
//!
//! [[steps]]
//! action = "create-root"
//! writer = "alice"
//! asset = "WBTC"
//! strike = 50000
//! maturity_days = 30
//! premium = 0.1               # omitted: priced by the root premium formula
//! type = "call"
//! ```
//!
//! Maturities count days from `start`. Amounts are in units of their asset.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tabled::Tabled;
use tracing::{debug, info};

use arbor_config::EngineConfig;
use arbor_core::types::SECONDS_PER_DAY;
use arbor_core::{Amount, AssetId, AssetSpec, OptionId, OptionRecord, OptionType, PartyId, Timestamp};
use arbor_engine::{OptionEngine, OptionEngineBuilder, RootOptionRequest};
use arbor_traits::{FixedPriceSource, InMemoryLedger, ManualClock};

use crate::cli::OutputFormat;
use crate::commands::to_amount;
use crate::error::{CliError, CliResult};
use crate::output::{
    format_amount, print_error, print_header, print_output, print_single, print_success,
    print_warning,
};

/// 2024-01-01T00:00:00Z
const DEFAULT_START: i64 = 1_704_067_200;

/// Arguments for the simulate command.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Scenario file (TOML)
    pub scenario: PathBuf,

    /// Abort on the first failing step instead of continuing
    #[arg(long)]
    pub stop_on_error: bool,
}

// =============================================================================
// SCENARIO
// =============================================================================

/// A scripted scenario.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_start")]
    pub start: i64,
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
    #[serde(default)]
    pub balances: Vec<BalanceEntry>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_start() -> i64 {
    DEFAULT_START
}

/// An asset registered before the first step.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetEntry {
    pub id: String,
    pub decimals: u32,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// An opening balance, approved for the engine's custody.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BalanceEntry {
    pub party: String,
    pub asset: String,
    pub amount: Decimal,
}

/// One scripted operation.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    CreateRoot {
        writer: String,
        asset: String,
        strike: Decimal,
        maturity_days: i64,
        #[serde(default)]
        premium: Option<Decimal>,
        #[serde(default)]
        premium_token: Option<String>,
        #[serde(rename = "type", default = "default_option_type", deserialize_with = "parse_option_type")]
        option_type: OptionType,
    },
    CreateChild {
        caller: String,
        parent: u64,
        strike: Decimal,
        #[serde(default)]
        maturity_days: Option<i64>,
    },
    Purchase {
        buyer: String,
        option: u64,
    },
    Transfer {
        from: String,
        option: u64,
        to: String,
    },
    Advance {
        #[serde(default)]
        days: i64,
        #[serde(default)]
        secs: i64,
    },
    SetPrice {
        asset: String,
        price: Decimal,
    },
    Settle {
        option: u64,
    },
    SettleTree {
        option: u64,
    },
    Claim {
        caller: String,
        option: u64,
    },
    Exercise {
        caller: String,
        option: u64,
    },
}

fn default_option_type() -> OptionType {
    OptionType::Call
}

fn parse_option_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OptionType, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

impl Step {
    /// Action name as written in the scenario.
    pub fn action(&self) -> &'static str {
        match self {
            Step::CreateRoot { .. } => "create-root",
            Step::CreateChild { .. } => "create-child",
            Step::Purchase { .. } => "purchase",
            Step::Transfer { .. } => "transfer",
            Step::Advance { .. } => "advance",
            Step::SetPrice { .. } => "set-price",
            Step::Settle { .. } => "settle",
            Step::SettleTree { .. } => "settle-tree",
            Step::Claim { .. } => "claim",
            Step::Exercise { .. } => "exercise",
        }
    }
}

impl Scenario {
    /// Parses a scenario document.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Reads and parses a scenario file.
    pub fn from_file(path: &Path) -> CliResult<Self> {
        let scenario_error = |reason: String| CliError::Scenario {
            path: path.to_path_buf(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| scenario_error(e.to_string()))?;
        Self::from_toml_str(&content).map_err(|e| scenario_error(e.to_string()))
    }
}

// =============================================================================
// SIMULATION
// =============================================================================

/// An engine wired to collaborators the scenario can drive.
pub struct Simulation {
    engine: OptionEngine,
    clock: ManualClock,
    prices: FixedPriceSource,
    ledger: InMemoryLedger,
    start: Timestamp,
}

impl Simulation {
    /// Builds the engine, registers assets, seeds prices and balances.
    pub fn new(scenario: &Scenario) -> Result<Self> {
        let start = Timestamp::from_secs(scenario.start);
        let clock = ManualClock::new(start);
        let prices = FixedPriceSource::new();
        let ledger = InMemoryLedger::new();

        let mut builder = OptionEngineBuilder::new()
            .with_config(scenario.config.clone())
            .with_clock(clock.clone())
            .with_price_source(prices.clone())
            .with_ledger(ledger.clone());
        for entry in &scenario.assets {
            let mut spec = AssetSpec::new(entry.id.as_str(), entry.decimals);
            if let Some(symbol) = &entry.symbol {
                spec = spec.with_symbol(symbol.as_str());
            }
            builder = builder.with_asset(spec);
        }
        let engine = builder.build()?;

        let simulation = Self {
            engine,
            clock,
            prices,
            ledger,
            start,
        };

        for entry in &scenario.assets {
            if let Some(price) = entry.price {
                simulation.set_price(&entry.id, price)?;
            }
        }
        for entry in &scenario.balances {
            let asset = AssetId::new(entry.asset.as_str());
            let amount = simulation.amount("balance", &asset, entry.amount)?;
            simulation
                .ledger
                .fund(&asset, &PartyId::new(entry.party.as_str()), amount)?;
        }

        Ok(simulation)
    }

    fn decimals(&self, asset: &AssetId) -> Result<u32> {
        Ok(self.engine.assets().decimals(asset)?)
    }

    fn amount(&self, name: &'static str, asset: &AssetId, value: Decimal) -> Result<Amount> {
        Ok(to_amount(name, value, self.decimals(asset)?)?)
    }

    fn display(&self, asset: &AssetId, amount: Amount) -> Result<String> {
        Ok(format!("{} {}", format_amount(amount, self.decimals(asset)?)?, asset))
    }

    fn set_price(&self, asset: &str, price: Decimal) -> Result<Amount> {
        let asset = AssetId::new(asset);
        let raw = self.amount("price", &asset, price)?;
        self.prices.set_price(asset, raw);
        Ok(raw)
    }

    /// Executes one step and describes what happened.
    pub fn run_step(&mut self, step: &Step) -> Result<String> {
        match step {
            Step::CreateRoot {
                writer,
                asset,
                strike,
                maturity_days,
                premium,
                premium_token,
                option_type,
            } => {
                let writer = PartyId::new(writer.as_str());
                let base = AssetId::new(asset.as_str());
                let strike = self.amount("strike", &base, *strike)?;
                let maturity = self.start.plus_days(*maturity_days);

                let id = match (premium, premium_token) {
                    (Some(premium), token) => {
                        let token = token.as_deref().map_or_else(|| base.clone(), AssetId::new);
                        let premium = self.amount("premium", &token, *premium)?;
                        let request =
                            RootOptionRequest::new(base, strike, maturity, premium, token, *option_type);
                        self.engine.create_root_option(&writer, request)?
                    }
                    (None, None) => {
                        self.engine
                            .create_layered_option(&writer, &base, strike, maturity, *option_type)?
                    }
                    (None, Some(_)) => {
                        return Err(CliError::InvalidArgument {
                            name: "premium_token",
                            value: "set without premium".to_string(),
                            hint: "Give a premium, or omit both to use the root premium formula.",
                        }
                        .into())
                    }
                };
                let record = self.engine.get_option(id)?;
                Ok(format!(
                    "created {} {} (premium {})",
                    record.option_type,
                    id,
                    self.display(&record.premium_token, record.premium)?
                ))
            }
            Step::CreateChild {
                caller,
                parent,
                strike,
                maturity_days,
            } => {
                let parent = OptionId::new(*parent);
                let base = self.engine.get_option(parent)?.base_asset.clone();
                let strike = self.amount("strike", &base, *strike)?;
                let maturity = maturity_days.map(|days| self.start.plus_days(days));
                let id = self.engine.create_child_option(
                    &PartyId::new(caller.as_str()),
                    parent,
                    strike,
                    maturity,
                )?;
                let record = self.engine.get_option(id)?;
                Ok(format!(
                    "created child {} under {} (premium {})",
                    id,
                    parent,
                    self.display(&record.premium_token, record.premium)?
                ))
            }
            Step::Purchase { buyer, option } => {
                let id = OptionId::new(*option);
                self.engine.purchase_option(&PartyId::new(buyer.as_str()), id)?;
                Ok(format!("{} bought {}", buyer, id))
            }
            Step::Transfer { from, option, to } => {
                let id = OptionId::new(*option);
                self.engine.transfer(
                    &PartyId::new(from.as_str()),
                    id,
                    &PartyId::new(to.as_str()),
                )?;
                Ok(format!("{} moved from {} to {}", id, from, to))
            }
            Step::Advance { days, secs } => {
                let now = self.engine.now().as_secs();
                let delta = days
                    .checked_mul(SECONDS_PER_DAY)
                    .and_then(|d| d.checked_add(*secs))
                    .filter(|delta| now.checked_add(*delta).is_some())
                    .ok_or_else(|| CliError::InvalidArgument {
                        name: "advance",
                        value: format!("{} day(s) {} sec(s)", days, secs),
                        hint: "The clock would leave the representable time range.",
                    })?;
                self.clock.advance_secs(delta);
                Ok(format!("clock at {}", self.engine.now()))
            }
            Step::SetPrice { asset, price } => {
                self.set_price(asset, *price)?;
                Ok(format!("{} spot set to {}", asset, price.normalize()))
            }
            Step::Settle { option } => {
                let id = OptionId::new(*option);
                let settlement = self.engine.settle_option(id)?;
                let base = self.engine.get_option(id)?.base_asset.clone();
                Ok(format!(
                    "settled {} at {}: holder {}",
                    id,
                    format_amount(settlement.settlement_price, self.decimals(&base)?)?,
                    self.display(&base, settlement.holder_proceeds)?
                ))
            }
            Step::SettleTree { option } => {
                let settled = self.engine.settle_option_tree(OptionId::new(*option))?;
                let ids: Vec<String> = settled.iter().map(ToString::to_string).collect();
                Ok(format!("settled [{}]", ids.join(", ")))
            }
            Step::Claim { caller, option } => {
                let id = OptionId::new(*option);
                let proceeds = self
                    .engine
                    .claim_settlement(&PartyId::new(caller.as_str()), id)?;
                let base = self.engine.get_option(id)?.base_asset.clone();
                Ok(format!("{} claimed {}", caller, self.display(&base, proceeds)?))
            }
            Step::Exercise { caller, option } => {
                let id = OptionId::new(*option);
                let proceeds = self
                    .engine
                    .exercise_option(&PartyId::new(caller.as_str()), id)?;
                let base = self.engine.get_option(id)?.base_asset.clone();
                Ok(format!("{} exercised {} for {}", caller, id, self.display(&base, proceeds)?))
            }
        }
    }

    /// Final state of every option, in id order.
    pub fn option_rows(&self) -> Result<Vec<OptionRow>> {
        self.engine
            .options()
            .iter()
            .map(|record| self.option_row(record))
            .collect()
    }

    fn option_row(&self, record: &OptionRecord) -> Result<OptionRow> {
        let decimals = self.decimals(&record.base_asset)?;
        let settlement = record.settlement.as_ref();
        let payoff = |amount: Option<Amount>| -> Result<String> {
            Ok(match amount {
                Some(amount) => format_amount(amount, decimals)?,
                None => "-".to_string(),
            })
        };

        Ok(OptionRow {
            id: record.id.value(),
            parent: if record.is_root() {
                "-".to_string()
            } else {
                record.parent_id.to_string()
            },
            option_type: record.option_type.to_string(),
            asset: record.base_asset.to_string(),
            strike: format_amount(record.strike_price, decimals)?,
            maturity: record.maturity.to_string(),
            writer: record.writer.to_string(),
            holder: record.holder.to_string(),
            premium: self.display(&record.premium_token, record.premium)?,
            settled: record.is_settled,
            gross_payoff: payoff(settlement.map(|s| s.gross_payoff))?,
            holder_proceeds: payoff(settlement.map(|s| s.holder_proceeds))?,
            claimed: record.is_claimed(),
        })
    }

    /// Ledger balances, including the engine's custody account.
    pub fn balance_rows(&self) -> Result<Vec<BalanceRow>> {
        self.ledger
            .snapshot()
            .into_iter()
            .map(|(asset, party, amount)| {
                Ok(BalanceRow {
                    party: party.to_string(),
                    asset: asset.to_string(),
                    balance: format_amount(amount, self.decimals(&asset)?)?,
                })
            })
            .collect()
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Outcome of one step.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct StepRow {
    #[tabled(rename = "Step")]
    pub step: usize,
    #[tabled(rename = "Action")]
    pub action: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Detail")]
    pub detail: String,
}

/// Final state of one option.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct OptionRow {
    #[tabled(rename = "Id")]
    pub id: u64,
    #[tabled(rename = "Parent")]
    pub parent: String,
    #[tabled(rename = "Type")]
    pub option_type: String,
    #[tabled(rename = "Asset")]
    pub asset: String,
    #[tabled(rename = "Strike")]
    pub strike: String,
    #[tabled(rename = "Maturity")]
    pub maturity: String,
    #[tabled(rename = "Writer")]
    pub writer: String,
    #[tabled(rename = "Holder")]
    pub holder: String,
    #[tabled(rename = "Premium")]
    pub premium: String,
    #[tabled(rename = "Settled")]
    pub settled: bool,
    #[tabled(rename = "Gross")]
    pub gross_payoff: String,
    #[tabled(rename = "Holder Proceeds")]
    pub holder_proceeds: String,
    #[tabled(rename = "Claimed")]
    pub claimed: bool,
}

/// One ledger balance.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct BalanceRow {
    #[tabled(rename = "Party")]
    pub party: String,
    #[tabled(rename = "Asset")]
    pub asset: String,
    #[tabled(rename = "Balance")]
    pub balance: String,
}

/// Everything a simulation run produced.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub name: Option<String>,
    pub steps: Vec<StepRow>,
    pub options: Vec<OptionRow>,
    pub balances: Vec<BalanceRow>,
}

impl SimulationReport {
    /// Number of steps that failed.
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| s.status == "error").count()
    }
}

/// Runs every step of a scenario. With `stop_on_error` the first failure
/// aborts the run with [`CliError::StepFailed`].
pub fn run(scenario: &Scenario, stop_on_error: bool) -> Result<SimulationReport> {
    let mut simulation = Simulation::new(scenario)?;
    info!(
        "running scenario {} with {} steps",
        scenario.name.as_deref().unwrap_or("<unnamed>"),
        scenario.steps.len()
    );

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let number = index + 1;
        let (status, detail) = match simulation.run_step(step) {
            Ok(detail) => ("ok", detail),
            Err(err) => {
                if stop_on_error {
                    return Err(CliError::StepFailed {
                        step: number,
                        action: step.action().to_string(),
                        reason: err.to_string(),
                    }
                    .into());
                }
                ("error", err.to_string())
            }
        };
        debug!("step {} {}: {} {}", number, step.action(), status, detail);
        steps.push(StepRow {
            step: number,
            action: step.action().to_string(),
            status: status.to_string(),
            detail,
        });
    }

    Ok(SimulationReport {
        name: scenario.name.clone(),
        steps,
        options: simulation.option_rows()?,
        balances: simulation.balance_rows()?,
    })
}

/// Execute the simulate command.
pub fn execute(args: SimulateArgs, format: OutputFormat) -> Result<()> {
    let scenario = Scenario::from_file(&args.scenario)?;
    let report = match run(&scenario, args.stop_on_error) {
        Ok(report) => report,
        Err(err) => {
            print_error(&err.to_string());
            return Err(err);
        }
    };

    match format {
        OutputFormat::Table => {
            if let Some(name) = &report.name {
                print_header(name);
            }
            print_header("Steps");
            print_output(&report.steps, format)?;
            print_header("Options");
            print_output(&report.options, format)?;
            print_header("Balances");
            print_output(&report.balances, format)?;
        }
        OutputFormat::Json => print_single(&report, format)?,
        OutputFormat::Csv => print_output(&report.options, format)?,
        OutputFormat::Minimal => {
            println!("{}/{}", report.steps.len() - report.failures(), report.steps.len());
        }
    }

    match report.failures() {
        0 => print_success(&format!("{} step(s) completed", report.steps.len())),
        n => print_warning(&format!("{} of {} step(s) failed", n, report.steps.len())),
    }

    Ok(())
}
