//! End-to-end tests of the `arbor` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn arbor() -> Command {
    Command::cargo_bin("arbor").unwrap()
}

fn write_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

const SCENARIO: &str = r#"
name = "two layer call"

[[assets]]
id = "WBTC"
decimals = 8
price = 50000

[[balances]]
party = "alice"
asset = "WBTC"
amount = 100000

[[balances]]
party = "bob"
asset = "WBTC"
amount = 100

[[steps]]
action = "create-root"
writer = "alice"
asset = "WBTC"
strike = 50000
maturity_days = 30
premium = 0.1

[[steps]]
action = "purchase"
buyer = "bob"
option = 1

[[steps]]
action = "create-child"
caller = "bob"
parent = 1
strike = 55000

[[steps]]
action = "settle"
option = 1

[[steps]]
action = "advance"
days = 30

[[steps]]
action = "set-price"
asset = "WBTC"
price = 60000

[[steps]]
action = "settle-tree"
option = 1

[[steps]]
action = "claim"
caller = "bob"
option = 1
"#;

// =============================================================================
// QUOTE
// =============================================================================

#[test]
fn test_help_lists_commands() {
    arbor()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("quote"))
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_quote_root_json() {
    arbor()
        .args(["quote", "--strike", "50000", "--maturity-days", "365", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""collateral": "50000""#))
        .stdout(predicate::str::contains(r#""premium": "2500""#))
        .stdout(predicate::str::contains(r#""option_type": "CALL""#));
}

#[test]
fn test_quote_child_minimal() {
    arbor()
        .args([
            "quote",
            "--strike",
            "55000",
            "--parent-strike",
            "50000",
            "--maturity-days",
            "365",
            "--format",
            "minimal",
        ])
        .assert()
        .success()
        .stdout(predicate::str::diff("250.0001\n"));
}

#[test]
fn test_quote_put_child_must_be_below_parent() {
    arbor()
        .args([
            "quote",
            "--type",
            "put",
            "--strike",
            "55000",
            "--parent-strike",
            "50000",
            "--maturity-days",
            "30",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Strike order violation"));
}

#[test]
fn test_quote_rejects_past_maturity() {
    arbor()
        .args(["quote", "--strike", "100", "--maturity-days", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("maturity days"));
}

// =============================================================================
// SIMULATE
// =============================================================================

#[test]
fn test_simulate_reports_steps_and_payouts() {
    let scenario = write_file(".toml", SCENARIO);
    arbor()
        .args(["simulate", "--format", "json"])
        .arg(scenario.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("settled [1, 2]"))
        .stdout(predicate::str::contains(r#""gross_payoff": "10000""#))
        .stdout(predicate::str::contains(r#""holder_proceeds": "5000""#))
        .stderr(predicate::str::contains("1 of 8 step(s) failed"));
}

#[test]
fn test_simulate_stop_on_error() {
    let scenario = write_file(".toml", SCENARIO);
    arbor()
        .args(["simulate", "--stop-on-error"])
        .arg(scenario.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Step 4 (settle) failed"));
}

#[test]
fn test_simulate_reports_clock_overflow() {
    let scenario = write_file(".toml", "[[steps]]\naction = \"advance\"\ndays = 200000000000000\n");
    arbor()
        .args(["simulate", "--format", "minimal"])
        .arg(scenario.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0/1"))
        .stderr(predicate::str::contains("1 of 1 step(s) failed"));
}

#[test]
fn test_simulate_missing_file() {
    arbor()
        .args(["simulate", "does-not-exist.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid scenario"));
}

// =============================================================================
// CONFIG
// =============================================================================

#[test]
fn test_config_show_defaults() {
    arbor()
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""maturity_policy": "inherit""#))
        .stdout(predicate::str::contains(r#""allow_legacy_exercise": false"#));
}

#[test]
fn test_config_validate_accepts_valid_file() {
    let config = write_file(".toml", "name = \"desk\"\nsettlement_asset = \"USDC\"\n");
    arbor()
        .args(["config", "validate"])
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_config_validate_lists_every_error() {
    let config = write_file(
        ".toml",
        "contract_size = 0\n\n[premium]\nmin_child_premium = 0\n",
    );
    arbor()
        .args(["config", "validate"])
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("contract_size"))
        .stderr(predicate::str::contains("premium.min_child_premium"))
        .stderr(predicate::str::contains("2 error(s)"));
}
