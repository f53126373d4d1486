/// Offline audit battery runner: evaluates named pixel cases against their
/// expected node codes and gas values, and prints the published node-code
/// table.
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use ember_core::{classify_and_compute, describe_node, node_table, ModelConfig, PixelInputs};

const DEFAULT_TOLERANCE: f32 = 1e-3;

#[derive(Parser, Debug)]
#[command(name = "ember-test", about = "Offline audit battery for the emissions decision tree")]
struct Args {
    /// Battery file (JSON). Defaults to the bundled battery.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Model configuration JSON applied over each case's profile preset.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the leaf → node-code table for every driver family and exit.
    #[arg(long)]
    list_nodes: bool,

    /// Repeat for more log output (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ── Battery schema ────────────────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct Battery {
    cases: Vec<Case>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
enum Profile {
    #[default]
    Current,
    Legacy,
}

#[derive(Deserialize, Debug)]
struct Case {
    name: String,
    #[serde(default)]
    profile: Profile,
    pixel: PixelInputs,
    node_code: u16,
    co2: Option<f32>,
    ch4: Option<f32>,
    n2o: Option<f32>,
    tolerance: Option<f32>,
}

const BUNDLED_BATTERY: &str = include_str!("../data/audit_battery.json");

// ── Evaluation ────────────────────────────────────────────────────────────────

/// Mismatches for one case; empty on pass.
fn check_case(case: &Case, cfg: &ModelConfig) -> Vec<String> {
    let eval = classify_and_compute(&case.pixel, cfg);
    for v in &eval.violations {
        info!(case = %case.name, field = v.field(), "{}", v.detail());
    }
    let r = eval.result;
    debug!(
        case = %case.name,
        node_code = r.node_code,
        co2 = r.gases.co2,
        ch4 = r.gases.ch4,
        n2o = r.gases.n2o,
        "evaluated"
    );
    let tol = case.tolerance.unwrap_or(DEFAULT_TOLERANCE);
    let mut failures = Vec::new();

    if r.node_code != case.node_code {
        failures.push(format!("node_code {} (expected {})", r.node_code, case.node_code));
    }
    for (gas, got, want) in [
        ("co2", r.gases.co2, case.co2),
        ("ch4", r.gases.ch4, case.ch4),
        ("n2o", r.gases.n2o, case.n2o),
    ] {
        if let Some(want) = want {
            if (got - want).abs() > tol {
                failures.push(format!("{gas} {got:.4} (expected {want:.4} ± {tol})"));
            }
        }
    }
    failures
}

/// The case's preset with the optional JSON override merged over it.
fn config_for(profile: Profile, override_json: Option<&str>) -> ember_core::Result<ModelConfig> {
    let preset = match profile {
        Profile::Current => ModelConfig::current(),
        Profile::Legacy => ModelConfig::legacy(),
    };
    match override_json {
        Some(text) => ModelConfig::from_json_over(text, &preset),
        None => Ok(preset),
    }
}

fn print_node_table() {
    println!("{:>5}  leaf", "code");
    for entry in node_table() {
        let text = describe_node(entry.node_code).unwrap_or_default();
        println!("{:>5}  {text}", entry.node_code);
    }
}

fn run(args: &Args) -> Result<bool> {
    let text = match &args.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Cannot read battery {}", path.display()))?,
        None => BUNDLED_BATTERY.to_string(),
    };
    let battery: Battery = serde_json::from_str(&text).context("Invalid battery JSON")?;

    let override_json = match &args.config {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("Cannot read config {}", path.display()))?,
        ),
        None => None,
    };

    let mut failed = 0usize;
    for case in &battery.cases {
        let cfg = config_for(case.profile, override_json.as_deref())
            .with_context(|| format!("Config for case {}", case.name))?;
        let failures = check_case(case, &cfg);
        if failures.is_empty() {
            println!("PASS  {}", case.name);
        } else {
            failed += 1;
            println!("FAIL  {}", case.name);
            for f in failures {
                println!("      {f}");
            }
        }
    }

    println!("{} / {} cases passed", battery.cases.len() - failed, battery.cases.len());
    Ok(failed == 0)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    if args.list_nodes {
        print_node_table();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_battery_passes() {
        let battery: Battery = serde_json::from_str(BUNDLED_BATTERY).unwrap();
        assert!(!battery.cases.is_empty());
        for case in &battery.cases {
            let cfg = config_for(case.profile, None).unwrap();
            let failures = check_case(case, &cfg);
            assert!(failures.is_empty(), "{}: {failures:?}", case.name);
        }
    }

    #[test]
    fn mismatch_is_reported() {
        let case: Case = serde_json::from_str(
            r#"{"name": "wrong", "pixel": {"above_ground_carbon": 10.0, "loss_year": 1,
                "driver_class": 2, "ecozone": 1, "climate_zone": 11}, "node_code": 999, "co2": 1.0}"#,
        )
        .unwrap();
        assert_eq!(case.profile, Profile::Current);
        let failures = check_case(&case, &ModelConfig::current());
        assert_eq!(failures.len(), 2);
        assert!(failures[0].starts_with("node_code 271"));
    }

    #[test]
    fn config_override_merges_over_case_profile() {
        let cfg = config_for(Profile::Legacy, Some(r#"{ "model_years": 30 }"#)).unwrap();
        assert_eq!(cfg.model_years, 30);
        assert_eq!(cfg.profile, ModelConfig::legacy().profile);
        assert_eq!(config_for(Profile::Legacy, None).unwrap().model_years, 20);
        assert!(config_for(Profile::Current, Some(r#"{ "model_years": 0 }"#)).is_err());
    }

    #[test]
    fn cli_parses_flags() {
        let args = Args::try_parse_from(["ember-test", "--list-nodes", "-vv"]).unwrap();
        assert!(args.list_nodes);
        assert_eq!(args.verbose, 2);
        let args = Args::try_parse_from(["ember-test", "-i", "cases.json"]).unwrap();
        assert_eq!(args.input, Some(PathBuf::from("cases.json")));
    }
}
