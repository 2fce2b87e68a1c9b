//! Headless Battle Runner
//!
//! Loads a scenario, resolves its attack and prints the battle report.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use serde::Serialize;
use shieldwall::battle::{resolve_attack, BattleReport};
use shieldwall::core::{CombatConfig, GameRng};
use shieldwall::world::Scenario;

/// Headless Battle Runner - resolve one scenario's attack
#[derive(Parser, Debug)]
#[command(name = "battle_runner")]
#[command(about = "Resolve a combat scenario and print the battle report")]
struct Args {
    /// Scenario file (TOML)
    scenario: PathBuf,

    /// Random seed for deterministic runs; overrides the scenario's seed
    #[arg(long)]
    seed: Option<u64>,

    /// Combat configuration file (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Enable verbose battle logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// JSON output structure
#[derive(Serialize)]
struct RunResult<'a> {
    scenario: &'a str,
    seed: u64,
    draws: u64,
    report: &'a BattleReport,
}

fn fail(message: String) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}

fn print_text(result: &RunResult<'_>) {
    let report = result.report;
    println!("Battle Result");
    println!("=============");
    println!("Scenario: {}", result.scenario);
    println!("Outcome: {:?}", report.outcome);
    println!("Rounds: {}", report.rounds_fought);
    println!("Location: {}", report.location);
    println!();
    for event in &report.log.events {
        println!("  [{}] {}", event.round, event.description);
    }
    println!();
    for casualty in &report.casualties {
        println!(
            "{} lost {} of {} ({} fled)",
            casualty.unit, casualty.killed, casualty.item, casualty.fled
        );
    }
    for fate in &report.noble_fates {
        println!("{} ({}): {:?}", fate.unit, fate.side, fate.fate);
    }
    if report.structure_damage > 0 {
        println!("Structure damage: {}", report.structure_damage);
    }
    println!();
    println!("Seed: {} ({} draws)", result.seed, result.draws);
}

fn main() {
    let args = Args::parse();

    let filter = if args.verbose {
        "shieldwall=debug"
    } else {
        "shieldwall=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let scenario = Scenario::load(&args.scenario).unwrap_or_else(|e| {
        fail(format!(
            "Failed to load scenario '{}': {}",
            args.scenario.display(),
            e
        ))
    });

    let config = match &args.config {
        Some(path) => CombatConfig::load(path).unwrap_or_else(|e| {
            fail(format!("Failed to load config '{}': {}", path.display(), e))
        }),
        None => CombatConfig::default(),
    };

    // Determine seed
    let seed = args
        .seed
        .or(scenario.seed)
        .unwrap_or_else(rand::random);
    let mut rng = GameRng::new(seed);
    let mut world = scenario.build_world();

    tracing::info!(scenario = %scenario.name, seed, "resolving attack");
    let report = resolve_attack(&mut world, &scenario.request(), &config, &mut rng)
        .unwrap_or_else(|e| fail(format!("Battle aborted: {}", e)));

    let result = RunResult {
        scenario: &scenario.name,
        seed,
        draws: rng.draws(),
        report: &report,
    };

    match args.format.as_str() {
        "text" => print_text(&result),
        other => {
            if other != "json" {
                eprintln!("Unknown format '{}', defaulting to json", other);
            }
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{}", json),
                Err(e) => fail(format!("Failed to serialize report: {}", e)),
            }
        }
    }
}
