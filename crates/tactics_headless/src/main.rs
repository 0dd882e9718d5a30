//! Headless tactical combat runner.
//!
//! This binary plays encounters without any presentation layer, either
//! scripted or controlled via JSON on stdin/stdout. Designed for
//! playtesting, CI and replay verification.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p tactics_headless
//!
//! # Run a single scripted battle
//! cargo run -p tactics_headless -- run --scenario skirmish --strategy cautious
//!
//! # Run every built-in scenario against every strategy
//! cargo run -p tactics_headless -- batch --output results/batch.json
//!
//! # Verify a recorded battle
//! cargo run -p tactics_headless -- replay --file duel.replay --verify
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information
//!
//! See the protocol module for command/response format.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tactics_core::replay::Replay;
use tactics_headless::{
    ascii::{render_setup, AsciiConfig},
    batch::{run_batch, verify_determinism},
    interactive::InteractiveRunner,
    runner::BattleRunner,
    scenario::{Scenario, BUILTIN_SCENARIOS},
    strategies::PlayerStrategy,
};

#[derive(Parser)]
#[command(name = "tactics_headless")]
#[command(about = "Headless tactical combat runner for playtesting and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scenario to completion with a scripted party
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Override the scenario's player strategy
        #[arg(long)]
        strategy: Option<PlayerStrategy>,

        /// Override the scenario's turn limit
        #[arg(long)]
        max_turns: Option<u32>,

        /// Write the report JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record a replay of the battle
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Print the starting battlefield to stderr
        #[arg(long)]
        render: bool,
    },

    /// Run scenarios against every strategy in parallel
    Batch {
        /// Scenarios to run (default: all built-ins)
        #[arg(short, long)]
        scenario: Vec<String>,

        /// Output file for results
        #[arg(short, long, default_value = "results/batch.json")]
        output: PathBuf,
    },

    /// Verify determinism by running the same battle multiple times
    Verify {
        /// Scenario to test
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Player strategy
        #[arg(long, default_value = "aggressive")]
        strategy: PlayerStrategy,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Inspect a recorded battle
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,

        /// Verify replay produces identical hash
        #[arg(long)]
        verify: bool,
    },

    /// Draw a scenario's starting battlefield
    Render {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Drive a battle command by command over stdin/stdout
    Play {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            strategy,
            max_turns,
            output,
            replay,
            render,
        }) => cmd_run(&scenario, strategy, max_turns, output, replay, render),
        Some(Commands::Batch { scenario, output }) => cmd_batch(&scenario, &output),
        Some(Commands::Verify {
            scenario,
            strategy,
            runs,
        }) => cmd_verify(&scenario, strategy, runs),
        Some(Commands::Replay { file, verify }) => cmd_replay(&file, verify),
        Some(Commands::Render { scenario, no_color }) => cmd_render(&scenario, !no_color),
        Some(Commands::Play { scenario }) => cmd_play(&scenario),
        None => {
            // Default: interactive mode
            cmd_play("skirmish");
        }
    }
}

fn load_scenario(name: &str) -> Scenario {
    match Scenario::resolve(name) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load scenario '{name}': {e}");
            std::process::exit(1);
        }
    }
}

/// Run a single scripted battle
fn cmd_run(
    scenario: &str,
    strategy: Option<PlayerStrategy>,
    max_turns: Option<u32>,
    output: Option<PathBuf>,
    replay_path: Option<PathBuf>,
    render: bool,
) {
    let scenario = load_scenario(scenario);
    if render {
        match scenario.to_setup() {
            Ok(setup) => eprint!("{}", render_setup(&setup, &AsciiConfig::default())),
            Err(e) => {
                eprintln!("Invalid scenario: {e}");
                std::process::exit(1);
            }
        }
    }

    let mut runner = BattleRunner::new(scenario);
    if let Some(strategy) = strategy {
        runner = runner.with_strategy(strategy);
    }
    if let Some(max_turns) = max_turns {
        runner = runner.with_max_turns(max_turns);
    }

    let (report, replay) = match runner.run_recorded() {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Battle failed: {e}");
            std::process::exit(1);
        }
    };

    if let Some(path) = replay_path {
        if let Err(e) = replay.save(&path) {
            eprintln!("Failed to save replay: {e}");
            std::process::exit(1);
        }
        eprintln!("Replay saved to: {} ({} intents)", path.display(), replay.intent_count());
    }

    match output {
        Some(path) => {
            if let Err(e) = report.save(&path) {
                eprintln!("Failed to save report: {e}");
                std::process::exit(1);
            }
            eprintln!("Report saved to: {}", path.display());
        }
        None => match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize report: {e}");
                std::process::exit(1);
            }
        },
    }
}

/// Run every requested scenario against every strategy
fn cmd_batch(names: &[String], output: &Path) {
    let scenarios: Vec<Scenario> = if names.is_empty() {
        BUILTIN_SCENARIOS.iter().map(|name| load_scenario(name)).collect()
    } else {
        names.iter().map(|name| load_scenario(name)).collect()
    };

    let results = run_batch(&scenarios, &PlayerStrategy::ALL);
    if let Err(e) = results.save(output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {e}");
        std::process::exit(1);
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Battles played: {}", results.reports.len());
    eprintln!("Duration: {:.2}s", results.duration_seconds);
    eprintln!("Player win rate: {:.1}%", results.player_win_rate() * 100.0);
    eprintln!();
    for report in &results.reports {
        let result = match (report.winner, report.timed_out) {
            (_, true) => "timed out".to_string(),
            (Some(team), false) => format!("{team:?} won"),
            (None, false) => "no winner".to_string(),
        };
        eprintln!(
            "  {:<10} {:<10} {:<12} turns {:>4}  damage {:>5}",
            report.scenario, report.strategy, result, report.turns, report.damage_dealt
        );
    }
    if !results.errors.is_empty() {
        eprintln!("\nFAILURES:");
        for error in &results.errors {
            eprintln!("  {} / {}: {}", error.scenario, error.strategy, error.message);
        }
    }
    eprintln!("\nResults saved to: {}", output.display());
}

/// Verify determinism
fn cmd_verify(scenario: &str, strategy: PlayerStrategy, runs: u32) {
    let scenario = load_scenario(scenario);
    tracing::info!(
        "Verifying determinism: {} with {} ({} runs)",
        scenario.name,
        strategy,
        runs
    );

    match verify_determinism(&scenario, strategy, runs) {
        Ok(result) if result.deterministic => {
            eprintln!(
                "✓ {} runs produced identical hash {:016x}",
                result.hashes.len(),
                result.hashes.first().copied().unwrap_or_default()
            );
        }
        Ok(result) => {
            eprintln!("✗ Determinism check FAILED");
            for (i, hash) in result.hashes.iter().enumerate() {
                eprintln!("  run {i}: {hash:016x}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Verification failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Inspect and optionally verify a replay
fn cmd_replay(file: &Path, verify: bool) {
    let replay = match Replay::load(file) {
        Ok(replay) => replay,
        Err(e) => {
            eprintln!("Failed to load replay: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("Replay: {}", file.display());
    eprintln!("  Scenario: {}", replay.scenario_id);
    eprintln!("  Intents: {}", replay.intent_count());
    eprintln!("  Outcome: {:?}", replay.outcome);
    eprintln!("  Final hash: {:016x}", replay.final_hash);

    if verify {
        match replay.verify() {
            Ok(true) => eprintln!("✓ Replay reproduces the recorded hash"),
            Ok(false) => {
                eprintln!("✗ Replay diverged from the recorded hash");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("Replay verification failed: {e}");
                std::process::exit(1);
            }
        }
    }
}

/// Print a scenario's starting battlefield
fn cmd_render(scenario: &str, use_color: bool) {
    let scenario = load_scenario(scenario);
    let setup = match scenario.to_setup() {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("Invalid scenario: {e}");
            std::process::exit(1);
        }
    };
    let config = AsciiConfig {
        use_color,
        ..AsciiConfig::default()
    };
    println!("{}: {}", scenario.name, scenario.description);
    print!("{}", render_setup(&setup, &config));
}

/// Run an interactive session over stdin/stdout
fn cmd_play(scenario: &str) {
    let scenario = load_scenario(scenario);
    tracing::info!(scenario = %scenario.name, "Starting interactive session");

    let runner = match InteractiveRunner::new(&scenario) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Failed to start session: {e}");
            std::process::exit(1);
        }
    };
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    if let Err(e) = runner.run(stdin.lock(), stdout.lock()) {
        tracing::error!(error = %e, "I/O error");
        std::process::exit(1);
    }
}
