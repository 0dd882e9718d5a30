//! Batch battle runner and determinism verification.
//!
//! Runs many battles in parallel using rayon. Every battle builds its own
//! session, so nothing is shared between workers.

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tactics_core::replay::Replay;
use tracing::{info, warn};

use crate::runner::{BattleReport, BattleRunner, RunnerError};
use crate::scenario::Scenario;
use crate::strategies::PlayerStrategy;

/// Error during a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Scenario name.
    pub scenario: String,
    /// Strategy used.
    pub strategy: PlayerStrategy,
    /// Error message.
    pub message: String,
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Completed battles, in job order.
    pub reports: Vec<BattleReport>,
    /// Battles that failed to run.
    pub errors: Vec<BatchError>,
    /// Total runtime.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Fraction of completed battles won by the player side.
    #[must_use]
    pub fn player_win_rate(&self) -> f64 {
        if self.reports.is_empty() {
            return 0.0;
        }
        let wins = self
            .reports
            .iter()
            .filter(|r| r.winner == Some(tactics_core::unit::Team::Player))
            .count();
        wins as f64 / self.reports.len() as f64
    }

    /// Save results to JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Run every scenario against every strategy.
pub fn run_batch(scenarios: &[Scenario], strategies: &[PlayerStrategy]) -> BatchResults {
    let start = Instant::now();
    let jobs: Vec<(&Scenario, PlayerStrategy)> = scenarios
        .iter()
        .flat_map(|s| strategies.iter().map(move |&strategy| (s, strategy)))
        .collect();

    info!(battles = jobs.len(), "Starting batch run");

    let results: Vec<Result<BattleReport, BatchError>> = jobs
        .par_iter()
        .map(|&(scenario, strategy)| {
            BattleRunner::new(scenario.clone())
                .with_strategy(strategy)
                .run()
                .map_err(|e| BatchError {
                    scenario: scenario.name.clone(),
                    strategy,
                    message: e.to_string(),
                })
        })
        .collect();

    let mut reports = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(error) => {
                warn!(scenario = %error.scenario, strategy = %error.strategy, message = %error.message, "Battle failed");
                errors.push(error);
            }
        }
    }

    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        completed = reports.len(),
        failed = errors.len(),
        duration_secs = format!("{duration_seconds:.2}"),
        "Batch finished"
    );
    BatchResults {
        reports,
        errors,
        duration_seconds,
    }
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    /// Scenario name.
    pub scenario: String,
    /// Strategy used.
    pub strategy: PlayerStrategy,
    /// Final hash of each run.
    pub hashes: Vec<u64>,
    /// Every run and its replay produced the same hash.
    pub deterministic: bool,
}

/// Run the same battle `runs` times in parallel and compare the results.
///
/// Each run's replay is also played back, so a replay that diverges from its
/// own recording counts as non-deterministic.
pub fn verify_determinism(
    scenario: &Scenario,
    strategy: PlayerStrategy,
    runs: u32,
) -> Result<VerifyResult, RunnerError> {
    let runner = BattleRunner::new(scenario.clone()).with_strategy(strategy);
    let outcomes: Vec<(u64, bool)> = (0..runs.max(1))
        .into_par_iter()
        .map(|_| -> Result<(u64, bool), RunnerError> {
            let (report, replay) = runner.run_recorded()?;
            Ok((report.final_hash, replay_reproduces(&replay)?))
        })
        .collect::<Result<_, RunnerError>>()?;

    let hashes: Vec<u64> = outcomes.iter().map(|&(hash, _)| hash).collect();
    let deterministic =
        hashes.windows(2).all(|w| w[0] == w[1]) && outcomes.iter().all(|&(_, ok)| ok);
    if !deterministic {
        warn!(scenario = %scenario.name, %strategy, ?hashes, "Non-determinism detected");
    }

    Ok(VerifyResult {
        scenario: scenario.name.clone(),
        strategy,
        hashes,
        deterministic,
    })
}

/// Play `replay` back and compare against its recorded hash.
fn replay_reproduces(replay: &Replay) -> Result<bool, RunnerError> {
    replay.verify().map_err(|e| {
        warn!(scenario = %replay.scenario_id, error = %e, "Replay playback failed");
        RunnerError::from(e)
    })
}
