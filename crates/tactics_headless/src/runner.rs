//! Scripted battle runner.
//!
//! Plays one scenario to completion: the chosen [`PlayerStrategy`] drives the
//! party, every movement step is acknowledged at once, and the battle is
//! called off after `max_turns` turns. The result is a [`BattleReport`]
//! plus a verifiable [`Replay`] of every accepted intent.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tactics_core::error::CombatError;
use tactics_core::events::{CombatEvent, CombatOutcome};
use tactics_core::grid::Cell;
use tactics_core::replay::Replay;
use tactics_core::session::{CombatSession, Intent, IntentOutcome};
use tactics_core::unit::{Team, UnitId};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::scenario::{Scenario, ScenarioError};
use crate::strategies::PlayerStrategy;

/// Error type for battle runs.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The scenario could not be turned into an encounter.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// The session refused the setup.
    #[error("Combat setup failed: {0}")]
    Combat(#[from] CombatError),
    /// Nobody can act and the session has not ended.
    #[error("Battle stalled on turn {turn}")]
    Stalled {
        /// Turns begun when the run gave up.
        turn: u32,
    },
}

/// A unit still standing when the battle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSummary {
    /// Unit identifier.
    pub id: UnitId,
    /// Display name.
    pub name: String,
    /// Side.
    pub team: Team,
    /// Remaining hit points.
    pub hp: i32,
    /// Final cell.
    pub cell: Cell,
}

/// Result of one scripted battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleReport {
    /// Scenario name.
    pub scenario: String,
    /// Player strategy used.
    pub strategy: PlayerStrategy,
    /// How the session ended. `None` when the turn limit was hit.
    pub outcome: Option<CombatOutcome>,
    /// Winning side, if any.
    pub winner: Option<Team>,
    /// The battle was called off at the turn limit.
    pub timed_out: bool,
    /// Turns begun.
    pub turns: u32,
    /// Last round reached.
    pub rounds: u32,
    /// Intents accepted by the session, arrivals included.
    pub intents: usize,
    /// Intents the session rejected.
    pub rejected: usize,
    /// Movement steps taken.
    pub steps: usize,
    /// Total hp removed from enemies.
    pub damage_dealt: u64,
    /// Units that died, in order of death.
    pub fallen: Vec<UnitId>,
    /// Units left standing.
    pub survivors: Vec<UnitSummary>,
    /// Session hash when the run stopped.
    pub final_hash: u64,
}

impl BattleReport {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Save the report to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load a report from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Counters fed from the session's event stream.
#[derive(Debug, Default)]
struct Tally {
    last_hp: BTreeMap<UnitId, i32>,
    steps: usize,
    damage_dealt: u64,
    fallen: Vec<UnitId>,
}

impl Tally {
    fn new(session: &CombatSession) -> Self {
        Self {
            last_hp: session.units().map(|u| (u.id, u.hp)).collect(),
            ..Self::default()
        }
    }

    fn absorb(&mut self, events: Vec<CombatEvent>) {
        for event in events {
            match event {
                CombatEvent::UnitMoved { .. } => self.steps += 1,
                CombatEvent::UnitDamaged { unit, new_hp, .. } => {
                    if let Some(hp) = self.last_hp.get_mut(&unit) {
                        self.damage_dealt += u64::from(hp.abs_diff(new_hp));
                        *hp = new_hp;
                    }
                }
                CombatEvent::UnitDied(unit) => self.fallen.push(unit),
                _ => {}
            }
        }
    }
}

/// Runs one scenario with a scripted player side.
#[derive(Debug, Clone)]
pub struct BattleRunner {
    scenario: Scenario,
    strategy: PlayerStrategy,
    max_turns: u32,
}

impl BattleRunner {
    /// Runner using the scenario's own strategy and turn limit.
    #[must_use]
    pub fn new(scenario: Scenario) -> Self {
        let strategy = scenario.strategy;
        let max_turns = scenario.max_turns;
        Self {
            scenario,
            strategy,
            max_turns,
        }
    }

    /// Builder method to override the player strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: PlayerStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Builder method to override the turn limit.
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// The scenario being run.
    #[must_use]
    pub const fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// The player strategy in use.
    #[must_use]
    pub const fn strategy(&self) -> PlayerStrategy {
        self.strategy
    }

    /// Play the battle and return the report.
    pub fn run(&self) -> Result<BattleReport, RunnerError> {
        self.run_recorded().map(|(report, _)| report)
    }

    /// Play the battle, returning the report and a replay of it.
    ///
    /// The replay's final hash is taken before a timed-out battle is
    /// aborted, so replaying it reproduces the hash exactly.
    pub fn run_recorded(&self) -> Result<(BattleReport, Replay), RunnerError> {
        let setup = self.scenario.to_setup()?;
        let mut replay = Replay::new(self.scenario.name.clone(), setup.clone());
        let mut session = CombatSession::start(setup)?;
        let mut tally = Tally::new(&session);
        let mut accepted = 0;
        let mut rejected = 0;
        let mut timed_out = false;

        info!(
            scenario = %self.scenario.name,
            strategy = %self.strategy,
            max_turns = self.max_turns,
            "Battle started"
        );

        loop {
            tally.absorb(session.drain_events());
            if !session.is_active() {
                break;
            }
            if session.turns_taken() > self.max_turns && session.awaiting_movement().is_none() {
                warn!(turns = session.turns_taken(), "Turn limit reached, calling the battle off");
                replay.finalize(session.state_hash(), None);
                session.abort();
                timed_out = true;
                continue;
            }

            let intent = match (session.awaiting_movement(), session.current_actor()) {
                (Some(unit), _) => Intent::MovementArrived(unit),
                (None, Some(actor)) => self.strategy.decide(&session, actor),
                (None, None) => {
                    return Err(RunnerError::Stalled {
                        turn: session.turns_taken(),
                    })
                }
            };

            match session.handle(intent) {
                IntentOutcome::Accepted => {
                    replay.record(intent);
                    accepted += 1;
                }
                IntentOutcome::Rejected(reason) => {
                    rejected += 1;
                    debug!(?intent, ?reason, "Strategy intent rejected, passing instead");
                    if session.handle(Intent::PassTurn).is_accepted() {
                        replay.record(Intent::PassTurn);
                        accepted += 1;
                    } else {
                        return Err(RunnerError::Stalled {
                            turn: session.turns_taken(),
                        });
                    }
                }
            }
        }

        if !timed_out {
            replay.finalize(session.state_hash(), session.outcome());
        }
        let outcome = session.outcome().filter(|_| !timed_out);
        let report = BattleReport {
            scenario: self.scenario.name.clone(),
            strategy: self.strategy,
            outcome,
            winner: outcome.and_then(CombatOutcome::winner),
            timed_out,
            turns: session.turns_taken(),
            rounds: session.turn_order().round(),
            intents: accepted,
            rejected,
            steps: tally.steps,
            damage_dealt: tally.damage_dealt,
            fallen: tally.fallen,
            survivors: session
                .units()
                .filter(|u| u.is_alive())
                .map(|u| UnitSummary {
                    id: u.id,
                    name: u.name.clone(),
                    team: u.team,
                    hp: u.hp,
                    cell: u.position,
                })
                .collect(),
            final_hash: replay.final_hash,
        };

        info!(
            scenario = %report.scenario,
            winner = ?report.winner,
            turns = report.turns,
            timed_out = report.timed_out,
            "Battle finished"
        );
        Ok((report, replay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactics_core::turn::EndReason;

    #[test]
    fn test_duel_report() {
        let report = BattleRunner::new(Scenario::duel()).run().unwrap();
        assert_eq!(
            report.outcome,
            Some(CombatOutcome::Resolved(EndReason::TeamDefeated(Team::Enemy)))
        );
        assert_eq!(report.winner, Some(Team::Player));
        assert!(!report.timed_out);
        assert_eq!(report.fallen, vec![2]);
        assert_eq!(report.damage_dealt, 10);
        assert_eq!(report.steps, 1);
        assert_eq!(report.rejected, 0);
        assert_eq!(report.survivors.len(), 1);
        assert_eq!(report.survivors[0].cell, Cell::new(1, 0));
    }

    #[test]
    fn test_passive_times_out() {
        let report = BattleRunner::new(Scenario::skirmish())
            .with_strategy(PlayerStrategy::Passive)
            .with_max_turns(12)
            .run()
            .unwrap();
        assert!(report.timed_out);
        assert_eq!(report.outcome, None);
        assert_eq!(report.winner, None);
        assert!(report.fallen.is_empty());
        assert_eq!(report.survivors.len(), 5);
    }

    #[test]
    fn test_replay_matches_report() {
        for strategy in PlayerStrategy::ALL {
            let runner = BattleRunner::new(Scenario::skirmish())
                .with_strategy(strategy)
                .with_max_turns(30);
            let (report, replay) = runner.run_recorded().unwrap();
            assert_eq!(replay.final_hash, report.final_hash);
            assert!(replay.verify().unwrap(), "{strategy} replay diverged");
        }
    }

    #[test]
    fn test_report_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/duel.json");
        let report = BattleRunner::new(Scenario::duel()).run().unwrap();
        report.save(&path).unwrap();
        assert_eq!(BattleReport::load(&path).unwrap(), report);
    }

    #[test]
    fn test_invalid_placement_is_an_error() {
        let mut scenario = Scenario::duel();
        scenario.enemies[0].position = (0, 0);
        assert!(matches!(
            BattleRunner::new(scenario).run(),
            Err(RunnerError::Combat(_))
        ));
    }
}
