//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a combat session produces
//! identical results given identical setups and intents.
//!
//! # Testing Strategy
//!
//! Replays only work if sessions are 100% deterministic. Sources of
//! non-determinism include:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Sessions keep units in a `BTreeMap` and only use hash maps for
//!   point lookups.
//!
//! - **Heap tie-breaks**: equal f-scores in A* must resolve the same way
//!   every run. The open set breaks ties by insertion sequence.
//!
//! - **System randomness**: the core has none.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual modules (pathfinding, turn order, etc.)
//! 2. **Property tests**: random inputs must still produce deterministic outputs
//! 3. **Integration tests**: full encounters are reproducible
//! 4. **Parallel tests**: running N sessions on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use tactics_core::replay::Replay;
use tactics_core::session::{CombatSession, EncounterSetup, Intent};
use tracing::{debug, trace};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps applied per run.
    pub steps: usize,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic session).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs were deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Session is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a stateful process multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `steps` - Number of steps per run; `step` receives the step index
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: usize,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, usize),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for i in 0..steps {
            step(&mut state, i);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        steps,
    }
}

/// Start a session from `setup_fn`, or panic with the setup error.
fn start<F>(setup_fn: &F) -> CombatSession
where
    F: Fn() -> EncounterSetup,
{
    match CombatSession::start(setup_fn()) {
        Ok(session) => session,
        Err(e) => panic!("fixture setup failed: {e}"),
    }
}

/// Run the same intents against two fresh sessions and compare final hashes.
///
/// # Panics
///
/// Panics if `setup_fn` produces an invalid setup.
pub fn verify_session_determinism<F>(setup_fn: F, intents: &[Intent]) -> bool
where
    F: Fn() -> EncounterSetup,
{
    let result = verify_determinism(
        2,
        intents.len(),
        || start(&setup_fn),
        |session, i| {
            session.handle(intents[i]);
        },
        CombatSession::state_hash,
    );
    result.is_deterministic
}

/// Result of parallel session runs.
#[derive(Debug, Clone)]
pub struct ParallelRunResult {
    /// Final state hash from each session.
    pub hashes: Vec<u64>,
    /// Intents fed to each session.
    pub steps: usize,
    /// Number of sessions run.
    pub num_sessions: usize,
}

impl ParallelRunResult {
    /// Check if all sessions produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all sessions matched.
    ///
    /// # Panics
    ///
    /// Panics if sessions produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel sessions diverged!\n\
                 Sessions: {}\n\
                 Steps: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sessions,
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run N sessions on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if `setup_fn` produces an invalid setup or a worker panics.
pub fn run_parallel_sessions<F>(setup_fn: F, num_sessions: usize, intents: &[Intent]) -> ParallelRunResult
where
    F: Fn() -> EncounterSetup + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sessions)
            .map(|_| {
                s.spawn(|| {
                    let mut session = start(&setup_fn);
                    for &intent in intents {
                        session.handle(intent);
                    }
                    session.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelRunResult {
        hashes,
        steps: intents.len(),
        num_sessions,
    }
}

/// Compare two runs intent by intent, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs are deterministic, `Some(n)` if they diverge after
/// `n` intents (0 means the initial states already differ).
///
/// # Panics
///
/// Panics if `setup_fn` produces an invalid setup.
pub fn find_first_divergence<F>(setup_fn: F, intents: &[Intent]) -> Option<usize>
where
    F: Fn() -> EncounterSetup,
{
    let mut a = start(&setup_fn);
    let mut b = start(&setup_fn);

    if a.state_hash() != b.state_hash() {
        debug!("Initial states differ");
        return Some(0);
    }

    for (i, &intent) in intents.iter().enumerate() {
        a.handle(intent);
        b.handle(intent);

        if a.state_hash() != b.state_hash() {
            debug!(
                after = i + 1,
                ?intent,
                hash_a = a.state_hash(),
                hash_b = b.state_hash(),
                "Runs diverged"
            );
            return Some(i + 1);
        }
    }

    trace!(intents = intents.len(), "No divergence");
    None
}

/// Verify that a replay survives a bincode round-trip and still verifies.
///
/// # Panics
///
/// Panics if `setup_fn` produces an invalid setup.
pub fn verify_replay_round_trip<F>(setup_fn: F, intents: &[Intent]) -> bool
where
    F: Fn() -> EncounterSetup,
{
    let mut session = start(&setup_fn);
    let mut replay = Replay::new("round-trip", setup_fn());
    for &intent in intents {
        if session.handle(intent).is_accepted() {
            replay.record(intent);
        }
    }
    replay.finalize(session.state_hash(), session.outcome());

    let Ok(bytes) = replay.to_bytes() else {
        return false;
    };
    let Ok(restored) = Replay::from_bytes(&bytes) else {
        return false;
    };
    restored == replay && restored.verify().unwrap_or(false)
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for grid and session testing.
pub mod strategies {
    use proptest::prelude::*;
    use tactics_core::grid::{Cell, TerrainMap, Tile};
    use tactics_core::session::Intent;
    use tactics_core::turn::TurnEntry;
    use tactics_core::unit::{CombatStats, Team};

    /// A cell inside a `width × height` map.
    pub fn arb_cell(width: i32, height: i32) -> impl Strategy<Value = Cell> {
        (0..width, 0..height).prop_map(|(x, y)| Cell::new(x, y))
    }

    /// A `width × height` terrain with roughly one wall in `1 / wall_odds`.
    pub fn arb_terrain(width: u32, height: u32, wall_odds: u32) -> impl Strategy<Value = TerrainMap> {
        let count = (width * height) as usize;
        proptest::collection::vec(0..wall_odds.max(1), count).prop_map(move |rolls| {
            let mut terrain = TerrainMap::open(width, height);
            for (i, roll) in rolls.into_iter().enumerate() {
                if roll == 0 {
                    let cell = Cell::new((i as u32 % width) as i32, (i as u32 / width) as i32);
                    terrain.set_tile(cell, Tile::Obstacle);
                }
            }
            terrain
        })
    }

    /// Movement budgets (0-8).
    pub fn arb_budget() -> impl Strategy<Value = u32> {
        0u32..8u32
    }

    /// Speed values, narrow on purpose to produce ties.
    pub fn arb_speed() -> impl Strategy<Value = i32> {
        1i32..6i32
    }

    /// Combat stats in a playable range.
    pub fn arb_stats() -> impl Strategy<Value = CombatStats> {
        (1i32..60, arb_speed(), 0u32..5, 1u32..4, 1u32..30).prop_map(
            |(hp, speed, movement, range, power)| {
                CombatStats::default()
                    .with_hp(hp)
                    .with_speed(speed)
                    .with_movement(movement)
                    .with_attack(range, power)
            },
        )
    }

    /// Turn entries for one team, ids starting at `first_id`.
    pub fn arb_team_entries(
        team: Team,
        first_id: u64,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<TurnEntry>> {
        proptest::collection::vec(arb_speed(), 0..max_len).prop_map(move |speeds| {
            speeds
                .into_iter()
                .enumerate()
                .map(|(i, speed)| TurnEntry::new(first_id + i as u64, team, speed))
                .collect()
        })
    }

    /// Any intent touching cells in a `size × size` area and ids below 8.
    pub fn arb_intent(size: i32) -> impl Strategy<Value = Intent> {
        prop_oneof![
            arb_cell(size, size).prop_map(Intent::SelectCell),
            (0u64..8).prop_map(Intent::SelectTarget),
            Just(Intent::ConfirmAttack),
            Just(Intent::CancelAttack),
            Just(Intent::PassTurn),
            (0u64..8).prop_map(Intent::MovementArrived),
        ]
    }

    /// Generate a sequence of intents.
    pub fn arb_intent_sequence(size: i32, max_len: usize) -> impl Strategy<Value = Vec<Intent>> {
        proptest::collection::vec(arb_intent(size), 0..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{attack_or_pass, drive, duel_setup, skirmish_setup};
    use proptest::prelude::*;
    use tactics_core::grid::Cell;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n, _| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_duel_is_deterministic() {
        let intents = [
            Intent::SelectCell(Cell::new(1, 0)),
            Intent::MovementArrived(1),
            Intent::SelectTarget(2),
        ];
        assert!(verify_session_determinism(duel_setup, &intents));
        assert!(find_first_divergence(duel_setup, &intents).is_none());
        assert!(verify_replay_round_trip(duel_setup, &intents));
    }

    #[test]
    fn test_divergent_setups_found_at_start() {
        use crate::fixtures::{enemy, stats};

        let calls = std::cell::Cell::new(0);
        let drifting = || {
            calls.set(calls.get() + 1);
            duel_setup().with_enemy(enemy(3, 4, 4, stats(1).with_hp(calls.get())))
        };
        assert_eq!(find_first_divergence(drifting, &[]), Some(0));
        assert_eq!(calls.get(), 2);
        assert_eq!(find_first_divergence(duel_setup, &[]), None);
    }

    #[test]
    fn test_skirmish_parallel() {
        let mut session = CombatSession::start(skirmish_setup()).unwrap();
        let intents = drive(&mut session, 40, attack_or_pass);

        let result = run_parallel_sessions(skirmish_setup, 4, &intents);
        result.assert_deterministic();
        assert_eq!(result.hashes[0], session.state_hash());
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&(1u64, 2i32)), compute_hash(&(1u64, 2i32)));
        assert_ne!(compute_hash(&1u64), compute_hash(&2u64));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_random_intents_are_deterministic(
            intents in strategies::arb_intent_sequence(8, 40)
        ) {
            prop_assert!(verify_session_determinism(skirmish_setup, &intents));
        }

        #[test]
        fn prop_random_intents_replay(intents in strategies::arb_intent_sequence(5, 20)) {
            prop_assert!(verify_replay_round_trip(duel_setup, &intents));
        }
    }
}
