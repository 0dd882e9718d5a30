//! Replay system for recording and playing back encounters.
//!
//! A replay stores the encounter setup and the stream of accepted intents.
//! Sessions are deterministic, so feeding the same intents into a fresh
//! session rebuilds the exact same battle.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CombatError, Result};
use crate::events::CombatOutcome;
use crate::session::{CombatSession, EncounterSetup, Intent};

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Complete replay data structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario identifier or name.
    pub scenario_id: String,
    /// Starting state.
    pub setup: EncounterSetup,
    /// Accepted intents, in order.
    pub intents: Vec<Intent>,
    /// [`CombatSession::state_hash`] after the last intent.
    pub final_hash: u64,
    /// How the recorded battle ended, if it did.
    pub outcome: Option<CombatOutcome>,
}

impl Replay {
    /// Start a recording for `setup`.
    #[must_use]
    pub fn new(scenario_id: impl Into<String>, setup: EncounterSetup) -> Self {
        Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            setup,
            intents: Vec::new(),
            final_hash: 0,
            outcome: None,
        }
    }

    /// Record an intent.
    pub fn record(&mut self, intent: Intent) {
        self.intents.push(intent);
    }

    /// Finalize the replay with the end state.
    pub fn finalize(&mut self, final_hash: u64, outcome: Option<CombatOutcome>) {
        self.final_hash = final_hash;
        self.outcome = outcome;
    }

    /// Get the total number of intents in the replay.
    #[must_use]
    pub fn intent_count(&self) -> usize {
        self.intents.len()
    }

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| CombatError::Replay(format!("Failed to serialize replay: {e}")))
    }

    /// Decode from bincode, checking the format version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(bytes)
            .map_err(|e| CombatError::Replay(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(CombatError::Replay(format!(
                "Replay version mismatch: expected {}, got {}",
                REPLAY_VERSION, replay.version
            )));
        }
        Ok(replay)
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if file reading, decoding or the version check fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Re-run the whole replay and compare the final state hash.
    ///
    /// # Errors
    /// Returns an error if the setup no longer produces a valid session.
    pub fn verify(&self) -> Result<bool> {
        let mut player = ReplayPlayer::new(self.clone())?;
        player.verify()
    }
}

/// Step-by-step replay playback.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    session: CombatSession,
    /// Index into the intent stream.
    intent_index: usize,
}

impl ReplayPlayer {
    /// Create a new replay player from a replay.
    ///
    /// # Errors
    /// Returns an error if the setup cannot start a session.
    pub fn new(replay: Replay) -> Result<Self> {
        let session = CombatSession::start(replay.setup.clone())?;
        Ok(Self {
            replay,
            session,
            intent_index: 0,
        })
    }

    /// Apply the next intent.
    ///
    /// Returns true if there are more intents to play.
    pub fn advance(&mut self) -> bool {
        if let Some(&intent) = self.replay.intents.get(self.intent_index) {
            self.session.handle(intent);
            self.intent_index += 1;
        }
        !self.is_finished()
    }

    /// Restart from the setup and play up to `target` intents.
    ///
    /// # Errors
    /// Returns an error if the setup cannot start a session.
    pub fn seek(&mut self, target: usize) -> Result<()> {
        self.session = CombatSession::start(self.replay.setup.clone())?;
        self.intent_index = 0;
        while self.intent_index < target && !self.is_finished() {
            self.advance();
        }
        Ok(())
    }

    /// Intents applied so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.intent_index
    }

    /// The session being replayed.
    #[must_use]
    pub const fn session(&self) -> &CombatSession {
        &self.session
    }

    /// Mutable session access, for draining events during playback.
    pub fn session_mut(&mut self) -> &mut CombatSession {
        &mut self.session
    }

    /// Get the replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Check if every intent has been applied.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.intent_index >= self.replay.intents.len()
    }

    /// Play to the end and compare against the recorded hash.
    ///
    /// # Errors
    /// Returns an error if the setup cannot start a session.
    pub fn verify(&mut self) -> Result<bool> {
        self.seek(self.replay.intents.len())?;
        Ok(self.session.state_hash() == self.replay.final_hash)
    }

    /// Get progress as a percentage (0-100).
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.replay.intents.is_empty() {
            100.0
        } else {
            (self.intent_index as f64 / self.replay.intents.len() as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Cell, TerrainMap, Tile};
    use crate::unit::{CombatStats, CombatUnit, Team};

    fn create_test_setup() -> EncounterSetup {
        let stats = CombatStats::default().with_hp(10).with_attack(1, 10);
        EncounterSetup::new(TerrainMap::open(5, 5))
            .with_player(CombatUnit::new(
                1,
                "Knight",
                Team::Player,
                Cell::new(0, 0),
                stats.with_speed(10),
            ))
            .with_enemy(CombatUnit::new(
                2,
                "Slime",
                Team::Enemy,
                Cell::new(2, 0),
                stats,
            ))
    }

    /// Record a finished duel the way a live caller would.
    fn recorded_duel() -> Replay {
        let setup = create_test_setup();
        let mut session = CombatSession::start(setup.clone()).unwrap();
        let mut replay = Replay::new("duel", setup);
        for intent in [
            Intent::SelectCell(Cell::new(1, 0)),
            Intent::MovementArrived(1),
            Intent::SelectTarget(2),
        ] {
            assert!(session.handle(intent).is_accepted());
            replay.record(intent);
        }
        replay.finalize(session.state_hash(), session.outcome());
        replay
    }

    #[test]
    fn test_replay_create() {
        let replay = Replay::new("test_scenario", create_test_setup());
        assert_eq!(replay.version, REPLAY_VERSION);
        assert_eq!(replay.scenario_id, "test_scenario");
        assert_eq!(replay.intent_count(), 0);
        assert!(replay.outcome.is_none());
    }

    #[test]
    fn test_replay_verify() {
        let replay = recorded_duel();
        assert!(replay.outcome.is_some());
        assert!(replay.verify().unwrap());

        let mut tampered = replay;
        tampered.intents.pop();
        assert!(!tampered.verify().unwrap());
    }

    #[test]
    fn test_replay_save_load() {
        let replay = recorded_duel();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duel.replay");

        replay.save(&path).unwrap();
        let loaded = Replay::load(&path).unwrap();
        assert_eq!(loaded, replay);
        assert!(loaded.verify().unwrap());
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut replay = recorded_duel();
        replay.version = REPLAY_VERSION + 1;
        let bytes = bincode::serialize(&replay).unwrap();
        assert!(matches!(
            Replay::from_bytes(&bytes),
            Err(CombatError::Replay(_))
        ));
        assert!(Replay::from_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_truncated_terrain_rejected() {
        let replay = recorded_duel();
        let bytes = bincode::serialize(&replay).unwrap();

        // Same encoding as the terrain struct, but 1 tile for a 5x5 map.
        let terrain = bincode::serialize(&replay.setup.terrain).unwrap();
        let truncated = bincode::serialize(&(5u32, 5u32, vec![Tile::Floor])).unwrap();
        let at = bytes
            .windows(terrain.len())
            .position(|w| w == terrain.as_slice())
            .unwrap();
        let mut corrupt = bytes[..at].to_vec();
        corrupt.extend_from_slice(&truncated);
        corrupt.extend_from_slice(&bytes[at + terrain.len()..]);

        assert!(matches!(
            Replay::from_bytes(&corrupt),
            Err(CombatError::Replay(_))
        ));
    }

    #[test]
    fn test_player_steps_and_seeks() {
        let mut player = ReplayPlayer::new(recorded_duel()).unwrap();
        assert_eq!(player.position(), 0);
        assert!(player.session().is_active());

        assert!(player.advance());
        assert_eq!(player.session().awaiting_movement(), Some(1));
        assert!((player.progress_percent() - 100.0 / 3.0).abs() < 1e-9);

        player.seek(3).unwrap();
        assert!(player.is_finished());
        assert!(player.session().is_ended());

        player.seek(1).unwrap();
        assert_eq!(player.position(), 1);
        assert!(player.session().is_active());
    }
}
