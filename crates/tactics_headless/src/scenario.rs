//! Scenario loading and configuration.
//!
//! Scenarios describe a single encounter for headless runs: the battlefield
//! as ASCII rows, both rosters, the rules and the scripted player strategy.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tactics_core::config::CombatConfig;
use tactics_core::error::CombatError;
use tactics_core::grid::{Cell, TerrainMap};
use tactics_core::session::EncounterSetup;
use tactics_core::unit::{CombatStats, CombatUnit, Team, UnitId};
use thiserror::Error;

use crate::strategies::PlayerStrategy;

/// Default turn limit for a headless battle.
pub const DEFAULT_MAX_TURNS: u32 = 200;

/// Names accepted by [`Scenario::builtin`].
pub const BUILTIN_SCENARIOS: [&str; 3] = ["duel", "skirmish", "gauntlet"];

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The map or rosters do not form a valid encounter.
    #[error("Invalid scenario: {0}")]
    Invalid(#[from] CombatError),
}

fn default_max_turns() -> u32 {
    DEFAULT_MAX_TURNS
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Map rows, top row first. `.` floor, `#` obstacle, `~` void.
    pub map: Vec<String>,
    /// Player units, in encounter order.
    pub party: Vec<UnitPlacement>,
    /// Enemy units, in encounter order.
    pub enemies: Vec<UnitPlacement>,
    /// Combat rules.
    #[serde(default)]
    pub config: CombatConfig,
    /// Turns begun before the battle is called off.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// How the player side is scripted.
    #[serde(default)]
    pub strategy: PlayerStrategy,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Look up a built-in scenario by name, falling back to a file path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match Self::builtin(name_or_path) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name_or_path),
        }
    }

    /// A built-in scenario, if `name` is one of [`BUILTIN_SCENARIOS`].
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "duel" => Some(Self::duel()),
            "skirmish" => Some(Self::skirmish()),
            "gauntlet" => Some(Self::gauntlet()),
            _ => None,
        }
    }

    /// Every built-in scenario.
    #[must_use]
    pub fn all_builtin() -> Vec<Self> {
        BUILTIN_SCENARIOS
            .iter()
            .filter_map(|name| Self::builtin(name))
            .collect()
    }

    /// One fighter each on open ground.
    #[must_use]
    pub fn duel() -> Self {
        let fighter = |speed| CombatStats::default().with_hp(10).with_speed(speed).with_attack(1, 10);
        Self {
            name: "duel".to_string(),
            description: "Attacker against a single defender two cells away".to_string(),
            map: vec![".....".to_string(); 5],
            party: vec![UnitPlacement::new(1, "attacker", 0, 0, fighter(10))],
            enemies: vec![UnitPlacement::new(2, "defender", 2, 0, fighter(5))],
            config: CombatConfig::default(),
            max_turns: DEFAULT_MAX_TURNS,
            strategy: PlayerStrategy::Aggressive,
        }
    }

    /// Two players against three enemies around a pillar.
    #[must_use]
    pub fn skirmish() -> Self {
        let base = CombatStats::default();
        Self {
            name: "skirmish".to_string(),
            description: "Knight and archer against three slimes around a pillar".to_string(),
            map: rows(&[
                "........", "........", "...#....", "...#....", "........", "........",
            ]),
            party: vec![
                UnitPlacement::new(1, "knight", 0, 0, base.with_speed(7).with_attack(1, 25)),
                UnitPlacement::new(2, "archer", 0, 2, base.with_speed(4).with_attack(3, 15)),
            ],
            enemies: vec![
                UnitPlacement::new(10, "slime", 7, 5, base.with_speed(6).with_hp(40)),
                UnitPlacement::new(11, "slime", 6, 1, base.with_speed(5).with_hp(40)),
                UnitPlacement::new(12, "slime", 5, 3, base.with_speed(2).with_hp(40)),
            ],
            config: CombatConfig::default(),
            max_turns: DEFAULT_MAX_TURNS,
            strategy: PlayerStrategy::Aggressive,
        }
    }

    /// A walled corridor the enemies have to wind through.
    #[must_use]
    pub fn gauntlet() -> Self {
        let base = CombatStats::default();
        Self {
            name: "gauntlet".to_string(),
            description: "Party holds the end of a winding corridor".to_string(),
            map: rows(&[
                "..........",
                "#######...",
                "..........",
                "...#######",
                "..........",
            ]),
            party: vec![
                UnitPlacement::new(1, "warden", 0, 0, base.with_speed(6).with_attack(1, 30)),
                UnitPlacement::new(2, "sniper", 1, 0, base.with_speed(3).with_attack(4, 12)),
            ],
            enemies: vec![
                UnitPlacement::new(20, "raider", 0, 4, base.with_speed(8).with_hp(60).with_movement(4)),
                UnitPlacement::new(21, "raider", 1, 4, base.with_speed(7).with_hp(60).with_movement(4)),
            ],
            config: CombatConfig {
                enemy_respects_movement_range: true,
                ..CombatConfig::default()
            },
            max_turns: DEFAULT_MAX_TURNS,
            strategy: PlayerStrategy::Cautious,
        }
    }

    /// Parse the map rows.
    pub fn terrain(&self) -> Result<TerrainMap, ScenarioError> {
        Ok(TerrainMap::from_ascii(&self.map)?)
    }

    /// Build the encounter.
    ///
    /// Placement problems (walls, overlaps, duplicate ids) surface when the
    /// session is created, not here.
    pub fn to_setup(&self) -> Result<EncounterSetup, ScenarioError> {
        let mut setup = EncounterSetup::new(self.terrain()?).with_config(self.config.clone());
        for unit in &self.party {
            setup = setup.with_player(unit.to_unit(Team::Player));
        }
        for unit in &self.enemies {
            setup = setup.with_enemy(unit.to_unit(Team::Enemy));
        }
        Ok(setup)
    }
}

fn rows(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| (*l).to_string()).collect()
}

/// Placement of a unit at scenario start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit identifier, unique across both rosters.
    pub id: UnitId,
    /// Display name.
    pub name: String,
    /// Starting cell (x, y).
    pub position: (i32, i32),
    /// Combat stats. Missing fields take their defaults.
    #[serde(default)]
    pub stats: CombatStats,
}

impl UnitPlacement {
    /// Create a new unit placement.
    #[must_use]
    pub fn new(id: UnitId, name: impl Into<String>, x: i32, y: i32, stats: CombatStats) -> Self {
        Self {
            id,
            name: name.into(),
            position: (x, y),
            stats,
        }
    }

    fn to_unit(&self, team: Team) -> CombatUnit {
        CombatUnit::new(self.id, self.name.clone(), team, Cell::from(self.position), self.stats)
    }
}
