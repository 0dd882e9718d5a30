//! Scripted player strategies for headless playtesting.
//!
//! A strategy turns the current session state into the next player
//! [`Intent`]. Strategies never see movement acknowledgments; the runner
//! reports arrivals itself.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tactics_core::grid::Cell;
use tactics_core::session::{CombatSession, Intent, Phase};
use tactics_core::unit::{CombatUnit, UnitId};
use thiserror::Error;

/// Error type for strategy operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    /// Name not recognised.
    #[error("Unknown strategy '{0}' (expected aggressive, cautious or passive)")]
    Unknown(String),
}

/// How the player side is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlayerStrategy {
    /// Attack when something is in reach, otherwise close in.
    #[default]
    Aggressive,
    /// Attack when something is in reach, otherwise hold.
    Cautious,
    /// Always pass.
    Passive,
}

impl PlayerStrategy {
    /// All strategies, for batch runs.
    pub const ALL: [Self; 3] = [Self::Aggressive, Self::Cautious, Self::Passive];

    /// Lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aggressive => "aggressive",
            Self::Cautious => "cautious",
            Self::Passive => "passive",
        }
    }

    /// Pick the next intent for `actor`.
    #[must_use]
    pub fn decide(self, session: &CombatSession, actor: UnitId) -> Intent {
        if let Some(Phase::PlayerConfirmingAttack { .. }) = session.phase() {
            return match self {
                Self::Passive => Intent::CancelAttack,
                Self::Aggressive | Self::Cautious => Intent::ConfirmAttack,
            };
        }
        let Some(unit) = session.unit(actor) else {
            return Intent::PassTurn;
        };

        match self {
            Self::Passive => Intent::PassTurn,
            Self::Cautious => weakest_in_reach(session, unit)
                .map_or(Intent::PassTurn, Intent::SelectTarget),
            Self::Aggressive => weakest_in_reach(session, unit)
                .map(Intent::SelectTarget)
                .or_else(|| closing_step(session, unit).map(Intent::SelectCell))
                .unwrap_or(Intent::PassTurn),
        }
    }
}

impl fmt::Display for PlayerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlayerStrategy {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aggressive" | "aggro" => Ok(Self::Aggressive),
            "cautious" => Ok(Self::Cautious),
            "passive" | "pass" => Ok(Self::Passive),
            _ => Err(StrategyError::Unknown(s.to_string())),
        }
    }
}

/// Lowest-hp opponent within attack range; encounter order breaks ties.
fn weakest_in_reach(session: &CombatSession, unit: &CombatUnit) -> Option<UnitId> {
    session
        .living(unit.team.opponent())
        .filter(|target| unit.can_reach(target.position))
        .min_by_key(|target| target.hp)
        .map(|target| target.id)
}

/// Reachable cell that gets closest to any opponent, if it beats standing still.
fn closing_step(session: &CombatSession, unit: &CombatUnit) -> Option<Cell> {
    let foes: Vec<Cell> = session
        .living(unit.team.opponent())
        .map(|foe| foe.position)
        .collect();
    let gap = |cell: Cell| foes.iter().map(|&foe| foe.manhattan(cell)).min();
    let current = gap(unit.position)?;

    session
        .reachable()
        .iter()
        .filter(|&cell| cell != unit.position)
        .filter_map(|cell| gap(cell).map(|d| (d, cell)))
        .min_by_key(|&(d, _)| d)
        .filter(|&(d, _)| d < current)
        .map(|(_, cell)| cell)
}
