//! Combatant data.
//!
//! A [`CombatUnit`] is the session's private snapshot of a character's
//! combat-relevant state. It is created when combat starts and discarded when
//! the unit dies or combat ends.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::grid::Cell;

/// Unique identifier for units.
pub type UnitId = u64;

/// Which side a unit fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    /// Human-controlled party member.
    Player,
    /// AI-controlled enemy.
    Enemy,
}

impl Team {
    /// The opposing team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Player => Self::Enemy,
            Self::Enemy => Self::Player,
        }
    }

    /// Returns true for the human-controlled side.
    #[must_use]
    pub const fn is_player(self) -> bool {
        matches!(self, Self::Player)
    }
}

/// Character sheet values that matter in combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatStats {
    /// Hit points. Combat starts with whatever the character has left.
    pub hp: i32,
    /// Initiative. Higher acts earlier.
    pub speed: i32,
    /// Steps per turn.
    pub movement_range: u32,
    /// Manhattan attack reach in cells.
    pub attack_range: u32,
    /// Damage dealt per attack.
    pub attack_power: u32,
}

impl Default for CombatStats {
    fn default() -> Self {
        Self {
            hp: 100,
            speed: 5,
            movement_range: 3,
            attack_range: 1,
            attack_power: 10,
        }
    }
}

impl CombatStats {
    /// Builder method to set hit points.
    #[must_use]
    pub const fn with_hp(mut self, hp: i32) -> Self {
        self.hp = hp;
        self
    }

    /// Builder method to set speed.
    #[must_use]
    pub const fn with_speed(mut self, speed: i32) -> Self {
        self.speed = speed;
        self
    }

    /// Builder method to set movement range.
    #[must_use]
    pub const fn with_movement(mut self, movement_range: u32) -> Self {
        self.movement_range = movement_range;
        self
    }

    /// Builder method to set attack range and power.
    #[must_use]
    pub const fn with_attack(mut self, attack_range: u32, attack_power: u32) -> Self {
        self.attack_range = attack_range;
        self.attack_power = attack_power;
        self
    }
}

/// Whether a unit is walking a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MovementStatus {
    /// Standing on its cell.
    #[default]
    Idle,
    /// Stepping along a path; `remaining` excludes the cell already entered.
    Moving {
        /// Steps still to take.
        remaining: VecDeque<Cell>,
    },
}

/// One combatant inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombatUnit {
    /// Unique identifier.
    pub id: UnitId,
    /// Display name, for logs and reports.
    pub name: String,
    /// Side.
    pub team: Team,
    /// Current cell.
    pub position: Cell,
    /// Stats at combat start.
    pub stats: CombatStats,
    /// Current hit points. May go negative on overkill.
    pub hp: i32,
    /// Movement state.
    #[serde(default)]
    pub movement: MovementStatus,
}

impl CombatUnit {
    /// Create a unit at full snapshot hp.
    #[must_use]
    pub fn new(id: UnitId, name: impl Into<String>, team: Team, position: Cell, stats: CombatStats) -> Self {
        Self {
            id,
            name: name.into(),
            team,
            position,
            stats,
            hp: stats.hp,
            movement: MovementStatus::Idle,
        }
    }

    /// A unit is alive while its hp is positive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// True while a path is being walked.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        matches!(self.movement, MovementStatus::Moving { .. })
    }

    /// Manhattan distance to `cell`.
    #[must_use]
    pub const fn distance_to(&self, cell: Cell) -> u32 {
        self.position.manhattan(cell)
    }

    /// Check whether `cell` is inside this unit's attack range.
    #[must_use]
    pub const fn can_reach(&self, cell: Cell) -> bool {
        self.distance_to(cell) <= self.stats.attack_range
    }

    /// Subtract `amount` hp. Returns the new hp.
    pub fn take_damage(&mut self, amount: u32) -> i32 {
        let amount = i32::try_from(amount).unwrap_or(i32::MAX);
        self.hp = self.hp.saturating_sub(amount);
        self.hp
    }
}
