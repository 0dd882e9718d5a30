//! # Tactics Core
//!
//! Deterministic turn-based combat core for a grid RPG.
//!
//! This crate contains **only** combat logic:
//! - No rendering
//! - No IO except replay and config files
//! - No randomness
//!
//! This separation enables:
//! - Headless battle runs
//! - Replay recording and verification
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`grid`] - Terrain and unit occupancy
//! - [`pathfinding`] - 4-directional A*
//! - [`reachability`] - Movement range BFS
//! - [`turn`] - Turn order scheduling
//! - [`session`] - The combat state machine
//! - [`director`] - Roster ownership and combat entry/exit
//! - [`replay`] - Recording and playback

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod config;
pub mod director;
pub mod encounter;
pub mod error;
pub mod events;
pub mod grid;
pub mod pathfinding;
pub mod reachability;
pub mod replay;
pub mod session;
pub mod turn;
pub mod unit;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AttackConfirmation, CombatConfig};
    pub use crate::director::{CombatDirector, CombatReport, MovementMode, RosterMember};
    pub use crate::error::{CombatError, Result};
    pub use crate::events::{CombatEvent, CombatOutcome};
    pub use crate::grid::{Cell, GridIndex, TerrainMap, Tile};
    pub use crate::pathfinding::find_path;
    pub use crate::reachability::{compute_reachable, Reachable};
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::session::{
        CombatSession, DamageOutcome, EncounterSetup, Intent, IntentOutcome, Phase, Rejection,
        SessionState,
    };
    pub use crate::turn::{EndReason, TurnOrder};
    pub use crate::unit::{CombatStats, CombatUnit, Team, UnitId};
}
