//! Error types for the combat core.
//!
//! Only caller-visible failures live here. Bad input *inside* a running
//! session (a click outside the reachable set, an intent in the wrong phase)
//! is never an error: it is reported as
//! [`IntentOutcome::Rejected`](crate::session::IntentOutcome) and leaves the
//! session untouched.

use thiserror::Error;

use crate::grid::Cell;
use crate::unit::UnitId;

/// Result type alias using [`CombatError`].
pub type Result<T> = std::result::Result<T, CombatError>;

/// Top-level error type for the combat core.
#[derive(Debug, Error)]
pub enum CombatError {
    /// A combat session is already running.
    #[error("A combat session is already active")]
    SessionAlreadyActive,

    /// An operation needed a running session and there is none.
    #[error("No combat session is active")]
    NoActiveSession,

    /// Unit identifier not known to the roster or session.
    #[error("Unknown unit ID: {0}")]
    UnknownUnit(UnitId),

    /// Destination already holds a different unit.
    #[error("Cell {cell} is already occupied by unit {occupant}")]
    Conflict {
        /// The contested cell.
        cell: Cell,
        /// The unit currently standing there.
        occupant: UnitId,
    },

    /// Cell is a static obstacle or lies outside the walkable map.
    #[error("Cell {0} is not walkable")]
    CellBlocked(Cell),

    /// Encounter data cannot produce a valid session.
    #[error("Invalid encounter setup: {0}")]
    InvalidSetup(String),

    /// Failed to parse a RON configuration or data file.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// File system failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Replay encoding, decoding or version mismatch.
    #[error("Replay error: {0}")]
    Replay(String),
}
