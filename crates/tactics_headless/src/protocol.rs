//! JSON protocol for interactive headless play.
//!
//! The interactive runner communicates via JSON lines (one JSON object per
//! line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** Responses, each carrying the events the command caused
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","scenario":"duel","events":[...]}
//! -> {"cmd":"move","x":1,"y":0}
//! <- {"type":"accepted","cmd":"move","events":[...]}
//! -> {"cmd":"arrived","unit":1}
//! <- {"type":"accepted","cmd":"arrived","events":[...]}
//! -> {"cmd":"attack","target":2}
//! <- {"type":"accepted","cmd":"attack","events":[...]}
//! <- {"type":"combat_over","outcome":{"Resolved":{"TeamDefeated":"Enemy"}},"turns":3}
//! ```

use serde::{Deserialize, Serialize};
use tactics_core::events::{CombatEvent, CombatOutcome};
use tactics_core::grid::Cell;
use tactics_core::session::{CombatSession, Intent, Rejection, SessionState};
use tactics_core::unit::{Team, UnitId};

/// Protocol version reported in [`Response::Ready`].
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands that can be sent to the interactive runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Move the active player unit.
    Move { x: i32, y: i32 },
    /// Attack an enemy.
    Attack { target: UnitId },
    /// Confirm a pending attack.
    Confirm,
    /// Cancel a pending attack.
    Cancel,
    /// End the active player's turn.
    Pass,
    /// Acknowledge one movement step.
    Arrived { unit: UnitId },
    /// Let the scripted strategy pick the next player action.
    Auto,
    /// Query the session state.
    Query,
    /// Render the battlefield as ASCII rows.
    Render,
    /// Report the session state hash.
    Hash,
    /// Abort combat.
    Abort,
    /// Quit the runner.
    Quit,
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The session intent this command maps to, if any.
    #[must_use]
    pub const fn to_intent(&self) -> Option<Intent> {
        match *self {
            Self::Move { x, y } => Some(Intent::SelectCell(Cell::new(x, y))),
            Self::Attack { target } => Some(Intent::SelectTarget(target)),
            Self::Confirm => Some(Intent::ConfirmAttack),
            Self::Cancel => Some(Intent::CancelAttack),
            Self::Pass => Some(Intent::PassTurn),
            Self::Arrived { unit } => Some(Intent::MovementArrived(unit)),
            _ => None,
        }
    }

    /// Get command name for acknowledgment.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::Confirm => "confirm",
            Self::Cancel => "cancel",
            Self::Pass => "pass",
            Self::Arrived { .. } => "arrived",
            Self::Auto => "auto",
            Self::Query => "query",
            Self::Render => "render",
            Self::Hash => "hash",
            Self::Abort => "abort",
            Self::Quit => "quit",
        }
    }
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses sent from the interactive runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        version: String,
        scenario: String,
        events: Vec<CombatEvent>,
    },
    /// The session took the intent.
    Accepted {
        cmd: String,
        events: Vec<CombatEvent>,
    },
    /// The session ignored the intent.
    Rejected { cmd: String, reason: Rejection },
    /// Error processing a command.
    Error {
        message: String,
        cmd: Option<String>,
    },
    /// Current session state.
    State(SessionView),
    /// Battlefield rows, top row first.
    Board { rows: Vec<String> },
    /// State hash for determinism verification.
    StateHash { turns: u32, hash: u64 },
    /// Combat has ended.
    CombatOver { outcome: CombatOutcome, turns: u32 },
    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// Snapshot of a session for controllers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub state: SessionState,
    pub actor: Option<UnitId>,
    pub awaiting_movement: Option<UnitId>,
    pub round: u32,
    pub turns: u32,
    pub order: Vec<UnitId>,
    pub units: Vec<UnitView>,
    pub reachable: Vec<Cell>,
}

/// State of a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitView {
    pub id: UnitId,
    pub name: String,
    pub team: Team,
    pub hp: i32,
    pub cell: Cell,
    pub moving: bool,
}

impl SessionView {
    /// Capture the current state of `session`.
    #[must_use]
    pub fn capture(session: &CombatSession) -> Self {
        Self {
            state: session.state(),
            actor: session.current_actor(),
            awaiting_movement: session.awaiting_movement(),
            round: session.turn_order().round(),
            turns: session.turns_taken(),
            order: session.turn_order().ids().collect(),
            units: session
                .units()
                .map(|u| UnitView {
                    id: u.id,
                    name: u.name.clone(),
                    team: u.team,
                    hp: u.hp,
                    cell: u.position,
                    moving: u.is_moving(),
                })
                .collect(),
            reachable: session.reachable().iter().collect(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_move_command() {
        let cmd = Command::from_json(r#"{"cmd":"move","x":3,"y":1}"#).unwrap();
        assert_eq!(cmd, Command::Move { x: 3, y: 1 });
        assert_eq!(cmd.to_intent(), Some(Intent::SelectCell(Cell::new(3, 1))));
    }

    #[test]
    fn test_parse_unit_commands() {
        let cmd = Command::from_json(r#"{"cmd":"arrived","unit":7}"#).unwrap();
        assert_eq!(cmd.to_intent(), Some(Intent::MovementArrived(7)));
        assert_eq!(Command::from_json(r#"{"cmd":"pass"}"#).unwrap(), Command::Pass);
        assert_eq!(Command::Query.to_intent(), None);
        assert!(Command::from_json(r#"{"cmd":"teleport"}"#).is_err());
    }

    #[test]
    fn test_serialize_rejected_response() {
        let resp = Response::Rejected {
            cmd: "move".to_string(),
            reason: Rejection::InvalidSelection,
        };
        let json = resp.to_json_line();
        assert!(json.ends_with('\n'));
        assert!(json.contains(r#""type":"rejected""#));
        assert!(json.contains(r#""reason":"InvalidSelection""#));
    }
}
