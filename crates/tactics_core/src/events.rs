//! Outbound notifications for the presentation layer.
//!
//! Events are fire-and-forget: the session buffers them and the caller
//! drains the buffer whenever convenient. Nothing in the core waits for an
//! acknowledgment.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::grid::Cell;
use crate::turn::EndReason;
use crate::unit::{Team, UnitId};

/// How a session finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatOutcome {
    /// A team was wiped out, or the order emptied.
    Resolved(EndReason),
    /// Combat was stopped from outside.
    Aborted,
}

impl CombatOutcome {
    /// The winning team, if any.
    #[must_use]
    pub const fn winner(self) -> Option<Team> {
        match self {
            Self::Resolved(reason) => reason.winner(),
            Self::Aborted => None,
        }
    }
}

/// A notification produced by the combat core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Session built; `order` is the initial turn order.
    CombatStarted {
        /// Turn order at start.
        order: Vec<UnitId>,
    },
    /// A new actor's turn began.
    TurnChanged {
        /// The active unit.
        unit: UnitId,
        /// Round number.
        round: u32,
    },
    /// Legal destinations for the active player unit. Empty clears highlights.
    ReachableCellsChanged(BTreeSet<Cell>),
    /// One path step was taken.
    UnitMoved {
        /// The moving unit.
        unit: UnitId,
        /// Cell left.
        from: Cell,
        /// Cell entered.
        to: Cell,
    },
    /// A player attack is waiting for confirm or cancel.
    AttackAwaitingConfirmation {
        /// The acting unit.
        attacker: UnitId,
        /// The selected target.
        target: UnitId,
    },
    /// A unit lost hp.
    UnitDamaged {
        /// The damaged unit.
        unit: UnitId,
        /// The unit that dealt the damage.
        attacker: UnitId,
        /// Hp after the hit.
        new_hp: i32,
    },
    /// A unit's hp reached zero.
    UnitDied(UnitId),
    /// The session is over.
    CombatEnded(CombatOutcome),
}
