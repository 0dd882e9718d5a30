//! Enemy turn decisions.
//!
//! Enemies only approach: pick the nearest player, then the free cell next
//! to that player that is closest to the enemy. There is no attack step.

use crate::grid::Cell;
use crate::unit::UnitId;

/// What an enemy decided to do this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApproachPlan {
    /// The player being approached.
    pub target: UnitId,
    /// Cell to walk to.
    pub destination: Cell,
}

/// Nearest candidate by Manhattan distance.
///
/// Ties go to the earliest candidate, so pass players in encounter order.
#[must_use]
pub fn nearest_target<I>(from: Cell, candidates: I) -> Option<(UnitId, Cell)>
where
    I: IntoIterator<Item = (UnitId, Cell)>,
{
    let mut best: Option<(UnitId, Cell)> = None;
    let mut best_distance = u32::MAX;
    for (id, cell) in candidates {
        let d = from.manhattan(cell);
        if d < best_distance {
            best_distance = d;
            best = Some((id, cell));
        }
    }
    best
}

/// Decide where an enemy standing on `actor_cell` should walk.
///
/// `players` are the living player units in encounter order. `is_blocked`
/// must not report the actor's own cell, so an enemy already adjacent to
/// its target stays put.
///
/// Returns `None` when there is no target, no free neighbour, or the best
/// neighbour is where the enemy already stands.
#[must_use]
pub fn choose_approach<I, F>(actor_cell: Cell, players: I, is_blocked: F) -> Option<ApproachPlan>
where
    I: IntoIterator<Item = (UnitId, Cell)>,
    F: Fn(Cell) -> bool,
{
    let (target, target_cell) = nearest_target(actor_cell, players)?;

    let mut chosen = None;
    let mut best_distance = u32::MAX;
    for candidate in target_cell.neighbors() {
        if is_blocked(candidate) {
            continue;
        }
        let d = actor_cell.manhattan(candidate);
        if d < best_distance {
            best_distance = d;
            chosen = Some(candidate);
        }
    }

    let destination = chosen.filter(|&c| c != actor_cell)?;
    tracing::debug!(target, %destination, "Enemy approach chosen");
    Some(ApproachPlan {
        target,
        destination,
    })
}
