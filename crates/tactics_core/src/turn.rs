//! Turn order scheduling.
//!
//! The order is built once per session and only ever shrinks. Removing a
//! unit keeps the pointer on the same upcoming actor, so a death during the
//! current turn never causes a skipped or repeated turn.

use serde::{Deserialize, Serialize};

use crate::unit::{Team, UnitId};

/// Why a session should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndReason {
    /// Nobody is left in the turn order.
    EmptyTurnOrder,
    /// The given team has no living units.
    TeamDefeated(Team),
}

impl EndReason {
    /// The surviving team, if the end was decisive.
    #[must_use]
    pub const fn winner(self) -> Option<Team> {
        match self {
            Self::TeamDefeated(loser) => Some(loser.opponent()),
            Self::EmptyTurnOrder => None,
        }
    }
}

/// Result of [`TurnOrder::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnAdvance {
    /// The next actor.
    Next(UnitId),
    /// Stop the session.
    SessionShouldEnd(EndReason),
}

/// Result of [`TurnOrder::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnSignal {
    /// Both teams still have units.
    Continue,
    /// Stop the session.
    SessionShouldEnd(EndReason),
}

/// A participant as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnEntry {
    /// Unit identifier.
    pub id: UnitId,
    /// Side, for end detection.
    pub team: Team,
    /// Initiative used for sorting.
    pub speed: i32,
}

impl TurnEntry {
    /// Create an entry.
    #[must_use]
    pub const fn new(id: UnitId, team: Team, speed: i32) -> Self {
        Self { id, team, speed }
    }
}

/// Ordered sequence of living actors with a current pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnOrder {
    entries: Vec<TurnEntry>,
    /// `None` means "before the first entry": the next advance yields index 0.
    current: Option<usize>,
    round: u32,
}

impl TurnOrder {
    /// Build the order from both teams.
    ///
    /// Sorted by descending speed. The sort is stable over the concatenation
    /// `players ++ enemies`, so equal speeds keep players first and then the
    /// original listing order.
    #[must_use]
    pub fn build(players: &[TurnEntry], enemies: &[TurnEntry]) -> Self {
        let mut entries: Vec<TurnEntry> = players.iter().chain(enemies).copied().collect();
        entries.sort_by(|a, b| b.speed.cmp(&a.speed));
        let current = if entries.is_empty() { None } else { Some(0) };
        Self {
            entries,
            current,
            round: 1,
        }
    }

    /// Unit whose turn it is.
    #[must_use]
    pub fn current(&self) -> Option<UnitId> {
        self.current
            .and_then(|i| self.entries.get(i))
            .map(|e| e.id)
    }

    /// Index of the current actor, if any.
    #[must_use]
    pub const fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// 1-based round counter. Increments each time the order wraps.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Ids in turn order.
    pub fn ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    /// Number of actors left.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no actors are left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether `id` is still scheduled.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Scheduled units on `team`.
    #[must_use]
    pub fn live_count(&self, team: Team) -> usize {
        self.entries.iter().filter(|e| e.team == team).count()
    }

    /// Finish the current actor's turn and move to the next one.
    pub fn advance(&mut self) -> TurnAdvance {
        if self.entries.is_empty() {
            self.current = None;
            return TurnAdvance::SessionShouldEnd(EndReason::EmptyTurnOrder);
        }
        let next = match self.current {
            Some(i) => {
                let next = (i + 1) % self.entries.len();
                if next <= i {
                    self.round += 1;
                }
                next
            }
            None => 0,
        };
        self.current = Some(next);
        TurnAdvance::Next(self.entries[next].id)
    }

    /// Remove a unit from the order.
    ///
    /// If the removed index is at or before the pointer, the pointer steps
    /// back one so that the following [`advance`](Self::advance) lands on the
    /// actor that would have come next anyway.
    pub fn remove(&mut self, id: UnitId) -> TurnSignal {
        if let Some(pos) = self.entries.iter().position(|e| e.id == id) {
            self.entries.remove(pos);
            if let Some(current) = self.current {
                if pos <= current {
                    self.current = current.checked_sub(1);
                }
            }
        }
        self.end_signal()
    }

    /// Check the end conditions without changing anything.
    #[must_use]
    pub fn end_signal(&self) -> TurnSignal {
        if self.entries.is_empty() {
            return TurnSignal::SessionShouldEnd(EndReason::EmptyTurnOrder);
        }
        for team in [Team::Enemy, Team::Player] {
            if self.live_count(team) == 0 {
                return TurnSignal::SessionShouldEnd(EndReason::TeamDefeated(team));
            }
        }
        TurnSignal::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: UnitId, speed: i32) -> TurnEntry {
        TurnEntry::new(id, Team::Player, speed)
    }

    fn e(id: UnitId, speed: i32) -> TurnEntry {
        TurnEntry::new(id, Team::Enemy, speed)
    }

    fn order_of(order: &TurnOrder) -> Vec<UnitId> {
        order.ids().collect()
    }

    /// Collect the next `n` actors.
    fn take_turns(order: &mut TurnOrder, n: usize) -> Vec<UnitId> {
        (0..n)
            .map(|_| match order.advance() {
                TurnAdvance::Next(id) => id,
                TurnAdvance::SessionShouldEnd(r) => panic!("unexpected end: {r:?}"),
            })
            .collect()
    }

    #[test]
    fn test_sorted_by_descending_speed() {
        let order = TurnOrder::build(&[p(1, 3), p(2, 9)], &[e(3, 5), e(4, 12)]);
        assert_eq!(order_of(&order), vec![4, 2, 3, 1]);
        assert_eq!(order.current(), Some(4));
        assert_eq!(order.round(), 1);
    }

    #[test]
    fn test_ties_players_first_then_listing_order() {
        let order = TurnOrder::build(&[p(1, 5), p(2, 5)], &[e(3, 5), e(4, 5)]);
        assert_eq!(order_of(&order), vec![1, 2, 3, 4]);

        let order = TurnOrder::build(&[p(10, 5)], &[e(3, 7), e(1, 5), e(2, 5)]);
        assert_eq!(order_of(&order), vec![3, 10, 1, 2]);
    }

    #[test]
    fn test_advance_wraps_and_counts_rounds() {
        let mut order = TurnOrder::build(&[p(1, 3)], &[e(2, 2)]);
        assert_eq!(take_turns(&mut order, 3), vec![2, 1, 2]);
        assert_eq!(order.round(), 2);
    }

    #[test]
    fn test_remove_current_actor_does_not_skip() {
        // A B C D, B is acting and dies
        let mut order = TurnOrder::build(&[p(1, 9), p(2, 8)], &[e(3, 7), e(4, 6)]);
        assert_eq!(take_turns(&mut order, 1), vec![2]);
        assert_eq!(order.remove(2), TurnSignal::Continue);
        assert_eq!(take_turns(&mut order, 3), vec![3, 4, 1]);
    }

    #[test]
    fn test_remove_first_while_first_acts() {
        let mut order = TurnOrder::build(&[p(1, 9), p(2, 8)], &[e(3, 7)]);
        assert_eq!(order.current(), Some(1));
        assert_eq!(order.remove(1), TurnSignal::Continue);
        assert_eq!(order.current_index(), None);
        assert_eq!(take_turns(&mut order, 3), vec![2, 3, 2]);
    }

    #[test]
    fn test_remove_earlier_actor() {
        let mut order = TurnOrder::build(&[p(1, 9), p(2, 8)], &[e(3, 7), e(4, 6)]);
        take_turns(&mut order, 2); // C acting
        assert_eq!(order.current(), Some(3));
        order.remove(1);
        assert_eq!(order.current(), Some(3));
        assert_eq!(take_turns(&mut order, 3), vec![4, 2, 3]);
    }

    #[test]
    fn test_remove_later_actor() {
        let mut order = TurnOrder::build(&[p(1, 9), p(2, 8)], &[e(3, 7), e(4, 6)]);
        take_turns(&mut order, 1); // B acting
        order.remove(3);
        assert_eq!(take_turns(&mut order, 3), vec![4, 1, 2]);
    }

    #[test]
    fn test_remove_last_entry_while_last_acts() {
        let mut order = TurnOrder::build(&[p(1, 9), p(2, 8)], &[e(3, 7), e(4, 6)]);
        take_turns(&mut order, 3); // D acting
        order.remove(4);
        assert_eq!(take_turns(&mut order, 2), vec![1, 2]);
    }

    #[test]
    fn test_team_defeated_signal() {
        let mut order = TurnOrder::build(&[p(1, 9)], &[e(2, 7), e(3, 6)]);
        assert_eq!(order.remove(2), TurnSignal::Continue);
        assert_eq!(
            order.remove(3),
            TurnSignal::SessionShouldEnd(EndReason::TeamDefeated(Team::Enemy))
        );
        assert_eq!(EndReason::TeamDefeated(Team::Enemy).winner(), Some(Team::Player));
    }

    #[test]
    fn test_empty_order_ends() {
        let mut order = TurnOrder::build(&[], &[]);
        assert_eq!(order.current(), None);
        assert_eq!(
            order.advance(),
            TurnAdvance::SessionShouldEnd(EndReason::EmptyTurnOrder)
        );
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut order = TurnOrder::build(&[p(1, 9)], &[e(2, 7)]);
        assert_eq!(order.remove(99), TurnSignal::Continue);
        assert_eq!(order.len(), 2);
    }
}
