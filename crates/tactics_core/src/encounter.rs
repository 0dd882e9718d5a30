//! Proximity triggers that start combat.
//!
//! Each enemy carries one trigger. It fires the first time the party leader
//! comes within the detection radius and then stays disarmed until it is
//! explicitly re-armed, normally when a combat it survived is over.

use std::collections::BTreeMap;

use crate::grid::Cell;
use crate::unit::UnitId;

/// Once-only detection triggers keyed by enemy.
#[derive(Debug, Clone, Default)]
pub struct EncounterTriggers {
    radius: u32,
    armed: BTreeMap<UnitId, bool>,
}

impl EncounterTriggers {
    /// Create an empty set with a Manhattan detection `radius`.
    #[must_use]
    pub fn new(radius: u32) -> Self {
        Self {
            radius,
            armed: BTreeMap::new(),
        }
    }

    /// Detection radius.
    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.radius
    }

    /// Add an armed trigger for `enemy`. Re-registering re-arms it.
    pub fn register(&mut self, enemy: UnitId) {
        self.armed.insert(enemy, true);
    }

    /// Drop `enemy`'s trigger entirely.
    pub fn forget(&mut self, enemy: UnitId) {
        self.armed.remove(&enemy);
    }

    /// Check whether `enemy` has a trigger that can still fire.
    #[must_use]
    pub fn is_armed(&self, enemy: UnitId) -> bool {
        self.armed.get(&enemy).copied().unwrap_or(false)
    }

    /// Re-arm `enemy`'s trigger. Returns false if it has none.
    pub fn rearm(&mut self, enemy: UnitId) -> bool {
        match self.armed.get_mut(&enemy) {
            Some(armed) => {
                *armed = true;
                true
            }
            None => false,
        }
    }

    /// Fire the first armed trigger among `enemies` within range of `leader`.
    ///
    /// `enemies` is scanned in the order given. The fired trigger is
    /// disarmed before returning.
    pub fn detect<I>(&mut self, leader: Cell, enemies: I) -> Option<UnitId>
    where
        I: IntoIterator<Item = (UnitId, Cell)>,
    {
        let (enemy, _) = enemies
            .into_iter()
            .filter(|&(id, _)| self.is_armed(id))
            .find(|&(_, cell)| leader.manhattan(cell) <= self.radius)?;

        self.armed.insert(enemy, false);
        tracing::info!(enemy, %leader, "Encounter triggered");
        Some(enemy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once() {
        let mut triggers = EncounterTriggers::new(2);
        triggers.register(7);
        let enemies = [(7, Cell::new(3, 0))];

        assert_eq!(triggers.detect(Cell::new(0, 0), enemies), None);
        assert_eq!(triggers.detect(Cell::new(1, 0), enemies), Some(7));
        assert!(!triggers.is_armed(7));
        assert_eq!(triggers.detect(Cell::new(2, 0), enemies), None);

        assert!(triggers.rearm(7));
        assert_eq!(triggers.detect(Cell::new(2, 0), enemies), Some(7));
    }

    #[test]
    fn test_first_in_order_wins() {
        let mut triggers = EncounterTriggers::new(3);
        triggers.register(1);
        triggers.register(2);
        let enemies = [(2, Cell::new(0, 1)), (1, Cell::new(1, 0))];
        assert_eq!(triggers.detect(Cell::new(0, 0), enemies), Some(2));
        assert_eq!(triggers.detect(Cell::new(0, 0), enemies), Some(1));
    }

    #[test]
    fn test_unregistered_never_fires() {
        let mut triggers = EncounterTriggers::new(5);
        assert_eq!(triggers.detect(Cell::new(0, 0), [(9, Cell::new(0, 0))]), None);
        assert!(!triggers.rearm(9));

        triggers.register(9);
        triggers.forget(9);
        assert!(!triggers.is_armed(9));
    }
}
