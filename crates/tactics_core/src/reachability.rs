//! Movement range computation.
//!
//! A bounded breadth-first search from the mover's cell. The result is the
//! set of legal destinations offered to a player during movement selection.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::grid::Cell;

/// Cells reachable within a movement budget, with their step distance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reachable {
    distances: BTreeMap<Cell, u32>,
}

impl Reachable {
    /// Check whether `cell` is a legal destination.
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        self.distances.contains_key(&cell)
    }

    /// Steps needed to reach `cell`, if reachable.
    #[must_use]
    pub fn distance(&self, cell: Cell) -> Option<u32> {
        self.distances.get(&cell).copied()
    }

    /// Number of reachable cells, including the start.
    #[must_use]
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    /// True if nothing is reachable (only for a mover that is not on the grid).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// Iterate over reachable cells in ascending cell order.
    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.distances.keys().copied()
    }

    /// Reachable cells as an ordered set.
    #[must_use]
    pub fn cells(&self) -> BTreeSet<Cell> {
        self.distances.keys().copied().collect()
    }
}

/// Compute every cell reachable from `start` in at most `budget` steps.
///
/// Uses the same blocking rules as [`find_path`](crate::pathfinding::find_path).
/// `start` is always part of the result. Each cell is queued at most once,
/// at its shortest distance.
#[must_use]
pub fn compute_reachable<F>(start: Cell, budget: u32, is_blocked: F) -> Reachable
where
    F: Fn(Cell) -> bool,
{
    let mut distances = BTreeMap::new();
    distances.insert(start, 0);

    let mut queue = VecDeque::new();
    queue.push_back((start, 0u32));

    while let Some((cell, dist)) = queue.pop_front() {
        if dist >= budget {
            continue;
        }
        for next in cell.neighbors() {
            if distances.contains_key(&next) || is_blocked(next) {
                continue;
            }
            distances.insert(next, dist + 1);
            queue.push_back((next, dist + 1));
        }
    }

    Reachable { distances }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_5x5(c: Cell) -> bool {
        c.x < 0 || c.y < 0 || c.x >= 5 || c.y >= 5
    }

    #[test]
    fn test_zero_budget_is_start_only() {
        let r = compute_reachable(Cell::new(2, 2), 0, open_5x5);
        assert_eq!(r.len(), 1);
        assert!(r.contains(Cell::new(2, 2)));
        assert_eq!(r.distance(Cell::new(2, 2)), Some(0));
    }

    #[test]
    fn test_diamond_shape() {
        let r = compute_reachable(Cell::new(2, 2), 2, open_5x5);
        // 1 + 4 + 8 cells in a radius-2 diamond
        assert_eq!(r.len(), 13);
        assert!(r.contains(Cell::new(4, 2)));
        assert!(r.contains(Cell::new(3, 3)));
        assert!(!r.contains(Cell::new(4, 3)));
        assert_eq!(r.distance(Cell::new(3, 3)), Some(2));
    }

    #[test]
    fn test_clipped_by_bounds() {
        let r = compute_reachable(Cell::new(0, 0), 1, open_5x5);
        assert_eq!(
            r.cells(),
            [Cell::new(0, 0), Cell::new(0, 1), Cell::new(1, 0)].into_iter().collect()
        );
    }

    #[test]
    fn test_blocked_cells_excluded_and_cut_off() {
        // Wall at x == 1 except the top row; the far side needs a detour
        let blocked = |c: Cell| open_5x5(c) || (c.x == 1 && c.y < 4);
        let r = compute_reachable(Cell::new(0, 0), 4, blocked);

        assert!(!r.contains(Cell::new(1, 0)));
        assert!(r.contains(Cell::new(0, 4)));
        assert!(!r.contains(Cell::new(2, 0)));

        let r = compute_reachable(Cell::new(0, 0), 6, blocked);
        assert_eq!(r.distance(Cell::new(2, 4)), Some(6));
    }

    #[test]
    fn test_start_included_even_if_blocked() {
        let r = compute_reachable(Cell::new(2, 2), 3, |_| true);
        assert_eq!(r.cells(), [Cell::new(2, 2)].into_iter().collect());
    }
}
