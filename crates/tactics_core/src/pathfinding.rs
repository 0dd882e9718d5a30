//! Grid pathfinding using the A* algorithm.
//!
//! Movement is 4-directional with a uniform step cost of 1, so the Manhattan
//! heuristic is both admissible and consistent. Results are deterministic:
//! equal f-scores are popped in insertion order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::grid::Cell;

/// Default cap on node expansions for a single search.
pub const DEFAULT_MAX_SEARCH_NODES: usize = 16_384;

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    cell: Cell,
    /// f_score = g_score + heuristic
    f_score: u32,
    /// Insertion sequence number. Lower pops first on equal f_score.
    sequence: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so we reverse the comparison for min-heap behavior.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the shortest path from `start` to `goal`.
///
/// `is_blocked` decides walkability; it should report obstacles, cells with
/// no tile, and cells held by units other than the mover. The returned path
/// excludes `start` and ends at `goal`.
///
/// Returns an empty path when `start == goal`, when the goal is blocked, or
/// when no path exists. An empty path means "do not move", never an error.
#[must_use]
pub fn find_path<F>(start: Cell, goal: Cell, is_blocked: F) -> Vec<Cell>
where
    F: Fn(Cell) -> bool,
{
    find_path_bounded(start, goal, is_blocked, DEFAULT_MAX_SEARCH_NODES)
}

/// [`find_path`] with an explicit cap on node expansions.
///
/// Hitting the cap is reported the same way as an unreachable goal.
#[must_use]
pub fn find_path_bounded<F>(start: Cell, goal: Cell, is_blocked: F, max_nodes: usize) -> Vec<Cell>
where
    F: Fn(Cell) -> bool,
{
    if start == goal || is_blocked(goal) {
        return Vec::new();
    }

    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: HashMap<Cell, Cell> = HashMap::new();
    let mut g_score: HashMap<Cell, u32> = HashMap::new();
    let mut sequence: u64 = 0;
    let mut expanded: usize = 0;

    g_score.insert(start, 0);
    open_set.push(AStarNode {
        cell: start,
        f_score: start.manhattan(goal),
        sequence,
    });

    while let Some(current) = open_set.pop() {
        if current.cell == goal {
            return reconstruct_path(&came_from, start, goal);
        }

        let current_g = g_score.get(&current.cell).copied().unwrap_or(u32::MAX);

        // Stale heap entry: a cheaper route to this cell was already expanded
        if current.f_score > current_g.saturating_add(current.cell.manhattan(goal)) {
            continue;
        }

        expanded += 1;
        if expanded > max_nodes {
            tracing::debug!(%start, %goal, max_nodes, "Path search exhausted node budget");
            return Vec::new();
        }

        for neighbor in current.cell.neighbors() {
            if is_blocked(neighbor) {
                continue;
            }

            let tentative_g = current_g + 1;
            let neighbor_g = g_score.get(&neighbor).copied().unwrap_or(u32::MAX);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.cell);
                g_score.insert(neighbor, tentative_g);
                sequence += 1;
                open_set.push(AStarNode {
                    cell: neighbor,
                    f_score: tentative_g + neighbor.manhattan(goal),
                    sequence,
                });
            }
        }
    }

    Vec::new()
}

/// Walk `came_from` back from the goal, dropping the start cell.
fn reconstruct_path(came_from: &HashMap<Cell, Cell>, start: Cell, goal: Cell) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut current = goal;

    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}

/// Check that `path` is a contiguous chain of cardinal steps leading out of
/// `start`.
#[must_use]
pub fn is_contiguous(start: Cell, path: &[Cell]) -> bool {
    let mut previous = start;
    for &cell in path {
        if previous.manhattan(cell) != 1 {
            return false;
        }
        previous = cell;
    }
    true
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn walls(cells: &[(i32, i32)]) -> HashSet<Cell> {
        cells.iter().map(|&c| Cell::from(c)).collect()
    }

    /// Open 10x10 board with optional walls.
    fn board(walls: &HashSet<Cell>) -> impl Fn(Cell) -> bool + '_ {
        move |c: Cell| c.x < 0 || c.y < 0 || c.x >= 10 || c.y >= 10 || walls.contains(&c)
    }

    #[test]
    fn test_simple_path() {
        let none = HashSet::new();
        let path = find_path(Cell::new(0, 0), Cell::new(5, 5), board(&none));

        assert_eq!(path.len(), 10);
        assert_eq!(path.last(), Some(&Cell::new(5, 5)));
        assert!(is_contiguous(Cell::new(0, 0), &path));
        assert!(!path.contains(&Cell::new(0, 0)));
    }

    #[test]
    fn test_path_to_same_cell() {
        let none = HashSet::new();
        assert!(find_path(Cell::new(5, 5), Cell::new(5, 5), board(&none)).is_empty());
    }

    #[test]
    fn test_path_around_obstacle() {
        // Vertical wall with a gap at the top
        let wall = walls(&[(5, 0), (5, 1), (5, 2), (5, 3), (5, 4), (5, 5), (5, 6), (5, 7), (5, 8)]);
        let start = Cell::new(2, 5);
        let goal = Cell::new(8, 5);

        let path = find_path(start, goal, board(&wall));

        assert!(!path.is_empty());
        assert!(is_contiguous(start, &path));
        for cell in &path {
            assert!(!wall.contains(cell), "Path goes through blocked cell {cell}");
        }
        // Detour through the gap at (5, 9)
        assert!(path.len() > start.manhattan(goal) as usize);
    }

    #[test]
    fn test_no_path_exists() {
        let wall = walls(&(0..10).map(|y| (5, y)).collect::<Vec<_>>());
        let path = find_path(Cell::new(2, 5), Cell::new(8, 5), board(&wall));
        assert!(path.is_empty());
    }

    #[test]
    fn test_blocked_goal() {
        let wall = walls(&[(5, 5)]);
        assert!(find_path(Cell::new(0, 0), Cell::new(5, 5), board(&wall)).is_empty());
    }

    #[test]
    fn test_node_budget() {
        let none = HashSet::new();
        let path = find_path_bounded(Cell::new(0, 0), Cell::new(9, 9), board(&none), 3);
        assert!(path.is_empty());
    }

    #[test]
    fn test_determinism() {
        let wall = walls(&(2..8).map(|y| (5, y)).collect::<Vec<_>>());
        let start = Cell::new(1, 5);
        let goal = Cell::new(9, 4);

        let path1 = find_path(start, goal, board(&wall));
        let path2 = find_path(start, goal, board(&wall));
        let path3 = find_path(start, goal, board(&wall));

        assert_eq!(path1, path2);
        assert_eq!(path2, path3);
    }

    #[test]
    fn test_first_step_follows_neighbor_order() {
        // Goal straight up: right/left never improve f, so the first step is up
        let none = HashSet::new();
        let path = find_path(Cell::new(3, 3), Cell::new(3, 6), board(&none));
        assert_eq!(path, vec![Cell::new(3, 4), Cell::new(3, 5), Cell::new(3, 6)]);
    }

    #[test]
    fn test_is_contiguous() {
        let start = Cell::new(0, 0);
        assert!(is_contiguous(start, &[Cell::new(1, 0), Cell::new(1, 1)]));
        assert!(!is_contiguous(start, &[Cell::new(1, 1)]));
        assert!(is_contiguous(start, &[]));
    }
}
