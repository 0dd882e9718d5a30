//! Property tests for pathfinding, reachability and turn order.

use proptest::prelude::*;
use tactics_core::grid::{Cell, TerrainMap};
use tactics_core::pathfinding::{find_path, is_contiguous};
use tactics_core::reachability::compute_reachable;
use tactics_core::turn::{TurnAdvance, TurnOrder};
use tactics_core::unit::{Team, UnitId};
use tactics_test_utils::determinism::strategies::{
    arb_budget, arb_cell, arb_team_entries, arb_terrain,
};

const SIZE: i32 = 10;

fn blocked(terrain: &TerrainMap) -> impl Fn(Cell) -> bool + '_ {
    move |c| !terrain.is_walkable(c)
}

fn next_actor(order: &mut TurnOrder) -> Option<UnitId> {
    match order.advance() {
        TurnAdvance::Next(id) => Some(id),
        TurnAdvance::SessionShouldEnd(_) => None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    // =========================================================================
    // Pathfinding
    // =========================================================================

    #[test]
    fn prop_path_to_self_is_empty(
        terrain in arb_terrain(10, 10, 4),
        a in arb_cell(SIZE, SIZE),
    ) {
        prop_assert!(find_path(a, a, blocked(&terrain)).is_empty());
    }

    #[test]
    fn prop_path_is_walkable_and_shortest(
        terrain in arb_terrain(10, 10, 4),
        start in arb_cell(SIZE, SIZE),
        goal in arb_cell(SIZE, SIZE),
    ) {
        let path = find_path(start, goal, blocked(&terrain));
        let flood = compute_reachable(start, 200, blocked(&terrain));

        if path.is_empty() {
            prop_assert!(start == goal || !flood.contains(goal));
        } else {
            prop_assert_eq!(path.last(), Some(&goal));
            prop_assert!(!path.contains(&start));
            prop_assert!(is_contiguous(start, &path));
            prop_assert!(path.iter().all(|&c| terrain.is_walkable(c)));
            prop_assert_eq!(flood.distance(goal), Some(path.len() as u32));
        }
    }

    #[test]
    fn prop_open_ground_path_is_manhattan(
        start in arb_cell(SIZE, SIZE),
        goal in arb_cell(SIZE, SIZE),
    ) {
        let terrain = TerrainMap::open(10, 10);
        let path = find_path(start, goal, blocked(&terrain));
        prop_assert_eq!(path.len() as u32, start.manhattan(goal));
    }

    #[test]
    fn prop_path_avoids_occupants(
        start in arb_cell(SIZE, SIZE),
        goal in arb_cell(SIZE, SIZE),
        occupants in proptest::collection::btree_set(arb_cell(SIZE, SIZE), 0..20),
    ) {
        let terrain = TerrainMap::open(10, 10);
        let is_blocked = |c: Cell| c != start && (occupants.contains(&c) || !terrain.is_walkable(c));
        let path = find_path(start, goal, is_blocked);
        prop_assert!(path.iter().all(|c| !occupants.contains(c)));
    }

    // =========================================================================
    // Reachability
    // =========================================================================

    #[test]
    fn prop_zero_budget_is_start(
        terrain in arb_terrain(10, 10, 3),
        start in arb_cell(SIZE, SIZE),
    ) {
        let reachable = compute_reachable(start, 0, blocked(&terrain));
        prop_assert_eq!(reachable.cells().into_iter().collect::<Vec<_>>(), vec![start]);
    }

    #[test]
    fn prop_reachable_grows_with_budget(
        terrain in arb_terrain(10, 10, 3),
        start in arb_cell(SIZE, SIZE),
        budget in arb_budget(),
    ) {
        let smaller = compute_reachable(start, budget, blocked(&terrain));
        let larger = compute_reachable(start, budget + 1, blocked(&terrain));
        prop_assert!(smaller.cells().is_subset(&larger.cells()));
        for cell in smaller.iter() {
            prop_assert_eq!(smaller.distance(cell), larger.distance(cell));
        }
    }

    #[test]
    fn prop_reachable_respects_budget_and_walls(
        terrain in arb_terrain(10, 10, 3),
        start in arb_cell(SIZE, SIZE),
        budget in arb_budget(),
    ) {
        let reachable = compute_reachable(start, budget, blocked(&terrain));
        for cell in reachable.iter() {
            let distance = reachable.distance(cell).unwrap_or(u32::MAX);
            prop_assert!(distance <= budget);
            prop_assert!(distance >= start.manhattan(cell));
            prop_assert!(cell == start || terrain.is_walkable(cell));
        }
    }

    // =========================================================================
    // Turn order
    // =========================================================================

    #[test]
    fn prop_order_sorted_and_stable(
        players in arb_team_entries(Team::Player, 1, 6),
        enemies in arb_team_entries(Team::Enemy, 100, 6),
    ) {
        let order = TurnOrder::build(&players, &enemies);
        let listed: Vec<UnitId> = players.iter().chain(&enemies).map(|e| e.id).collect();
        let speed_of = |id: UnitId| {
            players.iter().chain(&enemies).find(|e| e.id == id).map_or(0, |e| e.speed)
        };
        let position = |id: UnitId| listed.iter().position(|&x| x == id).unwrap_or(usize::MAX);

        let ids: Vec<UnitId> = order.ids().collect();
        prop_assert_eq!(ids.len(), listed.len());
        for pair in ids.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            prop_assert!(speed_of(a) >= speed_of(b));
            if speed_of(a) == speed_of(b) {
                prop_assert!(position(a) < position(b));
            }
        }
    }

    #[test]
    fn prop_removal_never_skips_or_repeats(
        players in arb_team_entries(Team::Player, 1, 5),
        enemies in arb_team_entries(Team::Enemy, 100, 5),
        turns in 0usize..12,
        pick in any::<proptest::sample::Index>(),
    ) {
        let mut order = TurnOrder::build(&players, &enemies);
        prop_assume!(order.len() >= 2);
        for _ in 0..turns {
            next_actor(&mut order);
        }

        let ids: Vec<UnitId> = order.ids().collect();
        let current = order.current_index().unwrap_or(0);
        let victim = ids[pick.index(ids.len())];
        let survivors = ids.len() - 1;

        // Whoever would have acted next, in cycle, minus the victim
        let expected: Vec<UnitId> = (1..=ids.len() * 3)
            .map(|k| ids[(current + k) % ids.len()])
            .filter(|&id| id != victim)
            .take(survivors * 2)
            .collect();

        order.remove(victim);
        let actual: Vec<UnitId> = (0..survivors * 2)
            .filter_map(|_| next_actor(&mut order))
            .collect();
        prop_assert_eq!(actual, expected);
    }
}
