//! Test fixtures and helpers.
//!
//! Pre-built encounters and small drivers for pushing a session through
//! its suspension points in tests.

use tactics_core::grid::{Cell, TerrainMap};
use tactics_core::session::{CombatSession, EncounterSetup, Intent};
use tactics_core::unit::{CombatStats, CombatUnit, Team, UnitId};

/// Default stats with the given speed.
#[must_use]
pub fn stats(speed: i32) -> CombatStats {
    CombatStats::default().with_speed(speed)
}

/// A player unit.
#[must_use]
pub fn player(id: UnitId, x: i32, y: i32, stats: CombatStats) -> CombatUnit {
    CombatUnit::new(id, format!("player-{id}"), Team::Player, Cell::new(x, y), stats)
}

/// An enemy unit.
#[must_use]
pub fn enemy(id: UnitId, x: i32, y: i32, stats: CombatStats) -> CombatUnit {
    CombatUnit::new(id, format!("enemy-{id}"), Team::Enemy, Cell::new(x, y), stats)
}

/// 8×6 room with a two-cell pillar in the middle.
///
/// ```text
/// ........
/// ........
/// ...#....
/// ...#....
/// ........
/// ........
/// ```
///
/// # Panics
///
/// Never in practice; the layout is a constant.
#[must_use]
pub fn arena() -> TerrainMap {
    let rows = [
        "........", "........", "...#....", "...#....", "........", "........",
    ];
    TerrainMap::from_ascii(&rows).expect("arena rows are valid")
}

/// Attacker at (0,0) speed 10 against a defender at (2,0) speed 5, both with
/// 10 hp, reach 1 and power 10, on open ground.
#[must_use]
pub fn duel_setup() -> EncounterSetup {
    let fighter = |speed| stats(speed).with_hp(10).with_attack(1, 10);
    EncounterSetup::new(TerrainMap::open(5, 5))
        .with_player(player(1, 0, 0, fighter(10)))
        .with_enemy(enemy(2, 2, 0, fighter(5)))
}

/// Two players against three enemies in the [`arena`].
#[must_use]
pub fn skirmish_setup() -> EncounterSetup {
    EncounterSetup::new(arena())
        .with_player(player(1, 0, 0, stats(7).with_attack(1, 25)))
        .with_player(player(2, 0, 2, stats(4).with_attack(3, 15)))
        .with_enemy(enemy(10, 7, 5, stats(6).with_hp(40)))
        .with_enemy(enemy(11, 6, 1, stats(5).with_hp(40)))
        .with_enemy(enemy(12, 5, 3, stats(2).with_hp(40)))
}

/// Report arrivals until nobody is walking. Returns the number of arrivals.
pub fn settle_movement(session: &mut CombatSession) -> usize {
    let mut arrivals = 0;
    while let Some(unit) = session.awaiting_movement() {
        session.handle(Intent::MovementArrived(unit));
        arrivals += 1;
    }
    arrivals
}

/// Drive a session with `choose` picking each player action.
///
/// Movement is settled automatically, including after the last decision.
/// Stops when the session ends or after `max_decisions` player decisions.
/// Returns every intent that was fed in.
pub fn drive<F>(session: &mut CombatSession, max_decisions: usize, mut choose: F) -> Vec<Intent>
where
    F: FnMut(&CombatSession, UnitId) -> Intent,
{
    let mut fed = Vec::new();
    let mut decisions = 0;
    loop {
        if let Some(unit) = session.awaiting_movement() {
            let intent = Intent::MovementArrived(unit);
            session.handle(intent);
            fed.push(intent);
            continue;
        }
        if !session.is_active() || decisions >= max_decisions {
            break;
        }
        let Some(actor) = session.current_actor() else {
            break;
        };
        let intent = choose(session, actor);
        session.handle(intent);
        fed.push(intent);
        decisions += 1;
    }
    fed
}

/// Players attack the first enemy in reach, otherwise pass.
pub fn attack_or_pass(session: &CombatSession, actor: UnitId) -> Intent {
    let Some(unit) = session.unit(actor) else {
        return Intent::PassTurn;
    };
    session
        .living(unit.team.opponent())
        .find(|target| unit.can_reach(target.position))
        .map_or(Intent::PassTurn, |target| Intent::SelectTarget(target.id))
}
