//! ASCII battlefield renderer for quick terminal review.
//!
//! The top row of the output is the highest `y`, matching the scenario map
//! layout. Player units are drawn as uppercase letters and enemies as
//! lowercase letters, both in encounter order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use tactics_core::grid::{Cell, TerrainMap};
use tactics_core::session::{CombatSession, EncounterSetup};
use tactics_core::unit::{CombatUnit, Team};

/// ASCII rendering configuration.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Append a legend with one line per unit.
    pub show_legend: bool,
    /// Mark the active player's legal destinations with `+`.
    pub show_reachable: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            show_legend: true,
            show_reachable: true,
            use_color: false,
        }
    }
}

/// ANSI color codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const CYAN: &str = "\x1b[36m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const GRAY: &str = "\x1b[90m";
}

fn glyph(team: Team, index: usize) -> char {
    let base = match team {
        Team::Player => b'A',
        Team::Enemy => b'a',
    };
    u8::try_from(index % 26).map_or('?', |i| char::from(base + i))
}

fn team_color(team: Team) -> &'static str {
    match team {
        Team::Player => colors::CYAN,
        Team::Enemy => colors::RED,
    }
}

/// Render a running or finished session.
#[must_use]
pub fn render_session(session: &CombatSession, config: &AsciiConfig) -> String {
    let players: Vec<&CombatUnit> = session.living(Team::Player).collect();
    let enemies: Vec<&CombatUnit> = session.living(Team::Enemy).collect();
    let reachable = if config.show_reachable && session.awaiting_movement().is_none() {
        session.reachable().cells()
    } else {
        BTreeSet::new()
    };

    let mut out = render(session.grid().terrain(), &players, &enemies, &reachable, config);
    if let Some(actor) = session.current_actor() {
        let _ = writeln!(
            out,
            "turn {} round {} actor {actor}",
            session.turns_taken(),
            session.turn_order().round()
        );
    } else if let Some(outcome) = session.outcome() {
        let _ = writeln!(out, "ended: {outcome:?}");
    }
    out
}

/// Render an encounter before it starts.
#[must_use]
pub fn render_setup(setup: &EncounterSetup, config: &AsciiConfig) -> String {
    let players: Vec<&CombatUnit> = setup.players.iter().collect();
    let enemies: Vec<&CombatUnit> = setup.enemies.iter().collect();
    render(&setup.terrain, &players, &enemies, &BTreeSet::new(), config)
}

fn render(
    terrain: &TerrainMap,
    players: &[&CombatUnit],
    enemies: &[&CombatUnit],
    reachable: &BTreeSet<Cell>,
    config: &AsciiConfig,
) -> String {
    let mut units: BTreeMap<Cell, (char, Team)> = BTreeMap::new();
    for (team, list) in [(Team::Player, players), (Team::Enemy, enemies)] {
        for (i, unit) in list.iter().enumerate() {
            units.insert(unit.position, (glyph(team, i), team));
        }
    }

    let mut out = String::new();
    for (row, line) in terrain.to_ascii().iter().enumerate() {
        let y = terrain.height() as i32 - 1 - row as i32;
        for (x, tile) in line.chars().enumerate() {
            let cell = Cell::new(x as i32, y);
            match units.get(&cell) {
                Some(&(c, team)) if config.use_color => {
                    let _ = write!(out, "{}{c}{}", team_color(team), colors::RESET);
                }
                Some(&(c, _)) => out.push(c),
                None if reachable.contains(&cell) => {
                    if config.use_color {
                        let _ = write!(out, "{}+{}", colors::GREEN, colors::RESET);
                    } else {
                        out.push('+');
                    }
                }
                None if config.use_color && tile != '.' => {
                    let _ = write!(out, "{}{tile}{}", colors::GRAY, colors::RESET);
                }
                None => out.push(tile),
            }
        }
        out.push('\n');
    }

    if config.show_legend {
        for (team, list) in [(Team::Player, players), (Team::Enemy, enemies)] {
            for (i, unit) in list.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{} {:<10} hp {:>4}  {}",
                    glyph(team, i),
                    unit.name,
                    unit.hp,
                    unit.position
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactics_core::session::Intent;
    use tactics_test_utils::fixtures::{duel_setup, skirmish_setup};

    fn plain() -> AsciiConfig {
        AsciiConfig {
            show_legend: false,
            show_reachable: false,
            use_color: false,
        }
    }

    #[test]
    fn test_render_setup_places_units() {
        let out = render_setup(&skirmish_setup(), &plain());
        let rows: Vec<&str> = out.lines().collect();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0], ".......a");
        assert_eq!(rows[2], "...#.c..");
        assert_eq!(rows[3], "B..#....");
        assert_eq!(rows[4], "......b.");
        assert_eq!(rows[5], "A.......");
    }

    #[test]
    fn test_render_session_shows_reachable() {
        let session = CombatSession::start(duel_setup()).unwrap();
        let config = AsciiConfig {
            show_legend: false,
            ..AsciiConfig::default()
        };
        let out = render_session(&session, &config);
        let bottom = out.lines().nth(4).unwrap();
        assert_eq!(bottom, "A+a..");
        assert!(out.contains("actor 1"));
    }

    #[test]
    fn test_legend_and_dead_units() {
        let mut session = CombatSession::start(duel_setup()).unwrap();
        session.handle(Intent::SelectCell(Cell::new(1, 0)));
        session.handle(Intent::MovementArrived(1));
        session.handle(Intent::SelectTarget(2));

        let out = render_session(&session, &AsciiConfig::default());
        assert!(out.contains("A player-1"));
        assert!(!out.contains("enemy-2"));
        assert!(out.contains("ended"));
    }

    #[test]
    fn test_color_wraps_glyphs() {
        let config = AsciiConfig {
            use_color: true,
            ..plain()
        };
        let out = render_setup(&duel_setup(), &config);
        assert!(out.contains(&format!("{}A{}", colors::CYAN, colors::RESET)));
        assert!(out.contains(&format!("{}a{}", colors::RED, colors::RESET)));
    }
}
