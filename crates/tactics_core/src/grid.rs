//! Battlefield geometry and occupancy.
//!
//! [`TerrainMap`] is the static level layout handed over by the map; it is
//! never mutated by combat. [`GridIndex`] pairs it with the live occupancy map
//! so that every walkability check is a constant-time lookup instead of a scan
//! over all units.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CombatError, Result};
use crate::unit::UnitId;

/// A grid cell in integer map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Cell {
    /// Column.
    pub x: i32,
    /// Row, growing upward.
    pub y: i32,
}

impl Cell {
    /// Create a cell at `(x, y)`.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Cell shifted by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Manhattan distance to `other`.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The four cardinal neighbours in [`CARDINALS`] order.
    #[must_use]
    pub fn neighbors(self) -> [Self; 4] {
        CARDINALS.map(|(dx, dy)| self.offset(dx, dy))
    }
}

impl From<(i32, i32)> for Cell {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal step offsets: right, left, up, down.
///
/// This order is observable: it breaks ties in pathfinding, reachability
/// and the enemy's choice of approach cell.
pub const CARDINALS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Static tile kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tile {
    /// Walkable ground.
    #[default]
    Floor,
    /// Wall, rock or any other blocking tile.
    Obstacle,
    /// No tile at all. Treated as blocked.
    Void,
}

impl Tile {
    /// Returns true if units may stand on this tile.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        matches!(self, Self::Floor)
    }

    const fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(Self::Floor),
            '#' => Some(Self::Obstacle),
            ' ' | '~' => Some(Self::Void),
            _ => None,
        }
    }

    const fn to_char(self) -> char {
        match self {
            Self::Floor => '.',
            Self::Obstacle => '#',
            Self::Void => '~',
        }
    }
}

/// Static level geometry.
///
/// Cells outside the `width × height` rectangle have no tile and are
/// therefore blocked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTerrain")]
pub struct TerrainMap {
    width: u32,
    height: u32,
    /// Tiles in row-major order, row 0 at `y == 0`.
    tiles: Vec<Tile>,
}

/// Unchecked wire form of [`TerrainMap`].
#[derive(Deserialize)]
struct RawTerrain {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl TryFrom<RawTerrain> for TerrainMap {
    type Error = CombatError;

    fn try_from(raw: RawTerrain) -> Result<Self> {
        let expected = (raw.width as usize).checked_mul(raw.height as usize);
        if expected != Some(raw.tiles.len()) {
            return Err(CombatError::InvalidSetup(format!(
                "terrain is {}x{} but has {} tiles",
                raw.width,
                raw.height,
                raw.tiles.len()
            )));
        }
        Ok(Self {
            width: raw.width,
            height: raw.height,
            tiles: raw.tiles,
        })
    }
}

impl TerrainMap {
    /// Create a terrain of the given size with every tile walkable.
    #[must_use]
    pub fn open(width: u32, height: u32) -> Self {
        let count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            tiles: vec![Tile::Floor; count],
        }
    }

    /// Parse terrain from ASCII rows.
    ///
    /// `.` is floor, `#` is an obstacle and a space or `~` is void. The first
    /// row is the top of the map (largest `y`). Short rows are padded with
    /// void.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::InvalidSetup`] on an unknown tile character or
    /// an empty map.
    pub fn from_ascii<S: AsRef<str>>(rows: &[S]) -> Result<Self> {
        let height = rows.len();
        let width = rows
            .iter()
            .map(|r| r.as_ref().chars().count())
            .max()
            .unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(CombatError::InvalidSetup("terrain has no tiles".into()));
        }

        let mut map = Self {
            width: width as u32,
            height: height as u32,
            tiles: vec![Tile::Void; width * height],
        };
        for (row_idx, row) in rows.iter().enumerate() {
            let y = (height - 1 - row_idx) as i32;
            for (x, c) in row.as_ref().chars().enumerate() {
                let tile = Tile::from_char(c).ok_or_else(|| {
                    CombatError::InvalidSetup(format!(
                        "unknown tile '{c}' at row {row_idx}, column {x}"
                    ))
                })?;
                map.set_tile(Cell::new(x as i32, y), tile);
            }
        }
        Ok(map)
    }

    /// Render back to ASCII rows, top row first.
    #[must_use]
    pub fn to_ascii(&self) -> Vec<String> {
        (0..self.height as i32)
            .rev()
            .map(|y| {
                (0..self.width as i32)
                    .map(|x| self.tile(Cell::new(x, y)).to_char())
                    .collect()
            })
            .collect()
    }

    /// Map width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Map height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, cell: Cell) -> Option<usize> {
        if self.in_bounds(cell) {
            Some((cell.y as usize) * (self.width as usize) + (cell.x as usize))
        } else {
            None
        }
    }

    /// Check if a cell lies inside the map rectangle.
    #[must_use]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    /// Tile at `cell`; [`Tile::Void`] outside the map.
    #[must_use]
    pub fn tile(&self, cell: Cell) -> Tile {
        self.index(cell)
            .and_then(|i| self.tiles.get(i).copied())
            .unwrap_or(Tile::Void)
    }

    /// Set the tile at `cell`. Returns `false` if out of bounds.
    pub fn set_tile(&mut self, cell: Cell, tile: Tile) -> bool {
        match self.index(cell).and_then(|i| self.tiles.get_mut(i)) {
            Some(slot) => {
                *slot = tile;
                true
            }
            None => false,
        }
    }

    /// Check if a cell is walkable terrain.
    #[must_use]
    pub fn is_walkable(&self, cell: Cell) -> bool {
        self.tile(cell).is_walkable()
    }
}

/// Static obstacles plus live unit occupancy.
///
/// The two occupancy maps are always updated together, so no caller can
/// observe a unit in two cells or a cell claimed by two units.
#[derive(Debug, Clone)]
pub struct GridIndex {
    terrain: TerrainMap,
    occupants: HashMap<Cell, UnitId>,
    positions: HashMap<UnitId, Cell>,
}

impl GridIndex {
    /// Create an index over `terrain` with no units placed.
    #[must_use]
    pub fn new(terrain: TerrainMap) -> Self {
        Self {
            terrain,
            occupants: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    /// The static terrain.
    #[must_use]
    pub const fn terrain(&self) -> &TerrainMap {
        &self.terrain
    }

    /// True for obstacle tiles, void tiles and anything off the map.
    #[must_use]
    pub fn is_obstacle(&self, cell: Cell) -> bool {
        !self.terrain.is_walkable(cell)
    }

    /// Unit standing on `cell`, if any.
    #[must_use]
    pub fn occupant(&self, cell: Cell) -> Option<UnitId> {
        self.occupants.get(&cell).copied()
    }

    /// Cell currently held by `unit`.
    #[must_use]
    pub fn position_of(&self, unit: UnitId) -> Option<Cell> {
        self.positions.get(&unit).copied()
    }

    /// Number of placed units.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.positions.len()
    }

    /// Check whether `cell` blocks movement for `mover`.
    ///
    /// A cell is blocked if it is an obstacle or held by any unit other than
    /// `mover`. Pass `None` to treat every occupant as blocking.
    #[must_use]
    pub fn is_blocked_for(&self, cell: Cell, mover: Option<UnitId>) -> bool {
        if self.is_obstacle(cell) {
            return true;
        }
        match self.occupant(cell) {
            Some(occupant) => Some(occupant) != mover,
            None => false,
        }
    }

    /// Put `unit` on `cell`.
    ///
    /// Re-placing a unit moves it: its previous cell is released.
    ///
    /// # Errors
    ///
    /// [`CombatError::CellBlocked`] on a static obstacle,
    /// [`CombatError::Conflict`] if another unit already stands there.
    pub fn place(&mut self, unit: UnitId, cell: Cell) -> Result<()> {
        if self.is_obstacle(cell) {
            return Err(CombatError::CellBlocked(cell));
        }
        if let Some(occupant) = self.occupant(cell) {
            if occupant != unit {
                return Err(CombatError::Conflict { cell, occupant });
            }
            return Ok(());
        }
        if let Some(previous) = self.positions.insert(unit, cell) {
            self.occupants.remove(&previous);
        }
        self.occupants.insert(cell, unit);
        Ok(())
    }

    /// Transfer `unit` from `from` to `to` in one step.
    ///
    /// # Errors
    ///
    /// [`CombatError::UnknownUnit`] if `unit` is not standing on `from`,
    /// [`CombatError::Conflict`] if `to` holds a different unit.
    pub fn move_occupant(&mut self, unit: UnitId, from: Cell, to: Cell) -> Result<()> {
        if self.position_of(unit) != Some(from) {
            return Err(CombatError::UnknownUnit(unit));
        }
        if let Some(occupant) = self.occupant(to) {
            if occupant != unit {
                return Err(CombatError::Conflict { cell: to, occupant });
            }
            return Ok(());
        }
        self.occupants.remove(&from);
        self.occupants.insert(to, unit);
        self.positions.insert(unit, to);
        Ok(())
    }

    /// Remove `unit` from the grid, returning the cell it freed.
    pub fn remove(&mut self, unit: UnitId) -> Option<Cell> {
        let cell = self.positions.remove(&unit)?;
        self.occupants.remove(&cell);
        Some(cell)
    }

    /// Drop every occupancy entry. Terrain is untouched.
    pub fn clear_occupancy(&mut self) {
        self.occupants.clear();
        self.positions.clear();
    }

    /// Path from `mover`'s current cell to `goal`, avoiding obstacles and
    /// every other unit. Empty if `mover` is not placed or no path exists.
    #[must_use]
    pub fn path_for(&self, mover: UnitId, goal: Cell, max_nodes: usize) -> Vec<Cell> {
        let Some(start) = self.position_of(mover) else {
            return Vec::new();
        };
        crate::pathfinding::find_path_bounded(
            start,
            goal,
            |cell| self.is_blocked_for(cell, Some(mover)),
            max_nodes,
        )
    }

    /// Reachable cells for `mover` within `budget` steps. Empty if `mover`
    /// is not placed.
    #[must_use]
    pub fn reachable_for(&self, mover: UnitId, budget: u32) -> crate::reachability::Reachable {
        let Some(start) = self.position_of(mover) else {
            return crate::reachability::Reachable::default();
        };
        crate::reachability::compute_reachable(start, budget, |cell| {
            self.is_blocked_for(cell, Some(mover))
        })
    }
}
