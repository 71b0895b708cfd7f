//! Tile grid model: the `DungeonData` of spec.md §3.
//!
//! A row-major array of `W·H` tiles, `idx(x, y) = y*W + x`. `wall` tiles
//! block movement; `floor` and `costly` tiles are traversable at step cost
//! 1 and 10 respectively (`KernelConfig::{floor_cost, costly_cost}`).

use crate::config::KernelConfig;
use crate::error::{Result, RoguelikeError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Floor,
    Wall,
    Costly,
}

impl TileKind {
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            ' ' => Some(TileKind::Floor),
            '#' => Some(TileKind::Wall),
            'o' => Some(TileKind::Costly),
            _ => None,
        }
    }

    pub fn to_symbol(self) -> char {
        match self {
            TileKind::Floor => ' ',
            TileKind::Wall => '#',
            TileKind::Costly => 'o',
        }
    }
}

/// An integer grid coordinate. `(-1, -1)` is used as the reconstruction
/// sentinel in spec.md §4.1, matching the source's `Position{-1,-1}`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const INVALID: Coord = Coord::new(-1, -1);

    pub fn heuristic(self, other: Coord) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// The four cardinally-adjacent cells, fixed order (right, left, down, up) —
    /// the order the source's IDA* recursion and grid A* both iterate in.
    pub fn neighbours(self) -> [Coord; 4] {
        [
            Coord::new(self.x + 1, self.y),
            Coord::new(self.x - 1, self.y),
            Coord::new(self.x, self.y + 1),
            Coord::new(self.x, self.y - 1),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    tiles: Vec<TileKind>,
    #[serde(skip, default)]
    floor_cost: f32,
    #[serde(skip, default)]
    costly_cost: f32,
}

impl Default for Grid {
    /// A single floor tile. Only useful as a placeholder for test doubles
    /// that need *a* grid before a real one is supplied.
    fn default() -> Self {
        Grid::from_wire(1, 1, b" ").expect("1x1 floor grid is always valid")
    }
}

impl Grid {
    pub fn new(width: usize, height: usize, tiles: Vec<TileKind>) -> Result<Self> {
        Self::with_config(width, height, tiles, &KernelConfig::default())
    }

    pub fn with_config(
        width: usize,
        height: usize,
        tiles: Vec<TileKind>,
        config: &KernelConfig,
    ) -> Result<Self> {
        let expected = width * height;
        if tiles.len() != expected {
            return Err(RoguelikeError::InvalidGrid {
                expected,
                actual: tiles.len(),
            });
        }
        Ok(Self {
            width,
            height,
            tiles,
            floor_cost: config.floor_cost,
            costly_cost: config.costly_cost,
        })
    }

    /// Parse the external wire format of spec.md §6: a contiguous `W·H`
    /// byte buffer of `' '`/`'#'`/`'o'` characters.
    pub fn from_wire(width: usize, height: usize, bytes: &[u8]) -> Result<Self> {
        Self::from_wire_with_config(width, height, bytes, &KernelConfig::default())
    }

    pub fn from_wire_with_config(
        width: usize,
        height: usize,
        bytes: &[u8],
        config: &KernelConfig,
    ) -> Result<Self> {
        let expected = width * height;
        if bytes.len() != expected {
            return Err(RoguelikeError::InvalidGrid {
                expected,
                actual: bytes.len(),
            });
        }
        let mut tiles = Vec::with_capacity(expected);
        for (offset, &b) in bytes.iter().enumerate() {
            let symbol = b as char;
            let kind = TileKind::from_symbol(symbol).ok_or(RoguelikeError::UnknownTileSymbol {
                symbol,
                offset,
            })?;
            tiles.push(kind);
        }
        Self::with_config(width, height, tiles, config)
    }

    pub fn to_wire(&self) -> Vec<u8> {
        self.tiles.iter().map(|t| t.to_symbol() as u8).collect()
    }

    #[inline]
    pub fn in_bounds(&self, c: Coord) -> bool {
        c.x >= 0 && c.y >= 0 && (c.x as usize) < self.width && (c.y as usize) < self.height
    }

    #[inline]
    pub fn idx(&self, c: Coord) -> usize {
        c.y as usize * self.width + c.x as usize
    }

    pub fn tile_at(&self, c: Coord) -> Option<TileKind> {
        if !self.in_bounds(c) {
            return None;
        }
        Some(self.tiles[self.idx(c)])
    }

    pub fn is_wall(&self, c: Coord) -> bool {
        matches!(self.tile_at(c), Some(TileKind::Wall) | None)
    }

    pub fn is_floor(&self, c: Coord) -> bool {
        matches!(self.tile_at(c), Some(TileKind::Floor) | Some(TileKind::Costly))
    }

    /// Step cost of entering `c`. Out-of-bounds/wall cells have no defined
    /// cost; callers must check traversability first.
    pub fn step_cost(&self, c: Coord) -> f32 {
        match self.tile_at(c) {
            Some(TileKind::Floor) => self.floor_cost,
            Some(TileKind::Costly) => self.costly_cost,
            _ => self.floor_cost,
        }
    }

    pub fn tiles(&self) -> &[TileKind] {
        &self.tiles
    }

    pub fn set_tile(&mut self, c: Coord, kind: TileKind) {
        if self.in_bounds(c) {
            let idx = self.idx(c);
            self.tiles[idx] = kind;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        let grid = Grid::from_wire(2, 2, b"o# ").map(|_| ()).unwrap_err();
        // 3 bytes for a 2x2 grid is invalid (needs 4)
        assert!(matches!(grid, RoguelikeError::InvalidGrid { .. }));

        let grid = Grid::from_wire(2, 2, b"o# ").or_else(|_| {
            Grid::from_wire(2, 2, b"o#  ")
        }).unwrap();
        assert_eq!(grid.to_wire(), b"o#  ");
        assert_eq!(grid.tile_at(Coord::new(0, 0)), Some(TileKind::Costly));
        assert_eq!(grid.tile_at(Coord::new(1, 0)), Some(TileKind::Wall));
        assert!(grid.is_wall(Coord::new(1, 0)));
        assert!(!grid.is_floor(Coord::new(1, 0)));
    }

    #[test]
    fn out_of_bounds_is_wall() {
        let grid = Grid::from_wire(1, 1, b" ").unwrap();
        assert!(grid.is_wall(Coord::new(-1, 0)));
        assert!(grid.is_wall(Coord::new(5, 5)));
    }
}
