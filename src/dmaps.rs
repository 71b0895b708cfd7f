//! Dijkstra influence maps (spec.md §4.5), grounded on
//! `w4/dijkstraMapGen.cpp`'s `process_dmap`/`gen_player_approach_map`/
//! `gen_hive_pack_map` family.
//!
//! A map is a `W·H` float grid. Seeding writes `0.0` at source cells;
//! `relax` then floods outward one step at a time until a full pass makes
//! no improvement. Unlike the grid pathfinders this is not driven by a
//! single goal — every floor cell ends up with a value, used by a
//! follower to descend (or ascend) the gradient.
//!
//! The source's `process_dmap` scans `x in 0..dd.width, y in 0..dd.width`
//! — a bug on non-square grids that silently skips or over-reads rows.
//! This implementation scans `y in 0..height`, matching the grid's actual
//! shape; the divergence from the source is intentional, not an oversight
//! (see DESIGN.md).

use crate::agent::{HiveTag, Position, Team};
use crate::config::KernelConfig;
use crate::grid::{Coord, Grid};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DijkstraMap {
    pub width: usize,
    pub height: usize,
    values: Vec<f32>,
}

impl DijkstraMap {
    pub fn new(width: usize, height: usize, invalid: f32) -> Self {
        Self {
            width,
            height,
            values: vec![invalid; width * height],
        }
    }

    #[inline]
    fn idx(&self, c: Coord) -> usize {
        c.y as usize * self.width + c.x as usize
    }

    pub fn get(&self, c: Coord) -> f32 {
        self.values[self.idx(c)]
    }

    pub fn set(&mut self, c: Coord, v: f32) {
        let i = self.idx(c);
        self.values[i] = v;
    }

    pub fn reset(&mut self, invalid: f32) {
        self.values.fill(invalid);
    }
}

/// Step from `from` to `to` one cell at a time, always advancing whichever
/// axis has the larger remaining delta; false the moment a traversed cell
/// is a wall.
pub fn line_of_sight(grid: &Grid, from: Coord, to: Coord) -> bool {
    let mut cur = from;
    while cur != to {
        if grid.is_wall(cur) {
            return false;
        }
        let dx = to.x - cur.x;
        let dy = to.y - cur.y;
        if dx.abs() >= dy.abs() {
            cur.x += dx.signum();
        } else {
            cur.y += dy.signum();
        }
    }
    !grid.is_wall(to)
}

/// Full-grid relaxation: for every floor cell, pull its value down to the
/// minimum neighbour plus one. Repeats until a pass makes no change.
/// Out-of-bounds and wall neighbours contribute nothing (treated as the
/// cell's own current value, per spec.md §4.5).
pub fn relax(grid: &Grid, map: &mut DijkstraMap) {
    loop {
        let mut changed = false;
        for y in 0..grid.height {
            for x in 0..grid.width {
                let c = Coord::new(x as i32, y as i32);
                if !grid.is_floor(c) {
                    continue;
                }
                let cur = map.get(c);
                let mut best = cur;
                for n in c.neighbours() {
                    if !grid.in_bounds(n) || !grid.is_floor(n) {
                        continue;
                    }
                    let candidate = map.get(n) + 1.0;
                    if candidate < best {
                        best = candidate;
                    }
                }
                if best < cur {
                    map.set(c, best);
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
}

fn seed_sources(grid: &Grid, map: &mut DijkstraMap, sources: impl Iterator<Item = Coord>) {
    for c in sources {
        if grid.in_bounds(c) && grid.is_floor(c) {
            map.set(c, 0.0);
        }
    }
}

/// Approach-player map: floor cells within `range` of, and in line of
/// sight of, any player-team agent become sources.
pub fn gen_approach_player(
    world: &mut World,
    grid: &Grid,
    out: &mut DijkstraMap,
    range: f32,
    config: &KernelConfig,
) {
    out.reset(config.dmap_invalid);
    let player_positions: Vec<Coord> = world
        .query::<(&Team, &Position)>()
        .iter(world)
        .filter(|(team, _)| **team == Team::Player)
        .map(|(_, pos)| pos.0)
        .collect();

    let in_range_visible: Vec<Coord> = (0..grid.height)
        .flat_map(|y| (0..grid.width).map(move |x| Coord::new(x as i32, y as i32)))
        .filter(|&c| grid.is_floor(c))
        .filter(|&c| {
            player_positions
                .iter()
                .any(|&p| c.heuristic(p) <= range && line_of_sight(grid, c, p))
        })
        .collect();

    seed_sources(grid, out, in_range_visible.into_iter());
    relax(grid, out);
}

/// Flee-player map: recompute approach-player, negate and scale every
/// finite cell, then relax again so the scaled values re-settle into a
/// consistent gradient.
pub fn gen_flee_player(
    world: &mut World,
    grid: &Grid,
    out: &mut DijkstraMap,
    range: f32,
    config: &KernelConfig,
) {
    gen_approach_player(world, grid, out, range, config);
    for y in 0..grid.height {
        for x in 0..grid.width {
            let c = Coord::new(x as i32, y as i32);
            let v = out.get(c);
            if v < config.dmap_invalid {
                out.set(c, v * config.flee_scale);
            }
        }
    }
    relax(grid, out);
}

/// Hive-pack map: sources are every cell occupied by a `HiveTag` agent.
pub fn gen_hive_pack(world: &mut World, grid: &Grid, out: &mut DijkstraMap, config: &KernelConfig) {
    out.reset(config.dmap_invalid);
    let hive_positions: Vec<Coord> = world
        .query_filtered::<&Position, With<HiveTag>>()
        .iter(world)
        .map(|pos| pos.0)
        .collect();
    seed_sources(grid, out, hive_positions.into_iter());
    relax(grid, out);
}

/// Per-agent exploration frontier. Unlike the other variants this map is
/// not rebuilt from scratch every turn: `Explored` cells stay at `0.0`
/// once discovered; only newly-visible cells within `range` of `viewer`
/// transition out of the `Unexplored` sentinel.
pub fn gen_explore(
    grid: &Grid,
    out: &mut DijkstraMap,
    viewer: Coord,
    range: f32,
    unexplored: f32,
) {
    if out.width != grid.width || out.height != grid.height {
        *out = DijkstraMap::new(grid.width, grid.height, unexplored);
    }
    for y in 0..grid.height {
        for x in 0..grid.width {
            let c = Coord::new(x as i32, y as i32);
            if !grid.is_floor(c) {
                continue;
            }
            if out.get(c) == 0.0 {
                continue;
            }
            if c.heuristic(viewer) <= range && line_of_sight(grid, viewer, c) {
                out.set(c, 0.0);
            }
        }
    }
}

/// Wounded-ally map: sources are same-team agents whose hitpoints have
/// fallen below `threshold`.
pub fn gen_ally(
    world: &mut World,
    grid: &Grid,
    out: &mut DijkstraMap,
    team: Team,
    threshold: f32,
    config: &KernelConfig,
) {
    out.reset(config.dmap_invalid);
    let wounded: Vec<Coord> = world
        .query::<(&Team, &Position, &crate::agent::HitPoints)>()
        .iter(world)
        .filter(|(t, _, hp)| **t == team && hp.0 < threshold)
        .map(|(_, pos, _)| pos.0)
        .collect();
    seed_sources(grid, out, wounded.into_iter());
    relax(grid, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(w: usize, h: usize) -> Grid {
        Grid::from_wire(w, h, vec![b' '; w * h].as_slice()).unwrap()
    }

    #[test]
    fn relax_produces_manhattan_distance_on_open_grid() {
        let grid = open_grid(5, 5);
        let mut map = DijkstraMap::new(5, 5, 1e5);
        map.set(Coord::new(0, 0), 0.0);
        relax(&grid, &mut map);
        assert_eq!(map.get(Coord::new(4, 4)), 8.0);
        assert_eq!(map.get(Coord::new(2, 0)), 2.0);
    }

    #[test]
    fn wall_blocks_relaxation_around_it() {
        let mut grid = open_grid(3, 3);
        grid.set_tile(Coord::new(1, 0), crate::grid::TileKind::Wall);
        grid.set_tile(Coord::new(1, 1), crate::grid::TileKind::Wall);
        grid.set_tile(Coord::new(1, 2), crate::grid::TileKind::Wall);
        let mut map = DijkstraMap::new(3, 3, 1e5);
        map.set(Coord::new(0, 0), 0.0);
        relax(&grid, &mut map);
        // column x=1 is a solid wall; x=2 column is unreachable.
        assert_eq!(map.get(Coord::new(2, 0)), 1e5);
    }

    #[test]
    fn line_of_sight_blocked_by_wall() {
        let mut grid = open_grid(5, 1);
        grid.set_tile(Coord::new(2, 0), crate::grid::TileKind::Wall);
        assert!(!line_of_sight(&grid, Coord::new(0, 0), Coord::new(4, 0)));
        assert!(line_of_sight(&grid, Coord::new(0, 0), Coord::new(1, 0)));
    }

    #[test]
    fn flee_map_pushes_away_from_player() {
        let grid = open_grid(5, 1);
        let mut world = World::new();
        world.spawn((Team::Player, Position(Coord::new(0, 0))));
        let config = KernelConfig::default();
        let mut out = DijkstraMap::new(5, 1, config.dmap_invalid);
        gen_flee_player(&mut world, &grid, &mut out, 10.0, &config);
        // Farther from the player should be a larger (less negative) value
        // than right next to it, i.e. fleeing means moving toward higher
        // (less negative) ground away from the source.
        assert!(out.get(Coord::new(4, 0)) > out.get(Coord::new(0, 0)));
    }

    #[test]
    fn hive_map_seeds_from_tagged_agents() {
        let grid = open_grid(5, 1);
        let mut world = World::new();
        world.spawn((HiveTag, Position(Coord::new(2, 0))));
        let config = KernelConfig::default();
        let mut out = DijkstraMap::new(5, 1, config.dmap_invalid);
        gen_hive_pack(&mut world, &grid, &mut out, &config);
        assert_eq!(out.get(Coord::new(2, 0)), 0.0);
        assert_eq!(out.get(Coord::new(0, 0)), 2.0);
    }
}
