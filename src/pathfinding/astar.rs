//! Weighted grid A* (spec.md §4.1) and IDA* (spec.md §4.2).
//!
//! `f(n) = g(n) + w·h(n)` with Euclidean `h`, 4-connected neighbours, and
//! destination-tile edge cost (1 for floor, 10 for costly). `w > 1` trades
//! optimality for speed (weighted A*); the contract is "a path", not
//! "the shortest path", once `w` leaves 1.0.
//!
//! Tie-breaking among equal-`f` open entries is "first minimum encountered
//! wins" per spec.md §4.1 — the source scans its open vector left to right
//! and keeps the first strict improvement, so ties resolve to whichever
//! cell was discovered earliest. We reproduce that with a monotonic
//! insertion sequence number breaking ties in the open-set binary heap,
//! since a bare `BinaryHeap` has no notion of insertion order on its own.

use crate::grid::{Coord, Grid};
use fixedbitset::FixedBitSet;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Clone, Copy, PartialEq)]
struct OpenEntry {
    f: f32,
    seq: u64,
    coord: Coord,
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.f.total_cmp(&self.f) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn reconstruct_path(prev: &[Coord], grid: &Grid, to: Coord) -> Vec<Coord> {
    let mut cur = to;
    let mut res = vec![cur];
    loop {
        let p = prev[grid.idx(cur)];
        if p == Coord::INVALID {
            break;
        }
        cur = p;
        res.push(cur);
    }
    res.reverse();
    res
}

/// Weighted A*. Returns the empty path if `from` is out of bounds, if
/// either endpoint is blocked, or if `to` is unreachable. Returns `[from]`
/// if `from == to`.
pub fn find_path_astar(grid: &Grid, from: Coord, to: Coord, weight: f32) -> Vec<Coord> {
    if !grid.in_bounds(from) || grid.is_wall(from) || grid.is_wall(to) {
        tracing::warn!(?from, ?to, "astar query rejected: endpoint out of bounds or walled");
        return Vec::new();
    }
    if from == to {
        return vec![from];
    }

    let size = grid.width * grid.height;
    let mut g = vec![f32::MAX; size];
    let mut prev = vec![Coord::INVALID; size];
    let mut closed = FixedBitSet::with_capacity(size);

    g[grid.idx(from)] = 0.0;
    let mut open = BinaryHeap::new();
    let mut seq: u64 = 0;
    open.push(OpenEntry {
        f: weight * from.heuristic(to),
        seq,
        coord: from,
    });

    while let Some(OpenEntry { coord: cur, .. }) = open.pop() {
        let cur_idx = grid.idx(cur);
        if closed.contains(cur_idx) {
            continue;
        }
        if cur == to {
            return reconstruct_path(&prev, grid, to);
        }
        closed.insert(cur_idx);

        for n in cur.neighbours() {
            if !grid.in_bounds(n) || grid.is_wall(n) {
                continue;
            }
            let n_idx = grid.idx(n);
            if closed.contains(n_idx) {
                continue;
            }
            let tentative_g = g[cur_idx] + grid.step_cost(n);
            if tentative_g < g[n_idx] {
                g[n_idx] = tentative_g;
                prev[n_idx] = cur;
                seq += 1;
                open.push(OpenEntry {
                    f: tentative_g + weight * n.heuristic(to),
                    seq,
                    coord: n,
                });
            }
        }
    }
    tracing::warn!(?from, ?to, "astar found no path: goal unreachable");
    Vec::new()
}

/// Iterative-deepening A* (spec.md §4.2): memory-bounded search via
/// repeated `f`-bounded depth-first search. Returns a path with the same
/// total cost as weight-1 A* (both are optimal given the consistent
/// Euclidean heuristic), or the empty path if unreachable.
pub fn find_path_ida(grid: &Grid, from: Coord, to: Coord) -> Vec<Coord> {
    if !grid.in_bounds(from) || grid.is_wall(from) || grid.is_wall(to) {
        tracing::warn!(?from, ?to, "ida* query rejected: endpoint out of bounds or walled");
        return Vec::new();
    }
    if from == to {
        return vec![from];
    }

    let mut bound = from.heuristic(to);
    let mut path = vec![from];
    loop {
        let t = ida_search(grid, &mut path, 0.0, bound, to);
        if t < 0.0 {
            return path;
        }
        if t == f32::MAX {
            tracing::warn!(?from, ?to, "ida* found no path: goal unreachable");
            return Vec::new();
        }
        bound = t;
    }
}

/// One bounded DFS pass. Returns a negative sentinel `-f` on success, the
/// minimum over-bound `f` seen otherwise (used as the next iteration's
/// bound), or `f32::MAX` if every branch was pruned (search exhausted).
fn ida_search(grid: &Grid, path: &mut Vec<Coord>, g: f32, bound: f32, to: Coord) -> f32 {
    let p = *path.last().unwrap();
    let f = g + p.heuristic(to);
    if f > bound {
        return f;
    }
    if p == to {
        return -f;
    }

    let mut min = f32::MAX;
    for n in p.neighbours() {
        if !grid.in_bounds(n) || grid.is_wall(n) {
            continue;
        }
        if path.contains(&n) {
            continue;
        }
        path.push(n);
        let g_score = g + grid.step_cost(n);
        let t = ida_search(grid, path, g_score, bound, to);
        if t < 0.0 {
            return t;
        }
        if t < min {
            min = t;
        }
        path.pop();
    }
    min
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    fn row(w: usize, h: usize, s: &str) -> Grid {
        Grid::from_wire(w, h, s.as_bytes()).unwrap()
    }

    #[test]
    fn five_by_one_row() {
        let grid = row(5, 1, "     ");
        let path = find_path_astar(&grid, Coord::new(0, 0), Coord::new(4, 0), 1.0);
        assert_eq!(path.len(), 5);
        assert_eq!(path.first(), Some(&Coord::new(0, 0)));
        assert_eq!(path.last(), Some(&Coord::new(4, 0)));
    }

    #[test]
    fn from_equals_to() {
        let grid = row(5, 1, "     ");
        let path = find_path_astar(&grid, Coord::new(2, 0), Coord::new(2, 0), 1.0);
        assert_eq!(path, vec![Coord::new(2, 0)]);
    }

    #[test]
    fn out_of_bounds_from_is_empty() {
        let grid = row(5, 1, "     ");
        let path = find_path_astar(&grid, Coord::new(-1, 0), Coord::new(2, 0), 1.0);
        assert!(path.is_empty());
    }

    #[test]
    fn maze_routes_around_walls() {
        // 3x3 with walls at (1,0) and (1,1); s=(0,0), t=(2,0) (spec.md scenario 2).
        let mut grid = Grid::from_wire(3, 3, b"         ").unwrap();
        grid.set_tile(Coord::new(1, 0), crate::grid::TileKind::Wall);
        grid.set_tile(Coord::new(1, 1), crate::grid::TileKind::Wall);

        let path = find_path_astar(&grid, Coord::new(0, 0), Coord::new(2, 0), 1.0);
        assert_eq!(path.len(), 7);
        assert_eq!(path.first(), Some(&Coord::new(0, 0)));
        assert_eq!(path.last(), Some(&Coord::new(2, 0)));
        for c in &path {
            assert!(!grid.is_wall(*c));
        }
        for w in path.windows(2) {
            let dx = (w[0].x - w[1].x).abs();
            let dy = (w[0].y - w[1].y).abs();
            assert_eq!(dx + dy, 1);
        }
    }

    #[test]
    fn costly_tile_detour_scenario() {
        // Grid ["o#", " "] (W=2,H=2): from (1,1) to (0,0) must go via
        // (1,1)->(0,1)->(0,0), cost 1 + 10 = 11, not through the wall at (1,0).
        let grid = Grid::from_wire(2, 2, b"o#  ").unwrap();
        let path = find_path_astar(&grid, Coord::new(1, 1), Coord::new(0, 0), 1.0);
        assert_eq!(
            path,
            vec![Coord::new(1, 1), Coord::new(0, 1), Coord::new(0, 0)]
        );
    }

    #[test]
    fn ida_matches_astar_cost_on_empty_grid() {
        let grid = row(20, 20, &" ".repeat(400));
        let from = Coord::new(0, 0);
        let to = Coord::new(19, 19);
        let ida_path = find_path_ida(&grid, from, to);
        assert_eq!(ida_path.len(), 39);
    }

    #[test]
    fn unreachable_goal_is_empty() {
        let mut g = Grid::from_wire(3, 1, b"   ").unwrap();
        g.set_tile(Coord::new(1, 0), crate::grid::TileKind::Wall);
        let path = find_path_astar(&g, Coord::new(0, 0), Coord::new(2, 0), 1.0);
        assert!(path.is_empty());
        let path = find_path_ida(&g, Coord::new(0, 0), Coord::new(2, 0));
        assert!(path.is_empty());
    }
}
