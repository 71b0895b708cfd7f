//! ARA* — Anytime Repairing A* (spec.md §4.3).
//!
//! Weighted A* reused as the inner engine with a decreasing `epsilon`
//! schedule. Search state (`g`, `prev`, `open`, `incons`, `visited`)
//! persists across iterations so later, cheaper-epsilon passes repair the
//! previous path instead of starting over. `reset` wipes everything; the
//! driver (the turn loop or a UI host) calls `reset` when epsilon bottoms
//! out or the map/endpoints change, matching the source's
//! `draw_nav_data` loop in `pathfinding/main.cpp`.

use crate::grid::{Coord, Grid};

#[derive(Debug, Clone)]
pub struct AraStar {
    width: usize,
    height: usize,
    g: Vec<f32>,
    prev: Vec<Coord>,
    open: Vec<Coord>,
    incons: Vec<Coord>,
    visited: Vec<Coord>,
    /// Did the most recent `iteration` relax at least one edge? The driver
    /// should only step epsilon down after genuine progress, mirroring the
    /// source's `isExpanded` flag.
    pub is_expanded: bool,
}

impl AraStar {
    pub fn new(width: usize, height: usize) -> Self {
        let mut s = Self {
            width,
            height,
            g: Vec::new(),
            prev: Vec::new(),
            open: Vec::new(),
            incons: Vec::new(),
            visited: Vec::new(),
            is_expanded: false,
        };
        s.reset();
        s
    }

    pub fn reset(&mut self) {
        let size = self.width * self.height;
        self.g = vec![f32::MAX; size];
        self.prev = vec![Coord::INVALID; size];
        self.open.clear();
        self.incons.clear();
        self.visited.clear();
    }

    fn idx(&self, c: Coord) -> usize {
        c.y as usize * self.width + c.x as usize
    }

    fn f(&self, c: Coord, to: Coord, epsilon: f32) -> f32 {
        self.g[self.idx(c)] + epsilon * c.heuristic(to)
    }

    fn reconstruct(&self, grid: &Grid, to: Coord) -> Vec<Coord> {
        let mut cur = to;
        let mut res = vec![cur];
        loop {
            let p = self.prev[self.idx(cur)];
            if p == Coord::INVALID {
                break;
            }
            cur = p;
            res.push(cur);
        }
        res.reverse();
        res
    }

    /// Run one ARA* iteration at the given epsilon, returning the current
    /// reconstructed path to `to`. Returns the empty path if `from` is
    /// invalid.
    pub fn iteration(&mut self, grid: &Grid, from: Coord, to: Coord, epsilon: f32) -> Vec<Coord> {
        self.is_expanded = false;
        self.open.append(&mut self.incons);

        if self.open.is_empty() {
            self.open.push(from);
            let idx = self.idx(from);
            self.g[idx] = 0.0;
        }
        if !grid.in_bounds(from) || grid.is_wall(from) {
            return Vec::new();
        }

        let mut closed: Vec<Coord> = Vec::new();

        let best_in_open = |open: &[Coord], this: &Self| -> Option<(usize, f32)> {
            open.iter()
                .enumerate()
                .map(|(i, &c)| (i, this.f(c, to, epsilon)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
        };

        let Some((_, mut best_score)) = best_in_open(&self.open, self) else {
            return self.reconstruct(grid, to);
        };

        while !self.open.is_empty() && self.f(to, to, epsilon) > best_score {
            let Some((best_idx, score)) = best_in_open(&self.open, self) else {
                break;
            };
            best_score = score;
            let cur = self.open.remove(best_idx);
            if !self.visited.contains(&cur) {
                self.visited.push(cur);
            }
            closed.push(cur);

            for n in cur.neighbours() {
                if !grid.in_bounds(n) || grid.is_wall(n) {
                    continue;
                }
                let n_idx = self.idx(n);
                let cur_idx = self.idx(cur);
                let edge_weight = grid.step_cost(n);
                let tentative_g = self.g[cur_idx] + edge_weight;
                if tentative_g < self.g[n_idx] {
                    self.prev[n_idx] = cur;
                    self.g[n_idx] = tentative_g;
                    self.is_expanded = true;
                    if !closed.contains(&n) {
                        if !self.open.contains(&n) {
                            self.open.push(n);
                        }
                    } else if !self.incons.contains(&n) {
                        self.incons.push(n);
                    }
                }
            }
        }
        self.reconstruct(grid, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_goal_on_empty_grid() {
        let grid = Grid::from_wire(5, 1, b"     ").unwrap();
        let mut ara = AraStar::new(5, 1);
        let from = Coord::new(0, 0);
        let to = Coord::new(4, 0);

        let mut epsilon = 10.0f32;
        let mut path = Vec::new();
        while epsilon >= 1.0 {
            path = ara.iteration(&grid, from, to, epsilon);
            epsilon -= 0.05;
        }
        assert_eq!(path.first(), Some(&from));
        assert_eq!(path.last(), Some(&to));
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn reset_clears_state() {
        let grid = Grid::from_wire(3, 1, b"   ").unwrap();
        let mut ara = AraStar::new(3, 1);
        let _ = ara.iteration(&grid, Coord::new(0, 0), Coord::new(2, 0), 2.0);
        ara.reset();
        assert!(ara.open.is_empty());
        assert!(ara.g.iter().all(|&v| v == f32::MAX));
    }
}
