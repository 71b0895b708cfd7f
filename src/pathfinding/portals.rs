//! Hierarchical pathfinding over a portal graph (spec.md §4.4).
//!
//! The grid is partitioned into fixed-size square "clusters" (the source's
//! super-tiles, `w7/pathfinder.cpp`'s `tileSplit`). A portal is a maximal
//! run of adjacent non-wall cells straddling the boundary between two
//! clusters; `prebuild_portals` discovers every portal and the shortest
//! intra-cluster walk between every pair of portals touching the same
//! cluster. `find_hierarchical_path` answers a query by connecting `from`
//! and `to` into this portal graph and running A* over it.
//!
//! A portal keeps its entire boundary run as two paired cell spans, one per
//! side (`cells_a`/`cells_b`, index-paired so `cells_a[i]` sits directly
//! across the boundary from `cells_b[i]`). Intra-cluster edge weights and
//! the `from`/`to` stub searches all search every cell of the relevant
//! span as a source or destination and keep the cheapest result, per
//! `w7/pathfinder.cpp`'s `getShortestPathToPortal`/`getShortestPathToTilePortal`
//! rather than collapsing a multi-cell portal to a single representative
//! cell — a run's edge cells can be strictly closer to a neighboring
//! portal than its midpoint is.

use crate::config::KernelConfig;
use crate::error::{Result, RoguelikeError};
use crate::grid::{Coord, Grid};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Most clusters border only a handful of neighbors; a cluster's portal
/// adjacency list rarely spills onto the heap (teacher's own region
/// adjacency — `game/pathfinding/types.rs`'s `SmallVec<[RegionPortal; 8]>`
/// — uses the same inline-small-vec trick for the same reason).
type Adjacency = SmallVec<[(usize, f32); 8]>;

pub type ClusterId = (usize, usize);

#[derive(Debug, Clone)]
pub struct Portal {
    pub id: usize,
    pub cluster_a: ClusterId,
    pub cluster_b: ClusterId,
    /// Cells of the boundary run lying in `cluster_a`, index-paired with
    /// `cells_b` (`cells_a[i]` is the direct neighbor of `cells_b[i]`).
    pub cells_a: Vec<Coord>,
    pub cells_b: Vec<Coord>,
}

impl Portal {
    pub fn touches(&self, cluster: ClusterId) -> bool {
        self.cluster_a == cluster || self.cluster_b == cluster
    }

    /// Every cell of this portal's span lying in `cluster`.
    pub fn cells_in(&self, cluster: ClusterId) -> &[Coord] {
        if cluster == self.cluster_a {
            &self.cells_a
        } else {
            &self.cells_b
        }
    }

    pub fn other_cluster(&self, cluster: ClusterId) -> ClusterId {
        if cluster == self.cluster_a {
            self.cluster_b
        } else {
            self.cluster_a
        }
    }

    /// The cell directly across the boundary from `cell`, which must be
    /// one of `cells_in(cluster)`. Crossing a portal is a single step
    /// between paired cells, never a search.
    pub fn paired_cell(&self, cluster: ClusterId, cell: Coord) -> Coord {
        let (near, far) = if cluster == self.cluster_a {
            (&self.cells_a, &self.cells_b)
        } else {
            (&self.cells_b, &self.cells_a)
        };
        let idx = near
            .iter()
            .position(|&c| c == cell)
            .expect("cell must belong to this portal's span in the given cluster");
        far[idx]
    }

    /// Centroid of the whole span, used only as a portal-graph A* heuristic
    /// position — it never anchors an edge weight or a stitched path.
    fn position(&self) -> (f32, f32) {
        let cells = self.cells_a.iter().chain(self.cells_b.iter());
        let n = (self.cells_a.len() + self.cells_b.len()) as f32;
        let (sx, sy) = cells.fold((0.0, 0.0), |(sx, sy), c| (sx + c.x as f32, sy + c.y as f32));
        (sx / n, sy / n)
    }
}

#[derive(Debug, Clone)]
pub struct DungeonPortals {
    pub cluster_size: usize,
    pub clusters_x: usize,
    pub clusters_y: usize,
    pub portals: Vec<Portal>,
    adjacency: FxHashMap<usize, Adjacency>,
}

impl DungeonPortals {
    pub fn cluster_of(&self, c: Coord) -> ClusterId {
        (
            c.x as usize / self.cluster_size,
            c.y as usize / self.cluster_size,
        )
    }

    pub fn cluster_bbox(&self, cluster: ClusterId) -> (Coord, Coord) {
        cluster_bbox_of(cluster, self.cluster_size)
    }

    pub fn portals_touching(&self, cluster: ClusterId) -> Vec<&Portal> {
        self.portals.iter().filter(|p| p.touches(cluster)).collect()
    }
}

/// Discover portals and the intra-cluster portal graph for `grid`.
/// Errors if `cluster_size` does not evenly divide either grid dimension
/// (spec.md leaves cluster layout to the host; an uneven split would leave
/// a ragged partial cluster with no well-defined bounding box).
fn cluster_bbox_of(cluster: ClusterId, cluster_size: usize) -> (Coord, Coord) {
    let x0 = cluster.0 * cluster_size;
    let y0 = cluster.1 * cluster_size;
    let min = Coord::new(x0 as i32, y0 as i32);
    let max = Coord::new(
        (x0 + cluster_size - 1) as i32,
        (y0 + cluster_size - 1) as i32,
    );
    (min, max)
}

pub fn prebuild_portals(grid: &Grid, config: &KernelConfig) -> Result<DungeonPortals> {
    let cs = config.cluster_size;
    if grid.width % cs != 0 {
        return Err(RoguelikeError::InvalidConfig {
            cluster_size: cs,
            dimension: grid.width,
        });
    }
    if grid.height % cs != 0 {
        return Err(RoguelikeError::InvalidConfig {
            cluster_size: cs,
            dimension: grid.height,
        });
    }
    let clusters_x = grid.width / cs;
    let clusters_y = grid.height / cs;

    let mut portals = Vec::new();

    // Vertical boundaries: between horizontally-adjacent clusters (cx, cy)
    // and (cx+1, cy).
    for cy in 0..clusters_y {
        let y0 = cy * cs;
        let y1 = y0 + cs;
        for cx in 0..clusters_x.saturating_sub(1) {
            let x_left = cx * cs + cs - 1;
            let x_right = x_left + 1;
            push_boundary_portals(
                &mut portals,
                grid,
                (y0..y1).map(|y| (Coord::new(x_left as i32, y as i32), Coord::new(x_right as i32, y as i32))),
                (cx, cy),
                (cx + 1, cy),
            );
        }
    }

    // Horizontal boundaries: between vertically-adjacent clusters (cx, cy)
    // and (cx, cy+1).
    for cx in 0..clusters_x {
        let x0 = cx * cs;
        let x1 = x0 + cs;
        for cy in 0..clusters_y.saturating_sub(1) {
            let y_top = cy * cs + cs - 1;
            let y_bottom = y_top + 1;
            push_boundary_portals(
                &mut portals,
                grid,
                (x0..x1).map(|x| (Coord::new(x as i32, y_top as i32), Coord::new(x as i32, y_bottom as i32))),
                (cx, cy),
                (cx, cy + 1),
            );
        }
    }

    for (i, p) in portals.iter_mut().enumerate() {
        p.id = i;
    }

    let mut adjacency: FxHashMap<usize, Adjacency> = FxHashMap::default();

    for cy in 0..clusters_y {
        for cx in 0..clusters_x {
            let cluster = (cx, cy);
            let touching: Vec<usize> = portals
                .iter()
                .filter(|p| p.touches(cluster))
                .map(|p| p.id)
                .collect();
            let bbox = cluster_bbox_of(cluster, cs);

            for i in 0..touching.len() {
                for j in (i + 1)..touching.len() {
                    let a_id = touching[i];
                    let b_id = touching[j];
                    let a_cells = portals[a_id].cells_in(cluster).to_vec();
                    let b_cells = portals[b_id].cells_in(cluster).to_vec();
                    let Some(path) = shortest_path_between_spans(grid, bbox, &a_cells, &b_cells)
                    else {
                        continue;
                    };
                    let weight = path_cost(grid, &path);
                    adjacency.entry(a_id).or_default().push((b_id, weight));
                    adjacency.entry(b_id).or_default().push((a_id, weight));
                }
            }
        }
    }

    Ok(DungeonPortals {
        cluster_size: cs,
        clusters_x,
        clusters_y,
        portals,
        adjacency,
    })
}

fn push_boundary_portals(
    portals: &mut Vec<Portal>,
    grid: &Grid,
    pairs: impl Iterator<Item = (Coord, Coord)>,
    cluster_a: ClusterId,
    cluster_b: ClusterId,
) {
    let mut run: Vec<(Coord, Coord)> = Vec::new();
    let mut flush = |run: &mut Vec<(Coord, Coord)>, portals: &mut Vec<Portal>| {
        if run.is_empty() {
            return;
        }
        portals.push(Portal {
            id: 0,
            cluster_a,
            cluster_b,
            cells_a: run.iter().map(|(a, _)| *a).collect(),
            cells_b: run.iter().map(|(_, b)| *b).collect(),
        });
        run.clear();
    };
    for (a, b) in pairs {
        if grid.is_floor(a) && grid.is_floor(b) {
            run.push((a, b));
        } else {
            flush(&mut run, portals);
        }
    }
    flush(&mut run, portals);
}

fn path_cost(grid: &Grid, path: &[Coord]) -> f32 {
    path.iter().skip(1).map(|&c| grid.step_cost(c)).sum()
}

/// Cheapest path from `from` to any cell of `destinations`, within `bbox`.
fn shortest_path_to_any(
    grid: &Grid,
    bbox: (Coord, Coord),
    from: Coord,
    destinations: &[Coord],
) -> Option<Vec<Coord>> {
    let mut best: Option<Vec<Coord>> = None;
    for &d in destinations {
        let path = bounded_astar(grid, from, d, bbox);
        if path.is_empty() {
            continue;
        }
        if best
            .as_ref()
            .map_or(true, |b| path_cost(grid, &path) < path_cost(grid, b))
        {
            best = Some(path);
        }
    }
    best
}

/// Cheapest path between any cell of `sources` and any cell of
/// `destinations`, within `bbox` (spec.md §4.4: "find the shortest
/// A*-in-bounds path from any cell of A to any cell of B, iterating cells
/// of A as sources, cells of B as destinations").
fn shortest_path_between_spans(
    grid: &Grid,
    bbox: (Coord, Coord),
    sources: &[Coord],
    destinations: &[Coord],
) -> Option<Vec<Coord>> {
    let mut best: Option<Vec<Coord>> = None;
    for &s in sources {
        let Some(path) = shortest_path_to_any(grid, bbox, s, destinations) else {
            continue;
        };
        if best
            .as_ref()
            .map_or(true, |b| path_cost(grid, &path) < path_cost(grid, b))
        {
            best = Some(path);
        }
    }
    best
}

/// Answer a point-to-point query using the prebuilt portal graph. Returns
/// the empty path if either endpoint is invalid, or if no route connects
/// `from`'s cluster to `to`'s cluster through the portal graph (spec.md
/// §4.4 permits a disconnected portal graph).
pub fn find_hierarchical_path(
    portals: &DungeonPortals,
    grid: &Grid,
    from: Coord,
    to: Coord,
) -> Vec<Coord> {
    if !grid.in_bounds(from) || !grid.in_bounds(to) || grid.is_wall(from) || grid.is_wall(to) {
        tracing::warn!(?from, ?to, "hierarchical path query rejected: endpoint out of bounds or walled");
        return Vec::new();
    }
    if from == to {
        return vec![from];
    }

    let from_cluster = portals.cluster_of(from);
    let to_cluster = portals.cluster_of(to);

    if from_cluster == to_cluster {
        return bounded_astar(grid, from, to, portals.cluster_bbox(from_cluster));
    }

    let bbox_from = portals.cluster_bbox(from_cluster);
    let bbox_to = portals.cluster_bbox(to_cluster);

    let mut best_from: Option<(usize, Vec<Coord>)> = None;
    for p in portals.portals_touching(from_cluster) {
        let Some(seg) = shortest_path_to_any(grid, bbox_from, from, p.cells_in(from_cluster))
        else {
            continue;
        };
        if best_from
            .as_ref()
            .map_or(true, |(_, b)| path_cost(grid, &seg) < path_cost(grid, b))
        {
            best_from = Some((p.id, seg));
        }
    }
    let Some((from_portal, from_seg)) = best_from else {
        tracing::warn!(?from, cluster = ?from_cluster, "no portal reachable from query start's cluster");
        return Vec::new();
    };

    let mut best_to: Option<(usize, f32)> = None;
    for p in portals.portals_touching(to_cluster) {
        let Some(seg) = shortest_path_to_any(grid, bbox_to, to, p.cells_in(to_cluster)) else {
            continue;
        };
        let cost = path_cost(grid, &seg);
        if best_to.as_ref().map_or(true, |&(_, b)| cost < b) {
            best_to = Some((p.id, cost));
        }
    }
    let Some((to_portal, _)) = best_to else {
        tracing::warn!(?to, cluster = ?to_cluster, "no portal reachable from query goal's cluster");
        return Vec::new();
    };

    let portal_ids = portal_graph_astar(portals, from_portal, to_portal);
    if portal_ids.is_empty() {
        tracing::warn!(
            from_portal, to_portal,
            "portal graph is disconnected between query start and goal clusters"
        );
        return Vec::new();
    }

    let mut full = from_seg;
    let mut cur_cluster = from_cluster;
    for (i, &pid) in portal_ids.iter().enumerate() {
        let p = &portals.portals[pid];
        if i > 0 {
            let cur_cell = *full.last().unwrap();
            let bbox = portals.cluster_bbox(cur_cluster);
            let Some(seg) = shortest_path_to_any(grid, bbox, cur_cell, p.cells_in(cur_cluster))
            else {
                tracing::warn!(
                    portal = pid,
                    "stitching a hierarchical path failed to reconnect to the next portal"
                );
                return Vec::new();
            };
            for &c in seg.iter().skip(1) {
                full.push(c);
            }
        }
        let cur_cell = *full.last().unwrap();
        let far_cluster = p.other_cluster(cur_cluster);
        let far_cell = p.paired_cell(cur_cluster, cur_cell);
        full.push(far_cell);
        cur_cluster = far_cluster;
    }

    // `cur_cluster` is now `to_cluster`; close the gap from wherever the
    // portal walk landed to the actual query destination.
    let tail = bounded_astar(grid, *full.last().unwrap(), to, bbox_to);
    if tail.is_empty() {
        tracing::warn!(?to, "stitching a hierarchical path failed to reach the query goal");
        return Vec::new();
    }
    full.extend(tail.into_iter().skip(1));
    full
}

#[derive(Clone, Copy, PartialEq)]
struct GraphEntry {
    f: f32,
    seq: u64,
    id: usize,
}

impl Eq for GraphEntry {}

impl Ord for GraphEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.f.total_cmp(&self.f) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

impl PartialOrd for GraphEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn portal_graph_astar(portals: &DungeonPortals, start: usize, goal: usize) -> Vec<usize> {
    if start == goal {
        return vec![start];
    }
    let n = portals.portals.len();
    let goal_pos = portals.portals[goal].position();
    let heuristic = |id: usize| {
        let (x, y) = portals.portals[id].position();
        let (gx, gy) = goal_pos;
        ((x - gx).powi(2) + (y - gy).powi(2)).sqrt()
    };

    let mut g = vec![f32::MAX; n];
    let mut prev = vec![usize::MAX; n];
    let mut visited = vec![false; n];
    g[start] = 0.0;

    let mut open = BinaryHeap::new();
    let mut seq = 0u64;
    open.push(GraphEntry {
        f: heuristic(start),
        seq,
        id: start,
    });

    while let Some(GraphEntry { id: cur, .. }) = open.pop() {
        if visited[cur] {
            continue;
        }
        if cur == goal {
            break;
        }
        visited[cur] = true;
        let Some(edges) = portals.adjacency.get(&cur) else {
            continue;
        };
        for &(nb, w) in edges {
            if visited[nb] {
                continue;
            }
            let tentative = g[cur] + w;
            if tentative < g[nb] {
                g[nb] = tentative;
                prev[nb] = cur;
                seq += 1;
                open.push(GraphEntry {
                    f: tentative + heuristic(nb),
                    seq,
                    id: nb,
                });
            }
        }
    }

    if g[goal] == f32::MAX {
        return Vec::new();
    }
    let mut path = vec![goal];
    let mut cur = goal;
    while cur != start {
        cur = prev[cur];
        path.push(cur);
    }
    path.reverse();
    path
}

#[derive(Clone, Copy, PartialEq)]
struct BoundedEntry {
    f: f32,
    seq: u64,
    coord: Coord,
}

impl Eq for BoundedEntry {}

impl Ord for BoundedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.f.total_cmp(&self.f) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

impl PartialOrd for BoundedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* clipped to a rectangular sub-region of the grid, used for both
/// intra-cluster portal-to-portal searches and the two stub searches that
/// connect `from`/`to` to their cluster's portals.
fn bounded_astar(grid: &Grid, from: Coord, to: Coord, bbox: (Coord, Coord)) -> Vec<Coord> {
    let (min, max) = bbox;
    let within = |c: Coord| c.x >= min.x && c.x <= max.x && c.y >= min.y && c.y <= max.y;
    if !within(from) || !within(to) || grid.is_wall(from) || grid.is_wall(to) {
        return Vec::new();
    }
    if from == to {
        return vec![from];
    }

    let mut g: FxHashMap<Coord, f32> = FxHashMap::default();
    let mut prev: FxHashMap<Coord, Coord> = FxHashMap::default();
    let mut closed: FxHashSet<Coord> = FxHashSet::default();
    g.insert(from, 0.0);

    let mut open = BinaryHeap::new();
    let mut seq = 0u64;
    open.push(BoundedEntry {
        f: from.heuristic(to),
        seq,
        coord: from,
    });

    while let Some(BoundedEntry { coord: cur, .. }) = open.pop() {
        if closed.contains(&cur) {
            continue;
        }
        if cur == to {
            let mut res = vec![cur];
            let mut c = cur;
            while c != from {
                c = prev[&c];
                res.push(c);
            }
            res.reverse();
            return res;
        }
        closed.insert(cur);

        for n in cur.neighbours() {
            if !within(n) || !grid.in_bounds(n) || grid.is_wall(n) || closed.contains(&n) {
                continue;
            }
            let tentative = g[&cur] + grid.step_cost(n);
            if tentative < *g.get(&n).unwrap_or(&f32::MAX) {
                g.insert(n, tentative);
                prev.insert(n, cur);
                seq += 1;
                open.push(BoundedEntry {
                    f: tentative + n.heuristic(to),
                    seq,
                    coord: n,
                });
            }
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(w: usize, h: usize) -> Grid {
        Grid::from_wire(w, h, vec![b' '; w * h].as_slice()).unwrap()
    }

    #[test]
    fn single_cluster_query_falls_back_to_flat_astar() {
        let grid = open_grid(4, 4);
        let config = KernelConfig {
            cluster_size: 4,
            ..KernelConfig::default()
        };
        let portals = prebuild_portals(&grid, &config).unwrap();
        let path = find_hierarchical_path(&portals, &grid, Coord::new(0, 0), Coord::new(3, 3));
        assert_eq!(path.first(), Some(&Coord::new(0, 0)));
        assert_eq!(path.last(), Some(&Coord::new(3, 3)));
        for w in path.windows(2) {
            let dx = (w[0].x - w[1].x).abs();
            let dy = (w[0].y - w[1].y).abs();
            assert_eq!(dx + dy, 1);
        }
    }

    #[test]
    fn cross_cluster_query_reaches_goal_on_open_grid() {
        let grid = open_grid(8, 4);
        let config = KernelConfig {
            cluster_size: 4,
            ..KernelConfig::default()
        };
        let portals = prebuild_portals(&grid, &config).unwrap();
        assert!(!portals.portals.is_empty());

        let from = Coord::new(0, 0);
        let to = Coord::new(7, 3);
        let path = find_hierarchical_path(&portals, &grid, from, to);
        assert_eq!(path.first(), Some(&from));
        assert_eq!(path.last(), Some(&to));
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
    fn uneven_cluster_size_is_rejected() {
        let grid = open_grid(5, 4);
        let config = KernelConfig {
            cluster_size: 4,
            ..KernelConfig::default()
        };
        let err = prebuild_portals(&grid, &config).unwrap_err();
        assert!(matches!(err, RoguelikeError::InvalidConfig { .. }));
    }

    #[test]
    fn fully_isolated_cluster_yields_no_path() {
        // 8x4 split into two 4x4 clusters; wall off the entire shared
        // boundary column pair so no portal exists between them.
        let mut grid = open_grid(8, 4);
        for y in 0..4 {
            grid.set_tile(Coord::new(3, y), crate::grid::TileKind::Wall);
            grid.set_tile(Coord::new(4, y), crate::grid::TileKind::Wall);
        }
        let config = KernelConfig {
            cluster_size: 4,
            ..KernelConfig::default()
        };
        let portals = prebuild_portals(&grid, &config).unwrap();
        let path = find_hierarchical_path(&portals, &grid, Coord::new(0, 0), Coord::new(7, 0));
        assert!(path.is_empty());
    }
}
