//! Tunable constants, collected into one reviewable place.
//!
//! The source (`w1/ecsTypes.h`, `w1/roguelike.cpp`, `w4/dijkstraMapGen.cpp`)
//! scatters these as literal constants at call sites (`60.f`, `3.f`, a `10`
//! passed straight into a state constructor). `KernelConfig` gathers them
//! the way the teacher's `GameConfig` (`src/game/config.rs`) gathers its own
//! tunables, loaded from a RON file with a code `Default` as the fallback.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Step cost of a `floor` tile.
    pub floor_cost: f32,
    /// Step cost of a `costly` tile.
    pub costly_cost: f32,

    /// Side length of a hierarchical-pathfinding super-tile.
    pub cluster_size: usize,

    /// ARA* epsilon schedule: first weight tried.
    pub ara_epsilon_start: f32,
    /// ARA* epsilon schedule: decrement applied each iteration.
    pub ara_epsilon_step: f32,
    /// ARA* epsilon schedule: weight floor (1.0 = admissible/optimal).
    pub ara_epsilon_floor: f32,

    /// Sentinel distance for unreachable/unset Dijkstra-map cells.
    pub dmap_invalid: f32,
    /// Scale applied when turning an approach map into a flee map.
    pub flee_scale: f32,

    /// Default melee damage dealt on a blocked move into an enemy.
    pub default_melee_damage: f32,
    /// Hitpoints threshold under which `is_low_hp` / flee-style states fire.
    pub low_hp_threshold: f32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            floor_cost: 1.0,
            costly_cost: 10.0,
            cluster_size: 10,
            ara_epsilon_start: 10.0,
            ara_epsilon_step: 0.05,
            ara_epsilon_floor: 1.0,
            dmap_invalid: 1e5,
            flee_scale: -1.2,
            default_melee_damage: 2.0,
            low_hp_threshold: 60.0,
        }
    }
}

impl KernelConfig {
    /// Load from a RON file, falling back to `Default` if the path does not
    /// exist. Malformed RON at an existing path is still an error: unlike a
    /// missing file, that's a host mistake worth surfacing.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(ron::de::from_str(&text)?)
    }
}
