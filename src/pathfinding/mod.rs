//! Pathfinding subsystem (spec.md §4.1–§4.4): flat weighted A*/IDA*, the
//! anytime ARA* variant, and hierarchical portal-graph search over
//! prebuilt clusters.

pub mod ara_star;
pub mod astar;
pub mod portals;

pub use ara_star::AraStar;
pub use astar::{find_path_astar, find_path_ida};
pub use portals::{find_hierarchical_path, prebuild_portals, ClusterId, DungeonPortals, Portal};
