pub mod agent;
pub mod ai_library;
pub mod blackboard;
pub mod bt;
pub mod config;
pub mod dmaps;
pub mod error;
pub mod fsm;
pub mod grid;
pub mod pathfinding;
pub mod turn;
pub mod world;
