//! Agent components (spec.md §3): the per-entity state the turn loop,
//! decision cores, and Dijkstra-map followers all read and write.
//!
//! Mirrors the source's `ecsTypes.h` component set, translated from
//! individually-registered ECS fields into `bevy_ecs` `Component`s so the
//! turn loop can run ordinary `Query`s instead of the source's
//! `flecs`-style macro registration.

use crate::grid::Coord;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Faction tag. `enemy-of` is "different team", not a fixed Player/Monster
/// binary, so hive creatures and allied NPCs are just more team values.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Player,
    Monster,
    Hive,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position(pub Coord);

/// Intended next cell, written during resolution phase (a), committed to
/// `Position` in phase (b). Spec invariant: after resolution,
/// `Position == MovePos`.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePos(pub Coord);

/// Fixed reference cell a patrol-style state wanders around.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatrolAnchor(pub Coord);

#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitPoints(pub f32);

impl HitPoints {
    pub fn is_dead(self) -> bool {
        self.0 <= 0.0
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Nop,
    MoveLeft,
    MoveRight,
    MoveDown,
    MoveUp,
    Attack,
}

impl Action {
    /// Contiguous move subrange, enabling "pick a random move" as a
    /// uniform draw (spec.md §3).
    pub const MOVES: [Action; 4] = [
        Action::MoveLeft,
        Action::MoveRight,
        Action::MoveDown,
        Action::MoveUp,
    ];

    pub fn delta(self) -> Coord {
        match self {
            Action::MoveLeft => Coord::new(-1, 0),
            Action::MoveRight => Coord::new(1, 0),
            Action::MoveDown => Coord::new(0, 1),
            Action::MoveUp => Coord::new(0, -1),
            Action::Nop | Action::Attack => Coord::new(0, 0),
        }
    }

    pub fn is_move(self) -> bool {
        matches!(
            self,
            Action::MoveLeft | Action::MoveRight | Action::MoveDown | Action::MoveUp
        )
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeleeDamage(pub f32);

/// Action budget: an agent only hands control to its decision core once
/// every `num_actions` player ticks (spec.md §4.8 step 2).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBudget {
    pub num_actions: u32,
    pub cur_actions: u32,
}

impl ActionBudget {
    pub fn new(num_actions: u32) -> Self {
        Self {
            num_actions: num_actions.max(1),
            cur_actions: 0,
        }
    }

    /// Advance one tick; returns true on the tick where NPC decision cores
    /// should act (the counter wrapped back to 0).
    pub fn tick(&mut self) -> bool {
        self.cur_actions = (self.cur_actions + 1) % self.num_actions;
        self.cur_actions == 0
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealCooldown(pub u32);

impl HealCooldown {
    pub fn tick_down(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }

    pub fn ready(self) -> bool {
        self.0 == 0
    }
}

/// Marker for cells/agents that seed the hive-pack Dijkstra map
/// (spec.md §4.5).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HiveTag;

#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealPickup {
    pub amount: f32,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerupPickup {
    pub damage_bonus: f32,
}

/// Marker present on every agent entity, independent of which decision
/// core (FSM/HFSM/BT) drives it.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Agent;

/// Marker for a named point of interest a `find_waypoint` BT leaf can
/// return, distinct from any agent or pickup entity.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaypointMarker;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_budget_wraps_and_reports_wrap() {
        let mut budget = ActionBudget::new(3);
        assert!(!budget.tick());
        assert!(!budget.tick());
        assert!(budget.tick());
        assert_eq!(budget.cur_actions, 0);
    }

    #[test]
    fn heal_cooldown_saturates_at_zero() {
        let mut cd = HealCooldown(0);
        cd.tick_down();
        assert_eq!(cd.0, 0);
        assert!(cd.ready());
    }

    #[test]
    fn move_deltas_are_unit_steps() {
        for m in Action::MOVES {
            let d = m.delta();
            assert_eq!(d.x.abs() + d.y.abs(), 1);
        }
    }
}
