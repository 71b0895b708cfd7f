//! The query interface decision cores consult (spec.md §9 redesign note:
//! "replace the source's ad-hoc global queries with an explicit query
//! interface passed to act/update"). `DecisionWorld` is implemented twice:
//! `EcsWorld`, backed by `bevy_ecs`, is what the turn loop actually runs
//! against; `mock::MockWorld` is a plain-data test double so FSM/HFSM/BT
//! logic is unit-testable without spinning up an ECS.

use crate::agent::{Action, HealPickup, PowerupPickup, Position, Team, WaypointMarker};
use crate::blackboard::Blackboard;
use crate::grid::{Coord, Grid};
use crate::turn::DecisionCore;
use bevy_ecs::prelude::*;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityTag {
    Heal,
    Powerup,
    Waypoint,
}

/// The per-tick interface FSM/HFSM states, transition predicates, and BT
/// leaves consult. `EntityId` is opaque to decision-core code — it never
/// constructs or compares ids itself beyond equality, so a mock id space
/// (`u32`) and a real one (`bevy_ecs::Entity`) are interchangeable here.
pub trait DecisionWorld {
    type EntityId: Copy + Eq + std::hash::Hash;

    fn grid(&self) -> &Grid;
    fn is_alive(&self, entity: Self::EntityId) -> bool;
    fn position(&self, entity: Self::EntityId) -> Option<Coord>;
    fn hitpoints(&self, entity: Self::EntityId) -> Option<f32>;
    fn team(&self, entity: Self::EntityId) -> Option<Team>;
    fn set_action(&mut self, entity: Self::EntityId, action: Action);

    fn blackboard_mut(&mut self, entity: Self::EntityId) -> &mut Blackboard;
    fn blackboard(&self, entity: Self::EntityId) -> &Blackboard;

    /// Nearest entity on a different team than `self_team`, within
    /// `radius` if given.
    fn nearest_enemy(
        &self,
        from: Coord,
        self_team: Team,
        radius: Option<f32>,
    ) -> Option<Self::EntityId>;

    /// Nearest entity carrying `tag`, within `radius` if given.
    fn nearest_with_tag(
        &self,
        from: Coord,
        tag: EntityTag,
        radius: Option<f32>,
    ) -> Option<Self::EntityId>;
}

pub struct EcsWorld {
    pub ecs: World,
    pub grid: Grid,
    blackboards: FxHashMap<Entity, Blackboard>,
    cores: FxHashMap<Entity, DecisionCore>,
}

impl EcsWorld {
    pub fn new(grid: Grid) -> Self {
        Self {
            ecs: World::new(),
            grid,
            blackboards: FxHashMap::default(),
            cores: FxHashMap::default(),
        }
    }

    /// Attach a decision core to `entity`, replacing any previous one.
    pub fn set_core(&mut self, entity: Entity, core: DecisionCore) {
        self.cores.insert(entity, core);
    }

    pub fn has_core(&self, entity: Entity) -> bool {
        self.cores.contains_key(&entity)
    }

    pub fn core_entities(&self) -> Vec<Entity> {
        self.cores.keys().copied().collect()
    }

    /// Run `entity`'s decision core for one tick. Temporarily removes the
    /// core from the map so it can be driven with `&mut self` without
    /// aliasing itself, then puts it back.
    pub fn act_core(&mut self, entity: Entity) {
        if let Some(mut core) = self.cores.remove(&entity) {
            core.act(self, entity);
            self.cores.insert(entity, core);
        }
    }

    pub fn reset_core(&mut self, entity: Entity) {
        if let Some(mut core) = self.cores.remove(&entity) {
            core.reset(self, entity);
            self.cores.insert(entity, core);
        }
    }

    /// Drop `entity`'s core and blackboard. Called on reap so a despawned
    /// agent's decision core doesn't linger as a dead map entry.
    pub fn remove_agent_state(&mut self, entity: Entity) {
        self.cores.remove(&entity);
        self.blackboards.remove(&entity);
    }
}

impl DecisionWorld for EcsWorld {
    type EntityId = Entity;

    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn is_alive(&self, entity: Entity) -> bool {
        self.ecs.get_entity(entity).is_ok()
    }

    fn position(&self, entity: Entity) -> Option<Coord> {
        self.ecs.get::<Position>(entity).map(|p| p.0)
    }

    fn hitpoints(&self, entity: Entity) -> Option<f32> {
        self.ecs
            .get::<crate::agent::HitPoints>(entity)
            .map(|h| h.0)
    }

    fn team(&self, entity: Entity) -> Option<Team> {
        self.ecs.get::<Team>(entity).copied()
    }

    fn set_action(&mut self, entity: Entity, action: Action) {
        if let Some(mut a) = self.ecs.get_mut::<Action>(entity) {
            *a = action;
        }
    }

    fn blackboard_mut(&mut self, entity: Entity) -> &mut Blackboard {
        self.blackboards.entry(entity).or_default()
    }

    fn blackboard(&self, entity: Entity) -> &Blackboard {
        self.blackboards
            .get(&entity)
            .expect("blackboard accessed before any register() call for this entity")
    }

    fn nearest_enemy(&self, from: Coord, self_team: Team, radius: Option<f32>) -> Option<Entity> {
        let mut best: Option<(Entity, f32)> = None;
        for entity_ref in self.ecs.iter_entities() {
            let Some(team) = entity_ref.get::<Team>() else {
                continue;
            };
            if *team == self_team {
                continue;
            }
            let Some(pos) = entity_ref.get::<Position>() else {
                continue;
            };
            let d = from.heuristic(pos.0);
            if radius.is_some_and(|r| d > r) {
                continue;
            }
            if best.as_ref().map_or(true, |(_, bd)| d < *bd) {
                best = Some((entity_ref.id(), d));
            }
        }
        best.map(|(e, _)| e)
    }

    fn nearest_with_tag(&self, from: Coord, tag: EntityTag, radius: Option<f32>) -> Option<Entity> {
        let mut best: Option<(Entity, f32)> = None;
        for entity_ref in self.ecs.iter_entities() {
            let matches = match tag {
                EntityTag::Heal => entity_ref.contains::<HealPickup>(),
                EntityTag::Powerup => entity_ref.contains::<PowerupPickup>(),
                EntityTag::Waypoint => entity_ref.contains::<WaypointMarker>(),
            };
            if !matches {
                continue;
            }
            let Some(pos) = entity_ref.get::<Position>() else {
                continue;
            };
            let d = from.heuristic(pos.0);
            if radius.is_some_and(|r| d > r) {
                continue;
            }
            if best.as_ref().map_or(true, |(_, bd)| d < *bd) {
                best = Some((entity_ref.id(), d));
            }
        }
        best.map(|(e, _)| e)
    }
}

/// Plain-data test double implementing `DecisionWorld` with `u32` ids, no
/// ECS involved. Exists purely so FSM/HFSM/BT unit tests don't need to
/// stand up a `bevy_ecs::World`.
pub mod mock {
    use super::*;

    #[derive(Debug, Clone)]
    pub struct MockAgent {
        pub position: Coord,
        pub hitpoints: f32,
        pub team: Team,
        pub action: Action,
        pub tag: Option<EntityTag>,
    }

    impl Default for MockAgent {
        fn default() -> Self {
            Self {
                position: Coord::new(0, 0),
                hitpoints: 100.0,
                team: Team::Monster,
                action: Action::Nop,
                tag: None,
            }
        }
    }

    pub struct MockWorld {
        pub grid: Grid,
        pub agents: FxHashMap<u32, MockAgent>,
        blackboards: FxHashMap<u32, Blackboard>,
        dead: std::collections::HashSet<u32>,
    }

    impl Default for MockWorld {
        fn default() -> Self {
            Self {
                grid: Grid::default(),
                agents: FxHashMap::default(),
                blackboards: FxHashMap::default(),
                dead: std::collections::HashSet::default(),
            }
        }
    }

    impl MockWorld {
        pub fn spawn(&mut self, id: u32, agent: MockAgent) {
            self.agents.insert(id, agent);
        }

        pub fn kill(&mut self, id: u32) {
            self.dead.insert(id);
        }

        pub fn action_of(&self, id: u32) -> Action {
            self.agents.get(&id).map_or(Action::Nop, |a| a.action)
        }
    }

    impl DecisionWorld for MockWorld {
        type EntityId = u32;

        fn grid(&self) -> &Grid {
            &self.grid
        }

        fn is_alive(&self, entity: u32) -> bool {
            self.agents.contains_key(&entity) && !self.dead.contains(&entity)
        }

        fn position(&self, entity: u32) -> Option<Coord> {
            self.agents.get(&entity).map(|a| a.position)
        }

        fn hitpoints(&self, entity: u32) -> Option<f32> {
            self.agents.get(&entity).map(|a| a.hitpoints)
        }

        fn team(&self, entity: u32) -> Option<Team> {
            self.agents.get(&entity).map(|a| a.team)
        }

        fn set_action(&mut self, entity: u32, action: Action) {
            if let Some(a) = self.agents.get_mut(&entity) {
                a.action = action;
            }
        }

        fn blackboard_mut(&mut self, entity: u32) -> &mut Blackboard {
            self.blackboards.entry(entity).or_default()
        }

        fn blackboard(&self, entity: u32) -> &Blackboard {
            self.blackboards
                .get(&entity)
                .expect("blackboard accessed before any register() call for this entity")
        }

        fn nearest_enemy(&self, from: Coord, self_team: Team, radius: Option<f32>) -> Option<u32> {
            self.agents
                .iter()
                .filter(|(id, a)| a.team != self_team && !self.dead.contains(id))
                .map(|(id, a)| (*id, from.heuristic(a.position)))
                .filter(|(_, d)| radius.map_or(true, |r| *d <= r))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(id, _)| id)
        }

        fn nearest_with_tag(
            &self,
            from: Coord,
            tag: EntityTag,
            radius: Option<f32>,
        ) -> Option<u32> {
            self.agents
                .iter()
                .filter(|(id, a)| a.tag == Some(tag) && !self.dead.contains(id))
                .map(|(id, a)| (*id, from.heuristic(a.position)))
                .filter(|(_, d)| radius.map_or(true, |r| *d <= r))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(id, _)| id)
        }
    }
}
