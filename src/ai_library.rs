//! Concrete states, transitions, and behavior-tree leaves (spec.md §3's
//! abstract decision-core model, instantiated). Grounded on
//! `w1/aiLibrary.cpp` (FSM states/transitions) and `w2/behLibrary.cpp`
//! (BT leaves).
//!
//! Every item here is generic over `W: DecisionWorld`, so the same state
//! or leaf runs unmodified against `world::EcsWorld` in the turn loop and
//! against `world::mock::MockWorld` in unit tests.

use crate::agent::Action;
use crate::blackboard::SlotId;
use crate::bt::{BehResult, BtLeaf};
use crate::fsm::{FsmState, Predicate};
use crate::grid::{Coord, Grid};
use crate::world::{DecisionWorld, EntityTag};
use rand::seq::SliceRandom;

fn apply(from: Coord, action: Action) -> Coord {
    let d = action.delta();
    Coord::new(from.x + d.x, from.y + d.y)
}

fn best_move_toward(grid: &Grid, from: Coord, to: Coord) -> Option<Action> {
    Action::MOVES
        .into_iter()
        .filter(|m| grid.is_floor(apply(from, *m)))
        .min_by(|a, b| {
            apply(from, *a)
                .heuristic(to)
                .total_cmp(&apply(from, *b).heuristic(to))
        })
}

fn best_move_away(grid: &Grid, from: Coord, to: Coord) -> Option<Action> {
    Action::MOVES
        .into_iter()
        .filter(|m| grid.is_floor(apply(from, *m)))
        .max_by(|a, b| {
            apply(from, *a)
                .heuristic(to)
                .total_cmp(&apply(from, *b).heuristic(to))
        })
}

fn random_valid_move(grid: &Grid, from: Coord) -> Option<Action> {
    let mut moves: Vec<Action> = Action::MOVES
        .into_iter()
        .filter(|m| grid.is_floor(apply(from, *m)))
        .collect();
    moves.shuffle(&mut rand::rng());
    moves.first().copied()
}

// ---------------------------------------------------------------------
// Transition predicates
// ---------------------------------------------------------------------

/// True when the nearest enemy is within `distance`.
pub struct EnemyWithinDistance(pub f32);

impl<W: DecisionWorld> Predicate<W> for EnemyWithinDistance {
    fn is_available(&self, world: &W, entity: W::EntityId) -> bool {
        let (Some(pos), Some(team)) = (world.position(entity), world.team(entity)) else {
            return false;
        };
        world.nearest_enemy(pos, team, Some(self.0)).is_some()
    }
}

/// True when the entity's own hitpoints are below `threshold`.
pub struct HitpointsBelowThreshold(pub f32);

impl<W: DecisionWorld> Predicate<W> for HitpointsBelowThreshold {
    fn is_available(&self, world: &W, entity: W::EntityId) -> bool {
        world.hitpoints(entity).is_some_and(|hp| hp < self.0)
    }
}

/// True when a fixed, named target's hitpoints fall below `threshold`
/// (the source's player-hitpoints-below-T, generalized past "the
/// player" to any watched entity).
pub struct OtherHitpointsBelowThreshold<Id> {
    pub target: Id,
    pub threshold: f32,
}

impl<W: DecisionWorld> Predicate<W> for OtherHitpointsBelowThreshold<W::EntityId> {
    fn is_available(&self, world: &W, _entity: W::EntityId) -> bool {
        world
            .hitpoints(self.target)
            .is_some_and(|hp| hp < self.threshold)
    }
}

/// True when a blackboard `i32` counter equals `k`.
pub struct CounterEquals {
    pub slot: SlotId,
    pub k: i32,
}

impl<W: DecisionWorld> Predicate<W> for CounterEquals {
    fn is_available(&self, world: &W, entity: W::EntityId) -> bool {
        *world.blackboard(entity).get::<i32>(self.slot) == self.k
    }
}

/// True when an entity carrying `tag` exists within `distance`.
pub struct TagInRange {
    pub tag: EntityTag,
    pub distance: f32,
}

impl<W: DecisionWorld> Predicate<W> for TagInRange {
    fn is_available(&self, world: &W, entity: W::EntityId) -> bool {
        let Some(pos) = world.position(entity) else {
            return false;
        };
        world
            .nearest_with_tag(pos, self.tag, Some(self.distance))
            .is_some()
    }
}

/// True while a blackboard cooldown counter has drained to zero or below.
/// Meant to be composed with `OtherHitpointsBelowThreshold`/
/// `HitpointsBelowThreshold` via `And` at the predicate-arena level, the
/// same two-part gate the source's `PlayerHealState` transition checks.
pub struct CooldownReady {
    pub slot: SlotId,
}

impl<W: DecisionWorld> Predicate<W> for CooldownReady {
    fn is_available(&self, world: &W, entity: W::EntityId) -> bool {
        *world.blackboard(entity).get::<i32>(self.slot) <= 0
    }
}

// ---------------------------------------------------------------------
// FSM states
// ---------------------------------------------------------------------

/// Wanders: a random valid move every tick. The fallback every other
/// patrol-flavored state reaches for when it has nothing better to do.
#[derive(Default)]
pub struct PatrolState;

impl<W: DecisionWorld> FsmState<W> for PatrolState {
    fn act(&mut self, world: &mut W, entity: W::EntityId) {
        let Some(from) = world.position(entity) else {
            return;
        };
        if let Some(action) = random_valid_move(world.grid(), from) {
            world.set_action(entity, action);
        }
    }
}

/// Greedy pursuit of a fixed target entity; attacks once adjacent.
pub struct ChaseState<Id> {
    pub target: Id,
}

impl<W: DecisionWorld> FsmState<W> for ChaseState<W::EntityId> {
    fn act(&mut self, world: &mut W, entity: W::EntityId) {
        let (Some(from), Some(to)) = (world.position(entity), world.position(self.target)) else {
            return;
        };
        if from.heuristic(to) <= 1.0 {
            world.set_action(entity, Action::Attack);
        } else if let Some(action) = best_move_toward(world.grid(), from, to) {
            world.set_action(entity, action);
        }
    }
}

/// Runs away from a fixed target entity.
pub struct FleeState<Id> {
    pub target: Id,
}

impl<W: DecisionWorld> FsmState<W> for FleeState<W::EntityId> {
    fn act(&mut self, world: &mut W, entity: W::EntityId) {
        let (Some(from), Some(to)) = (world.position(entity), world.position(self.target)) else {
            return;
        };
        if let Some(action) = best_move_away(world.grid(), from, to) {
            world.set_action(entity, action);
        }
    }
}

/// Nudges a named blackboard `i32` slot by `DELTA` every tick, clamped to
/// `[MIN, MAX]`. Generalizes the source's timer/cooldown-style states
/// (`CountDeltaState<T, delta, min, max>`) without hard-coding what the
/// counter represents.
pub struct CountDeltaState<const DELTA: i32, const MIN: i32, const MAX: i32> {
    pub slot: SlotId,
}

impl<W: DecisionWorld, const DELTA: i32, const MIN: i32, const MAX: i32> FsmState<W>
    for CountDeltaState<DELTA, MIN, MAX>
{
    fn act(&mut self, world: &mut W, entity: W::EntityId) {
        let bb = world.blackboard_mut(entity);
        let cur = *bb.get::<i32>(self.slot);
        bb.set(self.slot, (cur + DELTA).clamp(MIN, MAX));
    }
}

/// Gated by a heal-cooldown-style blackboard counter: only while the
/// counter reads `0` does this state mark itself "active" by zeroing a
/// companion `active` slot. The turn loop's pickup/cooldown handling
/// (spec.md §4.8 steps 5-6) owns the actual hitpoint and cooldown
/// mutation; this state only decides whether healing is currently
/// allowed, the same gating role the source's `PlayerHealState` plays
/// against its cooldown component.
pub struct HealGateState {
    pub cooldown_slot: SlotId,
    pub active_slot: SlotId,
}

impl<W: DecisionWorld> FsmState<W> for HealGateState {
    fn act(&mut self, world: &mut W, entity: W::EntityId) {
        let bb = world.blackboard_mut(entity);
        let ready = *bb.get::<i32>(self.cooldown_slot) <= 0;
        bb.set(self.active_slot, ready);
        world.set_action(entity, Action::Nop);
    }
}

/// Greedy pursuit of the nearest entity carrying `tag`, re-queried every
/// tick rather than cached in a blackboard slot. Generalizes the source's
/// per-pickup-kind chase states (heal/powerup/waypoint) into one state
/// parameterized by `EntityTag`.
pub struct MoveToTagState {
    pub tag: EntityTag,
}

impl<W: DecisionWorld> FsmState<W> for MoveToTagState {
    fn act(&mut self, world: &mut W, entity: W::EntityId) {
        let Some(from) = world.position(entity) else {
            return;
        };
        let Some(target) = world.nearest_with_tag(from, self.tag, None) else {
            return;
        };
        let Some(to) = world.position(target) else {
            return;
        };
        if let Some(action) = best_move_toward(world.grid(), from, to) {
            world.set_action(entity, action);
        }
    }
}

/// Holds an anchor position, attacking whichever enemy comes adjacent and
/// otherwise doing nothing. The source's stationary sentries never chase;
/// this is that behavior rather than `ChaseState`'s pursuit.
pub struct GuardState;

impl<W: DecisionWorld> FsmState<W> for GuardState {
    fn act(&mut self, world: &mut W, entity: W::EntityId) {
        let (Some(pos), Some(team)) = (world.position(entity), world.team(entity)) else {
            return;
        };
        match world.nearest_enemy(pos, team, Some(1.0)) {
            Some(_) => world.set_action(entity, Action::Attack),
            None => world.set_action(entity, Action::Nop),
        }
    }
}

/// Does nothing, every tick. Kept as a stub for parity with the source's
/// idle states (`Wander`/`Sleep`/`Shop`/`Craft` all degenerate to this once
/// their flavor-specific animation/dialogue hooks are stripped) — none of
/// those are wired into any transition graph here.
#[derive(Default)]
pub struct NopState;

impl<W: DecisionWorld> FsmState<W> for NopState {
    fn act(&mut self, world: &mut W, entity: W::EntityId) {
        world.set_action(entity, Action::Nop);
    }
}

/// No-op placeholder: the source defines an `AttackEnemy` state but never
/// wires it into a transition graph (`ChaseState`/`MoveToEntity` already
/// attack on adjacency), so this is kept only for parity and never reached
/// in any constructed FSM here.
#[derive(Default)]
pub struct AttackEnemyState;

impl<W: DecisionWorld> FsmState<W> for AttackEnemyState {
    fn act(&mut self, _world: &mut W, _entity: W::EntityId) {}
}

// ---------------------------------------------------------------------
// Behavior tree leaves
// ---------------------------------------------------------------------

/// Moves toward the entity referenced by a blackboard `Option<EntityId>`
/// slot, attacking once adjacent. Fails (spec.md §7 kind 3, stale target)
/// if the slot is empty or the referenced entity is no longer alive.
pub struct MoveToEntity<Id> {
    pub target_slot: SlotId,
    _marker: std::marker::PhantomData<Id>,
}

impl<Id> MoveToEntity<Id> {
    pub fn new(target_slot: SlotId) -> Self {
        Self {
            target_slot,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<W: DecisionWorld> BtLeaf<W> for MoveToEntity<W::EntityId> {
    fn tick(&mut self, world: &mut W, entity: W::EntityId) -> BehResult {
        let Some(target) = *world.blackboard(entity).get::<Option<W::EntityId>>(self.target_slot)
        else {
            return BehResult::Fail;
        };
        if !world.is_alive(target) {
            return BehResult::Fail;
        }
        let (Some(from), Some(to)) = (world.position(entity), world.position(target)) else {
            return BehResult::Fail;
        };
        if from.heuristic(to) <= 1.0 {
            world.set_action(entity, Action::Attack);
            return BehResult::Success;
        }
        match best_move_toward(world.grid(), from, to) {
            Some(action) => {
                world.set_action(entity, action);
                BehResult::Success
            }
            None => BehResult::Fail,
        }
    }
}

/// Success iff hitpoints are below `threshold`; never mutates the agent
/// (spec.md §8 scenario 6).
pub struct IsLowHp(pub f32);

impl<W: DecisionWorld> BtLeaf<W> for IsLowHp {
    fn tick(&mut self, world: &mut W, entity: W::EntityId) -> BehResult {
        match world.hitpoints(entity) {
            Some(hp) if hp < self.0 => BehResult::Success,
            _ => BehResult::Fail,
        }
    }
}

/// Writes the nearest enemy's id into a blackboard slot. Success iff one
/// was found within `radius`.
pub struct FindEnemy<Id> {
    pub radius: Option<f32>,
    pub target_slot: SlotId,
    _marker: std::marker::PhantomData<Id>,
}

impl<Id> FindEnemy<Id> {
    pub fn new(radius: Option<f32>, target_slot: SlotId) -> Self {
        Self {
            radius,
            target_slot,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<W: DecisionWorld> BtLeaf<W> for FindEnemy<W::EntityId> {
    fn tick(&mut self, world: &mut W, entity: W::EntityId) -> BehResult {
        let (Some(pos), Some(team)) = (world.position(entity), world.team(entity)) else {
            return BehResult::Fail;
        };
        match world.nearest_enemy(pos, team, self.radius) {
            Some(found) => {
                world
                    .blackboard_mut(entity)
                    .set(self.target_slot, Some(found));
                BehResult::Success
            }
            None => BehResult::Fail,
        }
    }
}

macro_rules! find_tagged_leaf {
    ($name:ident, $tag:expr) => {
        #[doc = "Writes the nearest matching entity's id into a blackboard slot."]
        pub struct $name<Id> {
            pub target_slot: SlotId,
            _marker: std::marker::PhantomData<Id>,
        }

        impl<Id> $name<Id> {
            pub fn new(target_slot: SlotId) -> Self {
                Self {
                    target_slot,
                    _marker: std::marker::PhantomData,
                }
            }
        }

        impl<W: DecisionWorld> BtLeaf<W> for $name<W::EntityId> {
            fn tick(&mut self, world: &mut W, entity: W::EntityId) -> BehResult {
                let Some(pos) = world.position(entity) else {
                    return BehResult::Fail;
                };
                match world.nearest_with_tag(pos, $tag, None) {
                    Some(found) => {
                        world
                            .blackboard_mut(entity)
                            .set(self.target_slot, Some(found));
                        BehResult::Success
                    }
                    None => BehResult::Fail,
                }
            }
        }
    };
}

find_tagged_leaf!(FindHeal, EntityTag::Heal);
find_tagged_leaf!(FindPowerup, EntityTag::Powerup);
find_tagged_leaf!(FindWaypoint, EntityTag::Waypoint);

/// Moves directly away from the entity referenced by a blackboard
/// `Option<EntityId>` slot. Fails under the same stale-target rule as
/// `MoveToEntity`.
pub struct Flee<Id> {
    pub target_slot: SlotId,
    _marker: std::marker::PhantomData<Id>,
}

impl<Id> Flee<Id> {
    pub fn new(target_slot: SlotId) -> Self {
        Self {
            target_slot,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<W: DecisionWorld> BtLeaf<W> for Flee<W::EntityId> {
    fn tick(&mut self, world: &mut W, entity: W::EntityId) -> BehResult {
        let Some(target) = *world.blackboard(entity).get::<Option<W::EntityId>>(self.target_slot)
        else {
            return BehResult::Fail;
        };
        if !world.is_alive(target) {
            return BehResult::Fail;
        }
        let (Some(from), Some(to)) = (world.position(entity), world.position(target)) else {
            return BehResult::Fail;
        };
        match best_move_away(world.grid(), from, to) {
            Some(action) => {
                world.set_action(entity, action);
                BehResult::Success
            }
            None => BehResult::Fail,
        }
    }
}

/// Wanders within `radius` of a blackboard-stored anchor `Coord`, falling
/// back to an unconstrained random valid move once outside it.
pub struct Patrol {
    pub anchor_slot: SlotId,
    pub radius: f32,
}

impl<W: DecisionWorld> BtLeaf<W> for Patrol {
    fn tick(&mut self, world: &mut W, entity: W::EntityId) -> BehResult {
        let Some(from) = world.position(entity) else {
            return BehResult::Fail;
        };
        let anchor = *world.blackboard(entity).get::<Coord>(self.anchor_slot);
        let action = if from.heuristic(anchor) > self.radius {
            best_move_toward(world.grid(), from, anchor)
        } else {
            random_valid_move(world.grid(), from)
        };
        match action {
            Some(a) => {
                world.set_action(entity, a);
                BehResult::Success
            }
            None => BehResult::Fail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::Blackboard;
    use crate::world::mock::{MockAgent, MockWorld};

    fn world_with(agents: Vec<(u32, MockAgent)>) -> MockWorld {
        let mut world = MockWorld::default();
        world.grid = crate::grid::Grid::from_wire(5, 5, vec![b' '; 25].as_slice()).unwrap();
        for (id, a) in agents {
            world.spawn(id, a);
        }
        world
    }

    #[test]
    fn is_low_hp_leaf_does_not_mutate() {
        let mut world = world_with(vec![(
            0,
            MockAgent {
                hitpoints: 40.0,
                ..MockAgent::default()
            },
        )]);
        let mut leaf = IsLowHp(50.0);
        assert_eq!(leaf.tick(&mut world, 0), BehResult::Success);
        assert_eq!(world.action_of(0), Action::Nop);
    }

    #[test]
    fn move_to_entity_attacks_when_adjacent() {
        let mut world = world_with(vec![
            (
                0,
                MockAgent {
                    position: Coord::new(0, 0),
                    team: crate::agent::Team::Player,
                    ..MockAgent::default()
                },
            ),
            (
                1,
                MockAgent {
                    position: Coord::new(1, 0),
                    team: crate::agent::Team::Monster,
                    ..MockAgent::default()
                },
            ),
        ]);
        world.blackboard_mut(0).register::<Option<u32>>("target");
        let slot = world.blackboard(0).slot("target").unwrap();
        world.blackboard_mut(0).set(slot, Some(1u32));

        let mut leaf: MoveToEntity<u32> = MoveToEntity::new(slot);
        assert_eq!(leaf.tick(&mut world, 0), BehResult::Success);
        assert_eq!(world.action_of(0), Action::Attack);
    }

    #[test]
    fn move_to_entity_fails_on_stale_target() {
        let mut world = world_with(vec![(
            0,
            MockAgent {
                position: Coord::new(0, 0),
                ..MockAgent::default()
            },
        )]);
        world.blackboard_mut(0).register::<Option<u32>>("target");
        let slot = world.blackboard(0).slot("target").unwrap();
        world.blackboard_mut(0).set(slot, Some(99u32));

        let mut leaf: MoveToEntity<u32> = MoveToEntity::new(slot);
        assert_eq!(leaf.tick(&mut world, 0), BehResult::Fail);
    }

    #[test]
    fn count_delta_state_clamps() {
        let mut world = world_with(vec![(0, MockAgent::default())]);
        let slot = world.blackboard_mut(0).register::<i32>("counter");
        world.blackboard_mut(0).set(slot, 9);
        let mut state: CountDeltaState<1, 0, 10> = CountDeltaState { slot };
        state.act(&mut world, 0);
        assert_eq!(*world.blackboard(0).get::<i32>(slot), 10);
        state.act(&mut world, 0);
        assert_eq!(*world.blackboard(0).get::<i32>(slot), 10);
    }

    #[test]
    fn enemy_within_distance_predicate() {
        let world = world_with(vec![
            (
                0,
                MockAgent {
                    position: Coord::new(0, 0),
                    team: crate::agent::Team::Player,
                    ..MockAgent::default()
                },
            ),
            (
                1,
                MockAgent {
                    position: Coord::new(3, 0),
                    team: crate::agent::Team::Monster,
                    ..MockAgent::default()
                },
            ),
        ]);
        assert!(EnemyWithinDistance(5.0).is_available(&world, 0));
        assert!(!EnemyWithinDistance(1.0).is_available(&world, 0));
    }

    #[test]
    fn guard_state_attacks_adjacent_enemy_only() {
        let mut world = world_with(vec![
            (
                0,
                MockAgent {
                    position: Coord::new(0, 0),
                    team: crate::agent::Team::Monster,
                    ..MockAgent::default()
                },
            ),
            (
                1,
                MockAgent {
                    position: Coord::new(1, 0),
                    team: crate::agent::Team::Player,
                    ..MockAgent::default()
                },
            ),
        ]);
        let mut guard = GuardState;
        guard.act(&mut world, 0);
        assert_eq!(world.action_of(0), Action::Attack);

        world.agents.get_mut(&1).unwrap().position = Coord::new(4, 4);
        guard.act(&mut world, 0);
        assert_eq!(world.action_of(0), Action::Nop);
    }

    #[test]
    fn cooldown_ready_predicate_reads_blackboard_counter() {
        let mut world = world_with(vec![(0, MockAgent::default())]);
        let slot = world.blackboard_mut(0).register::<i32>("cooldown");
        world.blackboard_mut(0).set(slot, 2);
        let pred = CooldownReady { slot };
        assert!(!pred.is_available(&world, 0));
        world.blackboard_mut(0).set(slot, 0);
        assert!(pred.is_available(&world, 0));
    }

    #[test]
    fn move_to_tag_state_chases_nearest_tagged_entity() {
        let mut world = world_with(vec![
            (
                0,
                MockAgent {
                    position: Coord::new(0, 0),
                    ..MockAgent::default()
                },
            ),
            (
                1,
                MockAgent {
                    position: Coord::new(3, 0),
                    tag: Some(EntityTag::Heal),
                    ..MockAgent::default()
                },
            ),
        ]);
        let mut state = MoveToTagState {
            tag: EntityTag::Heal,
        };
        state.act(&mut world, 0);
        assert_eq!(world.action_of(0), Action::MoveRight);
    }

    #[test]
    fn chase_state_moves_toward_target() {
        let mut world = world_with(vec![
            (
                0,
                MockAgent {
                    position: Coord::new(0, 0),
                    ..MockAgent::default()
                },
            ),
            (
                1,
                MockAgent {
                    position: Coord::new(3, 0),
                    ..MockAgent::default()
                },
            ),
        ]);
        let mut state = ChaseState { target: 1u32 };
        state.act(&mut world, 0);
        assert_eq!(world.action_of(0), Action::MoveRight);
    }
}
