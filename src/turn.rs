//! Turn driver (spec.md §4.8), grounded on `w1/roguelike.cpp`'s main loop:
//! wait for player input, gate NPC thinking on the player's action budget,
//! resolve every actor's action in two deferred phases so blocked moves
//! and melee never read a half-updated position, then reap, hand out
//! pickups, and tick cooldowns.

use crate::agent::{
    Action, ActionBudget, HealCooldown, HealPickup, HitPoints, MeleeDamage, MovePos,
    PowerupPickup, Position, Team,
};
use crate::bt::BehaviorTree;
use crate::fsm::Fsm;
use crate::grid::{Coord, Grid};
use crate::world::EcsWorld;
use bevy_ecs::prelude::*;

/// Monotonic tick count, read by the `#[profile]` macro to decide when to
/// emit a periodic timing log regardless of how long a single call took.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnCounter(pub u64);

impl TurnCounter {
    pub fn tick(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// The one decision core an agent owns (spec.md §3: "exactly one of
/// {FSM, HFSM, BT}"). HFSM is just an `Fsm` whose states happen to be
/// `NestedFsmState`, so it needs no variant of its own.
pub enum DecisionCore {
    Fsm(Fsm<EcsWorld>),
    Bt(BehaviorTree<EcsWorld>),
}

impl DecisionCore {
    pub(crate) fn act(&mut self, world: &mut EcsWorld, entity: Entity) {
        match self {
            DecisionCore::Fsm(fsm) => fsm.act(world, entity),
            DecisionCore::Bt(bt) => {
                bt.tick(world, entity);
            }
        }
    }

    pub(crate) fn reset(&mut self, world: &mut EcsWorld, entity: Entity) {
        match self {
            DecisionCore::Fsm(fsm) => fsm.reset(world, entity),
            DecisionCore::Bt(_) => {}
        }
    }
}

/// Reset every agent's decision core to its starting state (spec.md §6's
/// `reset_all_decision_cores`). Used on level load/restart, not during
/// ordinary play.
pub fn reset_all_decision_cores(world: &mut EcsWorld) {
    for entity in world.core_entities() {
        world.reset_core(entity);
    }
}

fn apply(pos: Coord, action: Action) -> Coord {
    let d = action.delta();
    Coord::new(pos.x + d.x, pos.y + d.y)
}

/// Run one turn. Returns `false` (and does nothing else) while the player
/// agent's `Action` is still `Nop` — spec.md §4.8 step 1: the game waits
/// for player input before any agent, player or NPC, acts.
#[rogue_kernel_macros::profile]
pub fn process_turn(world: &mut EcsWorld, turn: &mut TurnCounter) -> bool {
    let player = find_player(&world.ecs);
    let Some(player) = player else {
        return false;
    };
    let player_action = *world.ecs.get::<Action>(player).expect("player has Action");
    if player_action == Action::Nop {
        return false;
    }

    let should_think = {
        let mut budget = world
            .ecs
            .get_mut::<ActionBudget>(player)
            .expect("player has ActionBudget");
        budget.tick()
    };
    if should_think {
        tracing::debug!(turn = turn.0, "action budget exhausted; driving decision cores");
        for entity in world.core_entities() {
            world.act_core(entity);
        }
    }

    resolve_actions(world);
    reap_dead(world);
    resolve_pickups(world, player);
    tick_heal_cooldowns(&mut world.ecs);

    turn.tick();
    tracing::trace!(turn = turn.0, "turn resolved");
    true
}

fn find_player(ecs: &World) -> Option<Entity> {
    ecs.iter_entities()
        .find(|e| e.get::<Team>() == Some(&Team::Player))
        .map(|e| e.id())
}

/// Phase (a)+(b) of spec.md §4.8 step 3. All reads (`MovePos` occupancy
/// checks, team comparisons) happen against the snapshot taken before any
/// actor's `Position` is touched, so two actors can never swap into one
/// another's cell.
fn resolve_actions(world: &mut EcsWorld) {
    let ecs = &mut world.ecs;
    let grid = &world.grid;

    let agents: Vec<Entity> = ecs
        .iter_entities()
        .filter(|e| e.contains::<Position>() && e.contains::<Action>())
        .map(|e| e.id())
        .collect();

    for &e in &agents {
        let pos = ecs.get::<Position>(e).unwrap().0;
        if let Some(mut mp) = ecs.get_mut::<MovePos>(e) {
            mp.0 = pos;
        }
    }

    for &e in &agents {
        let action = *ecs.get::<Action>(e).unwrap();
        if action == Action::Attack {
            resolve_attack(ecs, e);
            continue;
        }
        if !action.is_move() {
            continue;
        }

        let pos = ecs.get::<Position>(e).unwrap().0;
        let next = apply(pos, action);

        if !grid.is_floor(next) {
            *ecs.get_mut::<Action>(e).unwrap() = Action::Nop;
            continue;
        }

        let blocker = agents.iter().copied().find(|&o| {
            o != e
                && ecs
                    .get::<MovePos>(o)
                    .is_some_and(|mp| mp.0 == next)
        });

        match blocker {
            Some(blocker_e) => {
                let attacker_team = ecs.get::<Team>(e).copied();
                let blocker_team = ecs.get::<Team>(blocker_e).copied();
                if attacker_team.is_some() && attacker_team != blocker_team {
                    deal_damage(ecs, e, blocker_e);
                }
                *ecs.get_mut::<Action>(e).unwrap() = Action::Nop;
            }
            None => {
                if let Some(mut mp) = ecs.get_mut::<MovePos>(e) {
                    mp.0 = next;
                }
            }
        }
    }

    for &e in &agents {
        let next = ecs.get::<MovePos>(e).map(|mp| mp.0);
        if let Some(next) = next {
            if let Some(mut pos) = ecs.get_mut::<Position>(e) {
                pos.0 = next;
            }
        }
        *ecs.get_mut::<Action>(e).unwrap() = Action::Nop;
    }
}

/// An explicit `Attack` targets whichever enemy-team actor occupies a
/// 4-adjacent cell, in `Coord::neighbours()` order. §4.8's literal
/// algorithm only describes damage-on-blocked-move; this is the
/// resolution rule for the `Attack` variant itself, since a fixed
/// six-variant `Action` enum with no stored direction still needs one.
fn resolve_attack(ecs: &mut World, attacker: Entity) {
    let Some(pos) = ecs.get::<Position>(attacker).map(|p| p.0) else {
        *ecs.get_mut::<Action>(attacker).unwrap() = Action::Nop;
        return;
    };
    let attacker_team = ecs.get::<Team>(attacker).copied();

    let mut target = None;
    for n in pos.neighbours() {
        for entity_ref in ecs.iter_entities() {
            if entity_ref.id() == attacker {
                continue;
            }
            let Some(other_pos) = entity_ref.get::<Position>() else {
                continue;
            };
            if other_pos.0 != n {
                continue;
            }
            if entity_ref.get::<Team>().copied() == attacker_team {
                continue;
            }
            target = Some(entity_ref.id());
            break;
        }
        if target.is_some() {
            break;
        }
    }

    if let Some(target) = target {
        deal_damage(ecs, attacker, target);
    }
    *ecs.get_mut::<Action>(attacker).unwrap() = Action::Nop;
}

fn deal_damage(ecs: &mut World, attacker: Entity, target: Entity) {
    let damage = ecs.get::<MeleeDamage>(attacker).map_or(0.0, |d| d.0);
    if let Some(mut hp) = ecs.get_mut::<HitPoints>(target) {
        hp.0 -= damage;
    }
}

fn reap_dead(world: &mut EcsWorld) {
    let dead: Vec<Entity> = world
        .ecs
        .iter_entities()
        .filter(|e| e.get::<HitPoints>().is_some_and(|hp| hp.is_dead()))
        .map(|e| e.id())
        .collect();
    if !dead.is_empty() {
        tracing::debug!(count = dead.len(), "reaping dead agents");
    }
    for entity in dead {
        world.ecs.despawn(entity);
        world.remove_agent_state(entity);
    }
}

/// Heal-pickups add to hp and despawn; power-ups add to melee damage and
/// despawn, both only for the player's own cell (spec.md §4.8 step 5).
fn resolve_pickups(world: &mut EcsWorld, player: Entity) {
    let ecs = &mut world.ecs;
    let Some(pos) = ecs.get::<Position>(player).map(|p| p.0) else {
        return;
    };

    let heals: Vec<(Entity, f32)> = ecs
        .iter_entities()
        .filter(|e| e.get::<Position>().is_some_and(|p| p.0 == pos))
        .filter_map(|e| e.get::<HealPickup>().map(|h| (e.id(), h.amount)))
        .collect();
    for (pickup, amount) in heals {
        if let Some(mut hp) = ecs.get_mut::<HitPoints>(player) {
            hp.0 += amount;
        }
        tracing::trace!(amount, "heal pickup consumed");
        ecs.despawn(pickup);
    }

    let powerups: Vec<(Entity, f32)> = ecs
        .iter_entities()
        .filter(|e| e.get::<Position>().is_some_and(|p| p.0 == pos))
        .filter_map(|e| e.get::<PowerupPickup>().map(|p| (e.id(), p.damage_bonus)))
        .collect();
    for (pickup, bonus) in powerups {
        if let Some(mut dmg) = ecs.get_mut::<MeleeDamage>(player) {
            dmg.0 += bonus;
        }
        tracing::trace!(bonus, "powerup pickup consumed");
        ecs.despawn(pickup);
    }
}

fn tick_heal_cooldowns(ecs: &mut World) {
    let entities: Vec<Entity> = ecs
        .iter_entities()
        .filter(|e| e.contains::<HealCooldown>())
        .map(|e| e.id())
        .collect();
    for entity in entities {
        if let Some(mut cd) = ecs.get_mut::<HealCooldown>(entity) {
            cd.tick_down();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    fn open_world(w: usize, h: usize) -> EcsWorld {
        EcsWorld::new(Grid::from_wire(w, h, vec![b' '; w * h].as_slice()).unwrap())
    }

    fn spawn_player(world: &mut EcsWorld, pos: Coord) -> Entity {
        world
            .ecs
            .spawn((
                Team::Player,
                Position(pos),
                MovePos(pos),
                Action::Nop,
                HitPoints(100.0),
                MeleeDamage(5.0),
                ActionBudget::new(1),
            ))
            .id()
    }

    #[test]
    fn waits_while_player_action_is_nop() {
        let mut world = open_world(5, 5);
        let mut turn = TurnCounter::default();
        spawn_player(&mut world, Coord::new(0, 0));
        assert!(!process_turn(&mut world, &mut turn));
        assert_eq!(turn.0, 0);
    }

    #[test]
    fn player_move_commits_position() {
        let mut world = open_world(5, 5);
        let mut turn = TurnCounter::default();
        let player = spawn_player(&mut world, Coord::new(2, 2));
        *world.ecs.get_mut::<Action>(player).unwrap() = Action::MoveRight;

        assert!(process_turn(&mut world, &mut turn));
        assert_eq!(world.ecs.get::<Position>(player).unwrap().0, Coord::new(3, 2));
        assert_eq!(*world.ecs.get::<Action>(player).unwrap(), Action::Nop);
        assert_eq!(turn.0, 1);
    }

    #[test]
    fn move_into_enemy_deals_damage_and_is_blocked() {
        let mut world = open_world(5, 5);
        let mut turn = TurnCounter::default();
        let player = spawn_player(&mut world, Coord::new(0, 0));
        *world.ecs.get_mut::<Action>(player).unwrap() = Action::MoveRight;

        let enemy = world
            .ecs
            .spawn((
                Team::Monster,
                Position(Coord::new(1, 0)),
                MovePos(Coord::new(1, 0)),
                Action::Nop,
                HitPoints(10.0),
            ))
            .id();

        process_turn(&mut world, &mut turn);

        assert_eq!(world.ecs.get::<Position>(player).unwrap().0, Coord::new(0, 0));
        assert_eq!(world.ecs.get::<HitPoints>(enemy).unwrap().0, 5.0);
    }

    #[test]
    fn dead_agents_are_reaped() {
        let mut world = open_world(5, 5);
        let mut turn = TurnCounter::default();
        let player = spawn_player(&mut world, Coord::new(0, 0));
        *world.ecs.get_mut::<Action>(player).unwrap() = Action::MoveRight;

        let enemy = world
            .ecs
            .spawn((
                Team::Monster,
                Position(Coord::new(1, 0)),
                MovePos(Coord::new(1, 0)),
                Action::Nop,
                HitPoints(3.0),
            ))
            .id();

        process_turn(&mut world, &mut turn);
        assert!(world.ecs.get_entity(enemy).is_err());
    }

    #[test]
    fn heal_pickup_restores_hp_and_despawns() {
        let mut world = open_world(5, 5);
        let mut turn = TurnCounter::default();
        let player = spawn_player(&mut world, Coord::new(0, 0));
        world.ecs.get_mut::<HitPoints>(player).unwrap().0 = 50.0;
        *world.ecs.get_mut::<Action>(player).unwrap() = Action::MoveRight;

        let pickup = world
            .ecs
            .spawn((Position(Coord::new(1, 0)), HealPickup { amount: 20.0 }))
            .id();

        process_turn(&mut world, &mut turn);

        assert_eq!(world.ecs.get::<HitPoints>(player).unwrap().0, 70.0);
        assert!(world.ecs.get_entity(pickup).is_err());
    }

    #[test]
    fn heal_cooldown_decrements_every_turn() {
        let mut world = open_world(5, 5);
        let mut turn = TurnCounter::default();
        let player = spawn_player(&mut world, Coord::new(0, 0));
        world.ecs.entity_mut(player).insert(HealCooldown(3));
        *world.ecs.get_mut::<Action>(player).unwrap() = Action::MoveRight;

        process_turn(&mut world, &mut turn);
        assert_eq!(world.ecs.get::<HealCooldown>(player).unwrap().0, 2);
    }
}
