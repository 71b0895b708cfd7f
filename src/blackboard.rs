//! Typed, name-indexed per-agent scratch memory (spec.md §3, §4.7),
//! grounded on `w1/aiLibrary.h`'s `reg_entity_blackboard_var` and the
//! `Blackboard::get`/`set` pair it wraps.
//!
//! Registration maps a `&str` name to a slot id; the id is typed at
//! registration and every later access must agree. A type mismatch is a
//! programmer error (spec.md §7 kind 4) — it panics rather than returning
//! `Result`, the same way an out-of-range FSM transition panics, because
//! no well-formed behavior tree or FSM ever issues a mismatched access.

use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

struct Slot {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any>,
}

#[derive(Default)]
pub struct Blackboard {
    names: FxHashMap<String, SlotId>,
    slots: Vec<Slot>,
}

impl fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blackboard")
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` for a value of type `T`, returning its slot id.
    /// Idempotent: re-registering the same (name, T) returns the existing
    /// id. Re-registering the same name at a different type is a
    /// programmer error.
    pub fn register<T: Default + 'static>(&mut self, name: &str) -> SlotId {
        if let Some(&id) = self.names.get(name) {
            let slot = &self.slots[id.0];
            assert_eq!(
                slot.type_id,
                TypeId::of::<T>(),
                "blackboard slot {:?} re-registered at type {} (was {})",
                name,
                std::any::type_name::<T>(),
                slot.type_name,
            );
            return id;
        }
        let id = SlotId(self.slots.len());
        self.slots.push(Slot {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(T::default()),
        });
        self.names.insert(name.to_string(), id);
        id
    }

    pub fn slot(&self, name: &str) -> Option<SlotId> {
        self.names.get(name).copied()
    }

    pub fn get<T: 'static>(&self, slot: SlotId) -> &T {
        let s = &self.slots[slot.0];
        s.value.downcast_ref::<T>().unwrap_or_else(|| {
            panic!(
                "blackboard type mismatch on slot {}: stored {}, requested {}",
                slot.0,
                s.type_name,
                std::any::type_name::<T>()
            )
        })
    }

    pub fn set<T: 'static>(&mut self, slot: SlotId, value: T) {
        let s = &mut self.slots[slot.0];
        assert_eq!(
            s.type_id,
            TypeId::of::<T>(),
            "blackboard type mismatch on slot {}: stored {}, assigned {}",
            slot.0,
            s.type_name,
            std::any::type_name::<T>()
        );
        s.value = Box::new(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_per_name_and_type() {
        let mut bb = Blackboard::new();
        let a = bb.register::<u32>("target");
        let b = bb.register::<u32>("target");
        assert_eq!(a, b);
    }

    #[test]
    fn get_set_round_trip() {
        let mut bb = Blackboard::new();
        let slot = bb.register::<u32>("enemy_id");
        bb.set(slot, 42u32);
        assert_eq!(*bb.get::<u32>(slot), 42);
    }

    #[test]
    #[should_panic(expected = "type mismatch")]
    fn mismatched_get_panics() {
        let mut bb = Blackboard::new();
        let slot = bb.register::<u32>("enemy_id");
        let _ = bb.get::<f32>(slot);
    }

    #[test]
    #[should_panic(expected = "re-registered")]
    fn re_registering_at_different_type_panics() {
        let mut bb = Blackboard::new();
        bb.register::<u32>("x");
        bb.register::<f32>("x");
    }
}
