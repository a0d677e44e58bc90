//! Shared execution context: durable entity store plus per-dispatch scratch.
//!
//! The [`ExecutionContext`] is the single piece of shared state a rule chain
//! operates on. It owns two maps with very different lifetimes:
//!
//! - the **entity store**, which persists for the context's lifetime and holds
//!   every game entity keyed by its [`EntityRef`];
//! - the **scratch channel**, a typed key/value area that lives for exactly
//!   one top-level command dispatch and is how rules hand intermediate data to
//!   later rules in the same chain.
//!
//! The context is always an explicit parameter, never ambient state, so tests
//! can construct an isolated context per case.
//!
//! # Mutation discipline
//!
//! Entity mutation is read-copy-write: read the current snapshot, build the
//! new value, write it back with [`ExecutionContext::set_entity`]. Writes
//! replace the stored value wholesale; callers carrying forward prior fields
//! must copy them into the new value themselves. A rule that reads then writes
//! an entity must do both inside its own `apply` call, since no other
//! isolation is provided.

use core::any::Any;
use core::fmt;
use core::marker::PhantomData;
use std::collections::HashMap;

use indexmap::IndexMap;

use crate::entity::{Entity, EntityId, EntityRef};

/// Typed key into the scratch channel.
///
/// Each key pairs a namespaced name with the payload type stored under it, so
/// cross-subsystem collisions and payload-shape drift are caught by the type
/// system rather than discovered at runtime. Keys are declared as constants,
/// one namespace per subsystem:
///
/// ```
/// use verdict_core::ScratchKey;
///
/// const ATTACK_ROLL: ScratchKey<u32> = ScratchKey::new("combat.attack_roll");
/// ```
///
/// The key set for a subsystem is a stable contract between the rules that
/// read and write it; treat renames like any other breaking change.
pub struct ScratchKey<T: 'static> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> ScratchKey<T> {
    /// Declares a key with the given namespaced name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Returns the key's name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: 'static> Clone for ScratchKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for ScratchKey<T> {}

impl<T: 'static> fmt::Debug for ScratchKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScratchKey({})", self.name)
    }
}

/// Durable entity store plus per-dispatch transient scratch area.
#[derive(Default)]
pub struct ExecutionContext {
    /// Insertion-ordered so linear scans stay deterministic across replays.
    entities: IndexMap<EntityRef, Box<dyn Any + Send + Sync>>,
    scratch: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl ExecutionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Entity store
    // ========================================================================

    /// Looks up an entity by exact identifier.
    ///
    /// Returns `None` when no entity is stored under the id; never panics.
    pub fn entity<T: Entity>(&self, id: &EntityId<T>) -> Option<&T> {
        self.entities
            .get(&id.to_ref())
            .and_then(|stored| stored.downcast_ref::<T>())
    }

    /// Upserts an entity, replacing any previous value wholesale.
    pub fn set_entity<T: Entity>(&mut self, id: &EntityId<T>, entity: T) {
        self.entities.insert(id.to_ref(), Box::new(entity));
    }

    /// Removes an entity from the store, returning it if present.
    pub fn remove_entity<T: Entity>(&mut self, id: &EntityId<T>) -> Option<T> {
        self.entities
            .shift_remove(&id.to_ref())
            .and_then(|stored| stored.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// Returns true if an entity is stored under the id.
    pub fn contains_entity<T: Entity>(&self, id: &EntityId<T>) -> bool {
        self.entities.contains_key(&id.to_ref())
    }

    /// Linear scan over every stored entity of kind `T`, in insertion order.
    ///
    /// Membership is meaningful; the ordering is not part of the contract and
    /// callers must not depend on it for correctness.
    pub fn entities_of_type<T: Entity>(&self) -> impl Iterator<Item = (EntityId<T>, &T)> {
        self.entities.iter().filter_map(|(entity_ref, stored)| {
            if entity_ref.kind() != T::KIND {
                return None;
            }
            stored
                .downcast_ref::<T>()
                .map(|entity| (EntityId::new(entity_ref.id().to_owned()), entity))
        })
    }

    /// Total number of stored entities, across all kinds.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // ========================================================================
    // Scratch channel
    // ========================================================================

    /// Reinitializes the scratch area for a new top-level dispatch.
    ///
    /// The entity store is untouched. `Command::execute` calls this before
    /// staging; callers driving `RuleEngine::execute` directly should call it
    /// themselves so scratch from a previous dispatch cannot leak in.
    pub fn begin_dispatch(&mut self) {
        self.scratch.clear();
    }

    /// Reads a scratch value by typed key.
    ///
    /// Returns `None` when the key was never written this dispatch, or when
    /// the stored payload does not match the key's declared type (which means
    /// two keys share a name and the declarations need fixing).
    pub fn scratch<T: Send + Sync + 'static>(&self, key: &ScratchKey<T>) -> Option<&T> {
        self.scratch
            .get(key.name())
            .and_then(|stored| stored.downcast_ref::<T>())
    }

    /// Writes a scratch value under the typed key, replacing any prior value.
    pub fn set_scratch<T: Send + Sync + 'static>(&mut self, key: &ScratchKey<T>, value: T) {
        self.scratch.insert(key.name(), Box::new(value));
    }

    /// Removes and returns a scratch value.
    pub fn take_scratch<T: Send + Sync + 'static>(&mut self, key: &ScratchKey<T>) -> Option<T> {
        let stored = self.scratch.remove(key.name())?;
        match stored.downcast::<T>() {
            Ok(boxed) => Some(*boxed),
            Err(original) => {
                // Payload type mismatch: leave the value where it was.
                self.scratch.insert(key.name(), original);
                None
            }
        }
    }

    /// Returns true if a value is stored under the key this dispatch.
    pub fn has_scratch<T: Send + Sync + 'static>(&self, key: &ScratchKey<T>) -> bool {
        self.scratch(key).is_some()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("entities", &self.entities.len())
            .field("scratch_keys", &self.scratch.len())
            .finish()
    }
}
