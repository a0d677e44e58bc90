//! Entity identity and branded identifiers.
//!
//! Every persistent game object (character, monster, item) is identified by a
//! string id tagged at the type level with the entity type it refers to, so a
//! character identifier cannot be handed to an API expecting a monster
//! identifier. The engine itself never inspects entity contents; domain crates
//! define concrete entity types and the engine stores them type-erased.

use core::any::Any;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// A persistent game object that can live in the execution context's store.
///
/// Entities are mutable value snapshots: mutation is "read current, produce a
/// new value, write back through the store", never in-place aliasing shared
/// between rules.
pub trait Entity: Any + Send + Sync + 'static {
    /// Stable name of this entity kind, unique within the application.
    ///
    /// The kind participates in store keys and in [`EntityRef`] values, so
    /// renaming it invalidates existing references.
    const KIND: &'static str;
}

/// Identifier for an entity, branded with the entity type it refers to.
///
/// The brand is purely compile-time; at runtime an `EntityId<T>` is a string
/// plus the statically known `T::KIND`.
pub struct EntityId<T: Entity> {
    id: String,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityId<T> {
    /// Creates an identifier for an entity of kind `T`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            _kind: PhantomData,
        }
    }

    /// Returns the raw identifier string, without the kind tag.
    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// Returns the kind name this identifier is branded with.
    pub const fn kind(&self) -> &'static str {
        T::KIND
    }

    /// Erases the brand, producing the (kind, id) pair used as a store key
    /// and inside commands, where the referenced entity may be of any kind.
    pub fn to_ref(&self) -> EntityRef {
        EntityRef {
            kind: T::KIND.to_owned(),
            id: self.id.clone(),
        }
    }
}

impl<T: Entity> Clone for EntityId<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _kind: PhantomData,
        }
    }
}

impl<T: Entity> PartialEq for EntityId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: Entity> Eq for EntityId<T> {}

impl<T: Entity> Hash for EntityId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: Entity> fmt::Debug for EntityId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}:{})", T::KIND, self.id)
    }
}

impl<T: Entity> fmt::Display for EntityId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", T::KIND, self.id)
    }
}

impl<T: Entity> Serialize for EntityId<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id)
    }
}

impl<'de, T: Entity> Deserialize<'de> for EntityId<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Type-erased entity reference: the (kind, id) pair.
///
/// Used as the store key and wherever an entity of any kind may be referenced
/// (a command's actor, its target list). Convert back to a branded id with
/// [`EntityRef::typed`], which fails if the kinds do not match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    kind: String,
    id: String,
}

impl EntityRef {
    /// Creates a reference from raw parts. Prefer [`EntityId::to_ref`] where
    /// the kind is statically known.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Returns the kind name of the referenced entity.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the raw identifier string.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true if this reference points at an entity of kind `T`.
    pub fn is<T: Entity>(&self) -> bool {
        self.kind == T::KIND
    }

    /// Re-brands this reference as an identifier of kind `T`.
    ///
    /// Returns `None` if the stored kind does not match `T::KIND`.
    pub fn typed<T: Entity>(&self) -> Option<EntityId<T>> {
        self.is::<T>().then(|| EntityId::new(self.id.clone()))
    }
}

impl<T: Entity> From<&EntityId<T>> for EntityRef {
    fn from(id: &EntityId<T>) -> Self {
        id.to_ref()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Character;

    impl Entity for Character {
        const KIND: &'static str = "character";
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Monster;

    impl Entity for Monster {
        const KIND: &'static str = "monster";
    }

    #[test]
    fn branded_id_displays_kind_and_id() {
        let id = EntityId::<Character>::new("aria");
        assert_eq!(id.to_string(), "character:aria");
        assert_eq!(id.as_str(), "aria");
        assert_eq!(id.kind(), "character");
    }

    #[test]
    fn erase_and_rebrand_round_trips() {
        let id = EntityId::<Character>::new("aria");
        let erased = id.to_ref();
        assert_eq!(erased.kind(), "character");

        let back: EntityId<Character> = erased.typed().expect("kinds match");
        assert_eq!(back, id);
    }

    #[test]
    fn rebranding_to_wrong_kind_fails() {
        let erased = EntityId::<Character>::new("aria").to_ref();
        assert!(erased.typed::<Monster>().is_none());
        assert!(!erased.is::<Monster>());
    }

    #[test]
    fn ids_of_same_kind_compare_by_string() {
        let a = EntityId::<Character>::new("aria");
        let b = EntityId::<Character>::new("aria");
        let c = EntityId::<Character>::new("borin");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn id_serializes_as_bare_string() {
        let id = EntityId::<Monster>::new("gnoll-3");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"gnoll-3\"");

        let back: EntityId<Monster> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }
}
