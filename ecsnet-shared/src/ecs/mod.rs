//! The narrow ECS capability the core depends on (§6.1). Implementations of a real
//! archetype store adapt to this trait; nothing in this crate or in `ecsnet-server`/
//! `ecsnet-client` depends on any concrete ECS.

use std::hash::Hash;

use crate::registry::{ComponentKind, ComponentRegistry, FieldValue};

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

/// Opaque archetype handle. The differ only ever compares it for equality; it
/// never interprets the bits (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchetypeId(pub u64);

/// Entities that gained or lost the `Networked` tag since the last flush.
pub struct NetworkedChanges<E> {
    pub created: Vec<E>,
    pub destroyed: Vec<E>,
}

/// A columnar view of one archetype's `Networked` entities: an entity-id array
/// plus, for each resident component, one value per field per entity (the SoA
/// columns described in §3/§9, expressed here as owned per-field vectors rather
/// than zero-copy typed slices — see DESIGN.md for the tradeoff).
pub struct ArchetypeSnapshot<E> {
    pub archetype: ArchetypeId,
    pub entity_ids: Vec<E>,
    /// Component kinds resident in this archetype, in registry order.
    pub components: Vec<ComponentKind>,
    /// `columns[component_index][field_index][entity_index]`.
    pub columns: Vec<Vec<Vec<FieldValue>>>,
}

impl<E> ArchetypeSnapshot<E> {
    pub fn count(&self) -> usize {
        self.entity_ids.len()
    }
}

/// The ECS capability `SnapshotDiffer`/`NetServer`/`NetClient` consume (§6.1).
///
/// `EntityId` is the host ECS's own local identifier; the core never allocates or
/// interprets it, only uses it as an opaque, hashable, copyable key.
pub trait NetWorld {
    type EntityId: Copy + Eq + Hash + std::fmt::Debug;

    fn registry(&self) -> &ComponentRegistry;

    fn all_entities(&self) -> Vec<Self::EntityId>;

    fn destroy_entity(&mut self, entity: Self::EntityId);

    /// Creates a new entity carrying exactly `components` and the `Networked`
    /// tag (§6.1 `createEntityWith`). Used by a client mirror to instantiate
    /// entities received via MSG_FULL/MSG_DELTA; a server-side host typically
    /// spawns entities through its own native ECS API instead and only tags
    /// them `Networked` afterward.
    fn create_networked_entity(&mut self, components: &[(ComponentKind, Vec<FieldValue>)]) -> Self::EntityId;

    /// Whether `entity` currently carries the `Networked` tag.
    fn is_networked(&self, entity: Self::EntityId) -> bool;

    fn has_component(&self, entity: Self::EntityId, kind: ComponentKind) -> bool;

    fn component_kinds(&self, entity: Self::EntityId) -> Vec<ComponentKind>;

    fn field_values(&self, entity: Self::EntityId, kind: ComponentKind) -> Vec<FieldValue>;

    fn set_field(&mut self, entity: Self::EntityId, kind: ComponentKind, field_index: usize, value: FieldValue);

    fn add_component(&mut self, entity: Self::EntityId, kind: ComponentKind, values: Vec<FieldValue>);

    fn remove_component(&mut self, entity: Self::EntityId, kind: ComponentKind);

    fn archetype_id(&self, entity: Self::EntityId) -> ArchetypeId;

    /// Entities that acquired/released the `Networked` tag since the last call
    /// (§4.1 "Creation/destruction detection"). The adapter is responsible for
    /// returning every currently-tagged entity as `created` on the very first
    /// call (the differ's baseline injection).
    fn flush_networked_changes(&mut self) -> NetworkedChanges<Self::EntityId>;

    /// Column-oriented view of every archetype that currently holds at least one
    /// `Networked` entity.
    fn networked_archetypes(&self) -> Vec<ArchetypeSnapshot<Self::EntityId>>;
}
