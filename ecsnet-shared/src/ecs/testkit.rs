//! Minimal in-memory reference ECS adapter used by the test suites in this crate,
//! `ecsnet-server` and `ecsnet-client`. Not a production ECS — just a `Vec`/`HashMap`
//! backed harness so the differ/view/server/client logic can be exercised without a
//! real game engine (§6.1.1).

use std::collections::{BTreeMap, HashMap, HashSet};

use super::{ArchetypeId, ArchetypeSnapshot, NetWorld, NetworkedChanges};
use crate::registry::{ComponentKind, ComponentRegistry, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

pub struct TestWorld {
    registry: ComponentRegistry,
    next_entity: u64,
    components: HashMap<EntityId, BTreeMap<ComponentKind, Vec<FieldValue>>>,
    networked: HashSet<EntityId>,
    pending_created: Vec<EntityId>,
    pending_destroyed: Vec<EntityId>,
    first_flush_done: bool,
}

impl TestWorld {
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            next_entity: 0,
            components: HashMap::new(),
            networked: HashSet::new(),
            pending_created: Vec::new(),
            pending_destroyed: Vec::new(),
            first_flush_done: false,
        }
    }

    pub fn spawn(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        self.components.insert(id, BTreeMap::new());
        id
    }

    pub fn insert_component(&mut self, entity: EntityId, kind: ComponentKind, values: Vec<FieldValue>) {
        self.components.entry(entity).or_default().insert(kind, values);
    }

    pub fn mark_networked(&mut self, entity: EntityId) {
        if self.networked.insert(entity) {
            self.pending_created.push(entity);
        }
    }

    pub fn unmark_networked(&mut self, entity: EntityId) {
        if self.networked.remove(&entity) {
            self.pending_destroyed.push(entity);
        }
    }
}

impl NetWorld for TestWorld {
    type EntityId = EntityId;

    fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    fn all_entities(&self) -> Vec<EntityId> {
        self.components.keys().copied().collect()
    }

    fn destroy_entity(&mut self, entity: EntityId) {
        if self.networked.remove(&entity) {
            self.pending_destroyed.push(entity);
        }
        self.components.remove(&entity);
    }

    fn create_networked_entity(&mut self, components: &[(ComponentKind, Vec<FieldValue>)]) -> EntityId {
        let entity = self.spawn();
        for (kind, values) in components {
            self.insert_component(entity, *kind, values.clone());
        }
        self.mark_networked(entity);
        entity
    }

    fn is_networked(&self, entity: EntityId) -> bool {
        self.networked.contains(&entity)
    }

    fn has_component(&self, entity: EntityId, kind: ComponentKind) -> bool {
        self.components
            .get(&entity)
            .map_or(false, |m| m.contains_key(&kind))
    }

    fn component_kinds(&self, entity: EntityId) -> Vec<ComponentKind> {
        self.components
            .get(&entity)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    fn field_values(&self, entity: EntityId, kind: ComponentKind) -> Vec<FieldValue> {
        self.components[&entity][&kind].clone()
    }

    fn set_field(&mut self, entity: EntityId, kind: ComponentKind, field_index: usize, value: FieldValue) {
        self.components.get_mut(&entity).unwrap().get_mut(&kind).unwrap()[field_index] = value;
    }

    fn add_component(&mut self, entity: EntityId, kind: ComponentKind, values: Vec<FieldValue>) {
        self.components.entry(entity).or_default().insert(kind, values);
    }

    fn remove_component(&mut self, entity: EntityId, kind: ComponentKind) {
        if let Some(m) = self.components.get_mut(&entity) {
            m.remove(&kind);
        }
    }

    fn archetype_id(&self, entity: EntityId) -> ArchetypeId {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
        let mut hash = FNV_OFFSET;
        for kind in self.component_kinds(entity) {
            hash ^= kind.wire_id() as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        ArchetypeId(hash)
    }

    fn flush_networked_changes(&mut self) -> NetworkedChanges<EntityId> {
        if !self.first_flush_done {
            self.first_flush_done = true;
            self.pending_created.clear();
            self.pending_destroyed.clear();
            let mut created: Vec<_> = self.networked.iter().copied().collect();
            created.sort();
            return NetworkedChanges {
                created,
                destroyed: Vec::new(),
            };
        }
        let created = std::mem::take(&mut self.pending_created);
        let destroyed = std::mem::take(&mut self.pending_destroyed);
        NetworkedChanges { created, destroyed }
    }

    fn networked_archetypes(&self) -> Vec<ArchetypeSnapshot<EntityId>> {
        let mut groups: HashMap<ArchetypeId, Vec<EntityId>> = HashMap::new();
        for &entity in &self.networked {
            groups.entry(self.archetype_id(entity)).or_default().push(entity);
        }
        let mut out = Vec::with_capacity(groups.len());
        for (archetype, mut entity_ids) in groups {
            entity_ids.sort();
            let components = self.component_kinds(entity_ids[0]);
            let mut columns = Vec::with_capacity(components.len());
            for kind in &components {
                let field_count = self.registry.field_count(*kind);
                let mut comp_columns = Vec::with_capacity(field_count);
                for field_index in 0..field_count {
                    let col: Vec<FieldValue> = entity_ids
                        .iter()
                        .map(|e| self.components[e][kind][field_index].clone())
                        .collect();
                    comp_columns.push(col);
                }
                columns.push(comp_columns);
            }
            out.push(ArchetypeSnapshot {
                archetype,
                entity_ids,
                components,
                columns,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldSchema, ScalarType};

    #[test]
    fn baseline_injection_on_first_flush() {
        let registry = ComponentRegistry::builder()
            .register("Position", false, vec![FieldSchema::new("x", ScalarType::F32)])
            .unwrap()
            .build()
            .unwrap();
        let pos = registry.kind_by_wire_id(0).unwrap();
        let mut world = TestWorld::new(registry);
        let e = world.spawn();
        world.insert_component(e, pos, vec![FieldValue::F32(1.0)]);
        world.mark_networked(e);

        let changes = world.flush_networked_changes();
        assert_eq!(changes.created, vec![e]);
        assert!(changes.destroyed.is_empty());

        // second flush with no changes yields nothing
        let changes = world.flush_networked_changes();
        assert!(changes.created.is_empty());
        assert!(changes.destroyed.is_empty());
    }
}
