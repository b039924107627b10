//! Client-owned component diff (§4.5 "Client-owned diff algorithm"). The same
//! index-aligned field compare as `SnapshotDiffer::compute_changeset`, but
//! scoped to one client: only `clientOwned` components, and only entities
//! whose ownership field currently equals that client's id. Shared between
//! `ecsnet-server` (the `OwnerComponent` config type used for the inbound
//! ownership check) and `ecsnet-client` (the actual per-tick diff).

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::ecs::NetWorld;
use crate::ids::{ClientId, NetId};
use crate::registry::{ComponentKind, FieldValue};
use crate::wire::{ClientDeltaBody, FullComponents, UpdatedComponents};

/// Links a `clientOwned` component's ownership field to the logical client it
/// authenticates against (§4.4 "Ownership check", §4.5 "ownedEntities").
#[derive(Debug, Clone, Copy)]
pub struct OwnerComponent {
    pub component: ComponentKind,
    pub client_id_field: usize,
}

impl OwnerComponent {
    /// Whether `entity` is currently owned by `client_id`, i.e. it carries
    /// `component` and the field at `client_id_field` equals the client's id.
    pub fn owns<E, W>(&self, world: &W, entity: E, client_id: ClientId) -> bool
    where
        W: NetWorld<EntityId = E>,
    {
        if !world.has_component(entity, self.component) {
            return false;
        }
        matches!(
            world.field_values(entity, self.component).get(self.client_id_field),
            Some(FieldValue::U16(id)) if *id == client_id.value()
        )
    }
}

/// Per-entity bookkeeping for the owned-component diff: the last tick's
/// `clientOwned` field values, keyed by component.
#[derive(Default)]
struct OwnedTrack {
    components: HashMap<ComponentKind, Vec<FieldValue>>,
}

/// Diffs every `clientOwned` component of every entity this client currently
/// owns against the values recorded on the previous call. Entities that are
/// no longer owned (ownership transferred, or the entity no longer exists in
/// `net_to_entity`) are dropped from tracking so a later hand-back of
/// ownership starts from a clean baseline rather than replaying stale diffs.
pub struct OwnedDiffer {
    tracked: HashMap<NetId, OwnedTrack>,
}

impl Default for OwnedDiffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnedDiffer {
    pub fn new() -> Self {
        Self {
            tracked: HashMap::new(),
        }
    }

    pub fn diff<E, W>(
        &mut self,
        world: &W,
        net_to_entity: &HashMap<NetId, E>,
        owner: &OwnerComponent,
        client_id: ClientId,
    ) -> ClientDeltaBody
    where
        E: Copy + Eq + Hash,
        W: NetWorld<EntityId = E>,
    {
        let registry = world.registry();
        let mut body = ClientDeltaBody {
            updated: Vec::new(),
            attached: Vec::new(),
            detached: Vec::new(),
        };
        let mut still_owned: HashSet<NetId> = HashSet::new();

        let mut owned_ids: Vec<&NetId> = net_to_entity.keys().collect();
        owned_ids.sort_by_key(|n| n.value());

        for &net_id in owned_ids {
            let entity = net_to_entity[&net_id];
            if !owner.owns(world, entity, client_id) {
                continue;
            }
            still_owned.insert(net_id);

            let mut current: Vec<(ComponentKind, Vec<FieldValue>)> = world
                .component_kinds(entity)
                .into_iter()
                .filter(|kind| registry.is_client_owned(*kind))
                .map(|kind| (kind, world.field_values(entity, kind)))
                .collect();
            current.sort_by_key(|(kind, _)| kind.wire_id());

            let track = self.tracked.entry(net_id).or_default();

            let mut updated: UpdatedComponents = Vec::new();
            let mut attached: FullComponents = Vec::new();
            for (kind, values) in &current {
                match track.components.get(kind) {
                    None => attached.push((*kind, values.clone())),
                    Some(previous) => {
                        let mut mask: u16 = 0;
                        let mut changed = Vec::new();
                        for (field_index, (new, old)) in values.iter().zip(previous.iter()).enumerate() {
                            if new != old {
                                mask |= 1 << field_index;
                                changed.push(new.clone());
                            }
                        }
                        if mask != 0 {
                            updated.push((*kind, mask, changed));
                        }
                    }
                }
            }

            let mut detached: Vec<ComponentKind> = track
                .components
                .keys()
                .filter(|kind| !current.iter().any(|(k, _)| k == *kind))
                .copied()
                .collect();
            detached.sort_by_key(|k| k.wire_id());

            if !updated.is_empty() {
                body.updated.push((net_id, updated));
            }
            if !attached.is_empty() {
                body.attached.push((net_id, attached));
            }
            if !detached.is_empty() {
                body.detached.push((net_id, detached));
            }

            track.components = current.into_iter().collect();
        }

        self.tracked.retain(|net_id, _| still_owned.contains(net_id));
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::testkit::TestWorld;
    use crate::registry::{ComponentRegistry, FieldSchema, ScalarType};

    fn registry() -> ComponentRegistry {
        ComponentRegistry::builder()
            .register(
                "Input",
                true,
                vec![
                    FieldSchema::new("client_id", ScalarType::U16),
                    FieldSchema::new("dx", ScalarType::F32),
                ],
            )
            .unwrap()
            .register("Position", false, vec![FieldSchema::new("x", ScalarType::F32)])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn diffs_only_owned_client_owned_components() {
        let reg = registry();
        let input = reg.kind_by_wire_id(0).unwrap();
        let pos = reg.kind_by_wire_id(1).unwrap();
        let mut world = TestWorld::new(reg);
        let e = world.spawn();
        world.insert_component(e, input, vec![FieldValue::U16(7), FieldValue::F32(0.0)]);
        world.insert_component(e, pos, vec![FieldValue::F32(0.0)]);
        world.mark_networked(e);

        let owner = OwnerComponent {
            component: input,
            client_id_field: 0,
        };
        let mut net_to_entity = HashMap::new();
        net_to_entity.insert(NetId(1), e);

        let mut differ = OwnedDiffer::new();
        let first = differ.diff(&world, &net_to_entity, &owner, ClientId(7));
        assert_eq!(first.attached.len(), 1);
        assert_eq!(first.attached[0].0, NetId(1));
        assert_eq!(first.attached[0].1, vec![(input, vec![FieldValue::U16(7), FieldValue::F32(0.0)])]);

        world.set_field(e, input, 1, FieldValue::F32(1.0));
        world.set_field(e, pos, 0, FieldValue::F32(99.0));
        let second = differ.diff(&world, &net_to_entity, &owner, ClientId(7));
        assert_eq!(second.updated, vec![(NetId(1), vec![(input, 0b10, vec![FieldValue::F32(1.0)])])]);
    }

    #[test]
    fn entities_owned_by_another_client_are_skipped() {
        let reg = registry();
        let input = reg.kind_by_wire_id(0).unwrap();
        let mut world = TestWorld::new(reg);
        let e = world.spawn();
        world.insert_component(e, input, vec![FieldValue::U16(3), FieldValue::F32(0.0)]);
        world.mark_networked(e);

        let owner = OwnerComponent {
            component: input,
            client_id_field: 0,
        };
        let mut net_to_entity = HashMap::new();
        net_to_entity.insert(NetId(1), e);

        let mut differ = OwnedDiffer::new();
        let delta = differ.diff(&world, &net_to_entity, &owner, ClientId(7));
        assert!(delta.is_empty());
    }
}
