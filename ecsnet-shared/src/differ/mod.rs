//! Snapshot differ (§4.1): detects created/destroyed/dirty/attached/detached
//! entities and components each tick by comparing the ECS's front SoA columns
//! against a back-buffer copy, without per-tick allocation of the bookkeeping
//! maps (`flush_snapshots` only reallocates a column when its shape changed).

mod cache;
mod changeset;
mod error;
mod owned;

pub use cache::EncodedEntityCache;
pub use changeset::Changeset;
pub use error::DifferError;
pub use owned::{OwnedDiffer, OwnerComponent};

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::ecs::{ArchetypeId, ArchetypeSnapshot, NetWorld};
use crate::ids::NetId;
use crate::registry::{ComponentKind, ComponentRegistry};
use crate::util::CheckedMap;
use crate::view::ClientDelta;
use crate::wire::{
    decode_message, encode_full_components, encode_message, encode_updated_components,
    encode_wire_ids, set_bit_indices, DeltaBody, Encoder, Message,
};

/// Per-live-entity bookkeeping: the archetype and component set as of the last
/// `flush_snapshots`, used to detect attach/detach via archetype migration
/// (§4.1 "Attach/detach detection").
struct EntityTrack {
    archetype: ArchetypeId,
    components: HashSet<ComponentKind>,
}

pub struct SnapshotDiffer<E: Copy + Eq + Hash + std::fmt::Debug> {
    next_net_id: u32,
    entity_to_net: CheckedMap<E, NetId>,
    net_to_entity: CheckedMap<NetId, E>,
    live: HashMap<NetId, EntityTrack>,
    snapshots: HashMap<ArchetypeId, ArchetypeSnapshot<E>>,
}

impl<E: Copy + Eq + Hash + std::fmt::Debug> Default for SnapshotDiffer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Copy + Eq + Hash + std::fmt::Debug> SnapshotDiffer<E> {
    pub fn new() -> Self {
        Self {
            next_net_id: 1,
            entity_to_net: CheckedMap::new(),
            net_to_entity: CheckedMap::new(),
            live: HashMap::new(),
            snapshots: HashMap::new(),
        }
    }

    pub fn net_id_of(&self, entity: E) -> Option<NetId> {
        self.entity_to_net.get(&entity).copied()
    }

    pub fn entity_of(&self, net_id: NetId) -> Option<E> {
        self.net_to_entity.get(&net_id).copied()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Every NetId currently tracked as live, in arbitrary order. Used by the
    /// server to build a MSG_FULL snapshot (on handshake, reconnect, or
    /// resync) without threading a parallel list through the caller.
    pub fn live_net_ids(&self) -> impl Iterator<Item = NetId> + '_ {
        self.live.keys().copied()
    }

    /// Pure observation: reads the ECS's change log and SoA columns, assigns
    /// NetIds to newly-observed entities, but does not touch the snapshot
    /// back-buffer. At most one call per tick, paired with `flush_snapshots`.
    pub fn compute_changeset<W>(&mut self, world: &mut W) -> Changeset
    where
        W: NetWorld<EntityId = E>,
    {
        let mut changeset = Changeset::empty();
        let changes = world.flush_networked_changes();

        for entity in changes.created {
            let net_id = NetId(self.next_net_id);
            self.next_net_id += 1;
            self.entity_to_net.insert(entity, net_id);
            self.net_to_entity.insert(net_id, entity);

            let components: Vec<_> = world
                .component_kinds(entity)
                .into_iter()
                .map(|kind| (kind, world.field_values(entity, kind)))
                .collect();
            let component_set = components.iter().map(|(k, _)| *k).collect();
            self.live.insert(
                net_id,
                EntityTrack {
                    archetype: world.archetype_id(entity),
                    components: component_set,
                },
            );

            changeset.created_set.insert(net_id);
            changeset.created.push((net_id, components));
        }

        for entity in changes.destroyed {
            if let Some(net_id) = self.entity_to_net.remove(&entity) {
                self.net_to_entity.remove(&net_id);
                self.live.remove(&net_id);
                changeset.destroyed_set.insert(net_id);
                changeset.destroyed.push(net_id);
            }
        }

        let current_archetypes = world.networked_archetypes();

        // Field-level diff: only index-aligned positions participate; everything
        // else is a swap-remove artifact handled by create/destroy/attach/detach.
        for arch in &current_archetypes {
            let Some(snapshot) = self.snapshots.get(&arch.archetype) else {
                continue;
            };
            let min_len = arch.count().min(snapshot.count());
            for i in 0..min_len {
                if arch.entity_ids[i] != snapshot.entity_ids[i] {
                    continue;
                }
                let entity = arch.entity_ids[i];
                let Some(&net_id) = self.entity_to_net.get(&entity) else {
                    continue;
                };
                if changeset.created_set.contains(&net_id) || changeset.destroyed_set.contains(&net_id) {
                    continue;
                }

                let mut per_component = Vec::new();
                for (comp_idx, kind) in arch.components.iter().enumerate() {
                    let field_count = world.registry().field_count(*kind);
                    let mut mask: u16 = 0;
                    for field_idx in 0..field_count {
                        if arch.columns[comp_idx][field_idx][i] != snapshot.columns[comp_idx][field_idx][i] {
                            mask |= 1 << field_idx;
                        }
                    }
                    if mask != 0 {
                        per_component.push((*kind, mask));
                    }
                }
                if !per_component.is_empty() {
                    changeset.dirty.push((net_id, per_component));
                }
            }
        }

        // Attach/detach detection via archetype migration.
        for arch in &current_archetypes {
            for &entity in &arch.entity_ids {
                let Some(&net_id) = self.entity_to_net.get(&entity) else {
                    continue;
                };
                if changeset.created_set.contains(&net_id) || changeset.destroyed_set.contains(&net_id) {
                    continue;
                }
                let track = self.live.get(&net_id).unwrap_or_else(|| {
                    panic!(
                        "{}",
                        DifferError::UntrackedLiveEntity {
                            entity: format!("{entity:?}")
                        }
                    )
                });
                if track.archetype == arch.archetype {
                    continue;
                }

                let new_components: HashSet<ComponentKind> = arch.components.iter().copied().collect();
                let attached: Vec<ComponentKind> =
                    new_components.difference(&track.components).copied().collect();
                let detached: Vec<ComponentKind> =
                    track.components.difference(&new_components).copied().collect();

                if !attached.is_empty() {
                    changeset.attached.push((net_id, attached));
                }
                if !detached.is_empty() {
                    changeset.detached.push((net_id, detached));
                }
            }
        }

        changeset
    }

    /// Copies every tracked front column into the back buffer and records the
    /// per-entity archetype/component set used for next tick's moved-entity
    /// detection. Idempotent when nothing changed in between.
    pub fn flush_snapshots<W>(&mut self, world: &W)
    where
        W: NetWorld<EntityId = E>,
    {
        let current = world.networked_archetypes();

        for (&net_id, track) in self.live.iter_mut() {
            if let Some(&entity) = self.net_to_entity.get(&net_id) {
                track.archetype = world.archetype_id(entity);
                track.components = world.component_kinds(entity).into_iter().collect();
            }
        }

        self.snapshots = current.into_iter().map(|a| (a.archetype, a)).collect();
    }

    /// Convenience: computes a changeset, writes an unfiltered MSG_DELTA, flushes,
    /// returns the buffer (§4.1 broadcast mode).
    pub fn diff_and_encode<W>(&mut self, world: &mut W, encoder: &mut Encoder) -> Vec<u8>
    where
        W: NetWorld<EntityId = E>,
    {
        let changeset = self.compute_changeset(world);
        let registry = world.registry();
        let body = self.full_delta_body(world, &changeset);
        encoder.reset();
        encode_message(encoder, registry, &Message::Delta(body));
        let bytes = encoder.finish();
        self.flush_snapshots(world);
        bytes
    }

    fn full_delta_body<W>(&self, world: &W, changeset: &Changeset) -> DeltaBody
    where
        W: NetWorld<EntityId = E>,
    {
        DeltaBody {
            created: changeset.created.clone(),
            destroyed: changeset.destroyed.clone(),
            updated: changeset
                .dirty
                .iter()
                .map(|(net_id, masks)| (*net_id, self.full_values_for_masks(world, *net_id, masks)))
                .collect(),
            attached: changeset
                .attached
                .iter()
                .map(|(net_id, kinds)| (*net_id, self.full_values_for_kinds(world, *net_id, kinds)))
                .collect(),
            detached: changeset.detached.clone(),
        }
    }

    fn full_values_for_masks<W>(
        &self,
        world: &W,
        net_id: NetId,
        masks: &[(ComponentKind, u16)],
    ) -> Vec<(ComponentKind, u16, Vec<crate::registry::FieldValue>)>
    where
        W: NetWorld<EntityId = E>,
    {
        let entity = self.entity_of(net_id).expect("dirty entity must be live");
        masks
            .iter()
            .map(|(kind, mask)| {
                let values = world.field_values(entity, *kind);
                let selected = set_bit_indices(*mask).map(|i| values[i].clone()).collect();
                (*kind, *mask, selected)
            })
            .collect()
    }

    fn full_values_for_kinds<W>(
        &self,
        world: &W,
        net_id: NetId,
        kinds: &[ComponentKind],
    ) -> Vec<(ComponentKind, Vec<crate::registry::FieldValue>)>
    where
        W: NetWorld<EntityId = E>,
    {
        let entity = self.entity_of(net_id).expect("attached entity must be live");
        kinds
            .iter()
            .map(|kind| (*kind, world.field_values(entity, *kind)))
            .collect()
    }

    /// Pre-serializes per-entity byte fragments for every `created` entity, every
    /// member of `extra_enter_net_ids` (view-enters of pre-existing entities),
    /// every dirty entry, and every attached/detached entry. No output buffer is
    /// produced (§4.1 `preEncodeChangeset`).
    pub fn pre_encode_changeset<W>(
        &self,
        world: &W,
        registry: &ComponentRegistry,
        encoder: &mut Encoder,
        changeset: &Changeset,
        extra_enter_net_ids: &HashSet<NetId>,
    ) -> EncodedEntityCache
    where
        W: NetWorld<EntityId = E>,
    {
        let mut cache = EncodedEntityCache::new();

        for (net_id, components) in &changeset.created {
            encoder.reset();
            encode_full_components(encoder, registry, components);
            cache.enter.insert(*net_id, encoder.finish());
        }

        for &net_id in extra_enter_net_ids {
            if changeset.created_set.contains(&net_id) {
                continue;
            }
            let Some(entity) = self.entity_of(net_id) else {
                continue;
            };
            let components: Vec<_> = world
                .component_kinds(entity)
                .into_iter()
                .map(|kind| (kind, world.field_values(entity, kind)))
                .collect();
            encoder.reset();
            encode_full_components(encoder, registry, &components);
            cache.enter.insert(net_id, encoder.finish());
        }

        for (net_id, masks) in &changeset.dirty {
            let components = self.full_values_for_masks(world, *net_id, masks);
            encoder.reset();
            encode_updated_components(encoder, registry, &components);
            cache.update.insert(*net_id, encoder.finish());
        }

        for (net_id, kinds) in &changeset.attached {
            let components = self.full_values_for_kinds(world, *net_id, kinds);
            encoder.reset();
            encode_full_components(encoder, registry, &components);
            cache.attach.insert(*net_id, encoder.finish());
        }

        for (net_id, kinds) in &changeset.detached {
            encoder.reset();
            encode_wire_ids(encoder, kinds);
            cache.detach.insert(*net_id, encoder.finish());
        }

        cache
    }

    /// Produces a MSG_DELTA buffer for one client by copying the pre-encoded
    /// slices referenced by its `ClientDelta` (§4.1 `composeFromCache`). Clients
    /// with an identical `ClientDelta` (after sorting) get byte-identical output.
    pub fn compose_from_cache(&self, encoder: &mut Encoder, cache: &EncodedEntityCache, delta: &ClientDelta) -> Vec<u8> {
        encoder.reset();
        encoder.write_u8(crate::wire::MSG_DELTA);

        encoder.write_u16(delta.enters.len() as u16);
        for net_id in &delta.enters {
            encoder.write_varint(net_id.value() as u64);
            encoder.write_bytes(cache.enter.get(net_id).expect("enter must be pre-encoded"));
        }

        encoder.write_u16(delta.leaves.len() as u16);
        for net_id in &delta.leaves {
            encoder.write_varint(net_id.value() as u64);
        }

        encoder.write_u16(delta.updates.len() as u16);
        for net_id in &delta.updates {
            encoder.write_varint(net_id.value() as u64);
            encoder.write_bytes(cache.update.get(net_id).expect("update must be pre-encoded"));
        }

        encoder.write_u16(delta.attached.len() as u16);
        for (net_id, _) in &delta.attached {
            encoder.write_varint(net_id.value() as u64);
            encoder.write_bytes(cache.attach.get(net_id).expect("attach must be pre-encoded"));
        }

        encoder.write_u16(delta.detached.len() as u16);
        for (net_id, _) in &delta.detached {
            encoder.write_varint(net_id.value() as u64);
            encoder.write_bytes(cache.detach.get(net_id).expect("detach must be pre-encoded"));
        }

        encoder.finish()
    }

    /// Decodes a previously-encoded MSG_DELTA/MSG_FULL buffer (round-trip tests,
    /// also used by `NetClient` for the client-owned diff's shared machinery).
    pub fn decode(bytes: &[u8], registry: &ComponentRegistry) -> Result<Message, crate::wire::CodecError> {
        decode_message(bytes, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::testkit::TestWorld;
    use crate::registry::{FieldSchema, FieldValue, ScalarType};

    fn registry() -> ComponentRegistry {
        ComponentRegistry::builder()
            .register(
                "Position",
                false,
                vec![
                    FieldSchema::new("x", ScalarType::F32),
                    FieldSchema::new("y", ScalarType::F32),
                ],
            )
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn delta_minimality_when_nothing_changed() {
        let reg = registry();
        let pos = reg.kind_by_wire_id(0).unwrap();
        let mut world = TestWorld::new(reg);
        let e = world.spawn();
        world.insert_component(e, pos, vec![FieldValue::F32(1.0), FieldValue::F32(2.0)]);
        world.mark_networked(e);

        let mut differ = SnapshotDiffer::new();
        let first = differ.compute_changeset(&mut world);
        assert_eq!(first.created.len(), 1);
        differ.flush_snapshots(&world);

        let second = differ.compute_changeset(&mut world);
        assert!(second.is_empty());
    }

    #[test]
    fn net_id_assignment_is_stable_and_never_reused() {
        let reg = registry();
        let pos = reg.kind_by_wire_id(0).unwrap();
        let mut world = TestWorld::new(reg);

        let temp = world.spawn();
        world.insert_component(temp, pos, vec![FieldValue::F32(0.0), FieldValue::F32(0.0)]);
        // temp never gets Networked, then is destroyed outright.
        world.destroy_entity(temp);

        let real = world.spawn();
        world.insert_component(real, pos, vec![FieldValue::F32(1.0), FieldValue::F32(1.0)]);
        world.mark_networked(real);

        let mut differ = SnapshotDiffer::new();
        let changeset = differ.compute_changeset(&mut world);
        assert_eq!(changeset.created[0].0, NetId(1));
    }

    #[test]
    fn field_diff_sets_only_the_changed_bit() {
        let reg = registry();
        let pos = reg.kind_by_wire_id(0).unwrap();
        let mut world = TestWorld::new(reg);
        let e = world.spawn();
        world.insert_component(e, pos, vec![FieldValue::F32(1.5), FieldValue::F32(2.5)]);
        world.mark_networked(e);

        let mut differ = SnapshotDiffer::new();
        differ.compute_changeset(&mut world);
        differ.flush_snapshots(&world);

        world.set_field(e, pos, 0, FieldValue::F32(42.5));
        let changeset = differ.compute_changeset(&mut world);
        assert_eq!(changeset.dirty.len(), 1);
        let (net_id, masks) = &changeset.dirty[0];
        assert_eq!(*net_id, NetId(1));
        assert_eq!(masks, &vec![(pos, 0b01)]);
    }
}
