//! Server-side ingress for MSG_CLIENT_DELTA (§4.6). `ValidationReject` is
//! policy, not an `Err`: a rejected entry is dropped silently and processing
//! continues with the rest of the message (§7).

use std::collections::HashMap;

use ecsnet_shared::differ::SnapshotDiffer;
use ecsnet_shared::ecs::NetWorld;
use ecsnet_shared::ids::ClientId;
use ecsnet_shared::registry::{ComponentKind, ComponentRegistry, FieldValue};
use ecsnet_shared::wire::{set_bit_indices, ClientDeltaBody};

use crate::config::OwnerComponent;

pub type DeltaValidator = Box<dyn Fn(&[FieldValue]) -> bool + Send + Sync>;
pub type AttachValidator = Box<dyn Fn(&[FieldValue]) -> bool + Send + Sync>;
pub type DetachValidator = Box<dyn Fn() -> bool + Send + Sync>;

/// Optional ingress predicates for one `clientOwned` component (§6.4). Any
/// predicate left `None` is treated as "always accept".
#[derive(Default)]
pub struct Validators {
    pub delta: Option<DeltaValidator>,
    pub attach: Option<AttachValidator>,
    pub detach: Option<DetachValidator>,
}

#[derive(Default)]
pub struct ValidatorSet {
    by_component: HashMap<ComponentKind, Validators>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ComponentKind, validators: Validators) {
        self.by_component.insert(kind, validators);
    }

    fn get(&self, kind: ComponentKind) -> Option<&Validators> {
        self.by_component.get(&kind)
    }
}

/// Per-entry result, consumed only for logging/metrics — never surfaced as a
/// hard error (§7.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Accepted,
    RejectedOwnership,
    RejectedValidator,
    UnknownEntity,
    NotClientOwned,
}

/// Decodes and applies one MSG_CLIENT_DELTA. Returns one `ApplyOutcome` per
/// entry, in the order processed (updated, then attached, then detached, per
/// §4.6's listing order).
pub fn apply_client_delta<E, W>(
    world: &mut W,
    differ: &SnapshotDiffer<E>,
    registry: &ComponentRegistry,
    owner_component: Option<&OwnerComponent>,
    validators: &ValidatorSet,
    sender: ClientId,
    body: &ClientDeltaBody,
) -> Vec<ApplyOutcome>
where
    E: Copy + Eq + std::hash::Hash + std::fmt::Debug,
    W: NetWorld<EntityId = E>,
{
    let mut outcomes = Vec::new();

    for (net_id, components) in &body.updated {
        let Some(entity) = differ.entity_of(*net_id) else {
            outcomes.push(ApplyOutcome::UnknownEntity);
            continue;
        };
        for (kind, mask, values) in components {
            if !registry.is_client_owned(*kind) {
                outcomes.push(ApplyOutcome::NotClientOwned);
                continue;
            }
            if let Some(owner) = owner_component {
                if !owner.owns(world, entity, sender) {
                    outcomes.push(ApplyOutcome::RejectedOwnership);
                    continue;
                }
            }

            let mut merged = world.field_values(entity, *kind);
            for (value, field_index) in values.iter().zip(set_bit_indices(*mask)) {
                merged[field_index] = value.clone();
            }

            if let Some(v) = validators.get(*kind) {
                if let Some(delta_fn) = &v.delta {
                    if !delta_fn(&merged) {
                        outcomes.push(ApplyOutcome::RejectedValidator);
                        continue;
                    }
                }
            }

            for (value, field_index) in values.iter().zip(set_bit_indices(*mask)) {
                world.set_field(entity, *kind, field_index, value.clone());
            }
            outcomes.push(ApplyOutcome::Accepted);
        }
    }

    for (net_id, components) in &body.attached {
        let Some(entity) = differ.entity_of(*net_id) else {
            outcomes.push(ApplyOutcome::UnknownEntity);
            continue;
        };
        for (kind, values) in components {
            if !registry.is_client_owned(*kind) {
                outcomes.push(ApplyOutcome::NotClientOwned);
                continue;
            }
            if let Some(owner) = owner_component {
                if !owner.owns(world, entity, sender) {
                    outcomes.push(ApplyOutcome::RejectedOwnership);
                    continue;
                }
            }
            if let Some(v) = validators.get(*kind) {
                if let Some(attach_fn) = &v.attach {
                    if !attach_fn(values) {
                        outcomes.push(ApplyOutcome::RejectedValidator);
                        continue;
                    }
                }
            }
            world.add_component(entity, *kind, values.clone());
            outcomes.push(ApplyOutcome::Accepted);
        }
    }

    for (net_id, kinds) in &body.detached {
        let Some(entity) = differ.entity_of(*net_id) else {
            outcomes.push(ApplyOutcome::UnknownEntity);
            continue;
        };
        for kind in kinds {
            if !registry.is_client_owned(*kind) {
                outcomes.push(ApplyOutcome::NotClientOwned);
                continue;
            }
            if let Some(owner) = owner_component {
                if !owner.owns(world, entity, sender) {
                    outcomes.push(ApplyOutcome::RejectedOwnership);
                    continue;
                }
            }
            if let Some(v) = validators.get(*kind) {
                if let Some(detach_fn) = &v.detach {
                    if !detach_fn() {
                        outcomes.push(ApplyOutcome::RejectedValidator);
                        continue;
                    }
                }
            }
            world.remove_component(entity, *kind);
            outcomes.push(ApplyOutcome::Accepted);
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecsnet_shared::ecs::testkit::TestWorld;
    use ecsnet_shared::ids::NetId;
    use ecsnet_shared::registry::{FieldSchema, ScalarType};

    fn registry() -> ComponentRegistry {
        ComponentRegistry::builder()
            .register("Owner", false, vec![FieldSchema::new("client_id", ScalarType::U16)])
            .unwrap()
            .register("Input", true, vec![FieldSchema::new("dx", ScalarType::F32)])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn ownership_mismatch_is_rejected() {
        let reg = registry();
        let owner_kind = reg.kind_by_wire_id(0).unwrap();
        let input_kind = reg.kind_by_wire_id(1).unwrap();
        let mut world = TestWorld::new(reg.clone());
        let entity = world.spawn();
        world.insert_component(entity, owner_kind, vec![FieldValue::U16(7)]);
        world.insert_component(entity, input_kind, vec![FieldValue::F32(0.0)]);
        world.mark_networked(entity);

        let mut differ: SnapshotDiffer<_> = SnapshotDiffer::new();
        differ.compute_changeset(&mut world);

        let owner = OwnerComponent {
            component: owner_kind,
            client_id_field: 0,
        };
        let body = ClientDeltaBody {
            updated: vec![(NetId(1), vec![(input_kind, 0b1, vec![FieldValue::F32(9.0)])])],
            attached: vec![],
            detached: vec![],
        };
        let outcomes = apply_client_delta(
            &mut world,
            &differ,
            &reg,
            Some(&owner),
            &ValidatorSet::new(),
            ClientId(99),
            &body,
        );
        assert_eq!(outcomes, vec![ApplyOutcome::RejectedOwnership]);

        let outcomes = apply_client_delta(
            &mut world,
            &differ,
            &reg,
            Some(&owner),
            &ValidatorSet::new(),
            ClientId(7),
            &body,
        );
        assert_eq!(outcomes, vec![ApplyOutcome::Accepted]);
        assert_eq!(world.field_values(entity, input_kind)[0], FieldValue::F32(9.0));
    }

    #[test]
    fn non_client_owned_component_is_rejected() {
        let reg = registry();
        let owner_kind = reg.kind_by_wire_id(0).unwrap();
        let mut world = TestWorld::new(reg.clone());
        let entity = world.spawn();
        world.insert_component(entity, owner_kind, vec![FieldValue::U16(1)]);
        world.mark_networked(entity);

        let mut differ: SnapshotDiffer<_> = SnapshotDiffer::new();
        differ.compute_changeset(&mut world);

        let body = ClientDeltaBody {
            updated: vec![(NetId(1), vec![(owner_kind, 0b1, vec![FieldValue::U16(2)])])],
            attached: vec![],
            detached: vec![],
        };
        let outcomes = apply_client_delta(
            &mut world,
            &differ,
            &reg,
            None,
            &ValidatorSet::new(),
            ClientId(1),
            &body,
        );
        assert_eq!(outcomes, vec![ApplyOutcome::NotClientOwned]);
    }
}
