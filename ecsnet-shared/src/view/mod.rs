//! Per-client visibility state (§4.3): turns a global `Changeset` plus an
//! interest set into the exact enter/leave/update/attach/detach lists one
//! client's mirror should apply this tick.

use std::collections::HashSet;

use crate::differ::Changeset;
use crate::ids::NetId;
use crate::registry::ComponentKind;

/// One client's worth of wire-ready transitions for the current tick. Lists are
/// unsorted in insertion order; callers that need a canonical group key sort a
/// copy rather than mutating these.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientDelta {
    pub enters: Vec<NetId>,
    pub leaves: Vec<NetId>,
    pub updates: Vec<NetId>,
    pub attached: Vec<(NetId, Vec<ComponentKind>)>,
    pub detached: Vec<(NetId, Vec<ComponentKind>)>,
}

impl ClientDelta {
    pub fn is_empty(&self) -> bool {
        self.enters.is_empty()
            && self.leaves.is_empty()
            && self.updates.is_empty()
            && self.attached.is_empty()
            && self.detached.is_empty()
    }

    /// Stable key used to group clients whose deltas are byte-identical once
    /// encoded (§4.4 "Group dedup soundness"); NetId lists are sorted before
    /// joining so two deltas built in different insertion order still collide.
    pub fn canonical_key(&self) -> String {
        if self.is_empty() {
            return "EMPTY".to_string();
        }
        let mut enters = self.enters.clone();
        let mut leaves = self.leaves.clone();
        let mut updates = self.updates.clone();
        enters.sort();
        leaves.sort();
        updates.sort();

        let mut attached: Vec<(NetId, Vec<ComponentKind>)> = self
            .attached
            .iter()
            .map(|(id, kinds)| {
                let mut kinds = kinds.clone();
                kinds.sort();
                (*id, kinds)
            })
            .collect();
        attached.sort_by_key(|(id, _)| *id);
        let mut detached: Vec<(NetId, Vec<ComponentKind>)> = self
            .detached
            .iter()
            .map(|(id, kinds)| {
                let mut kinds = kinds.clone();
                kinds.sort();
                (*id, kinds)
            })
            .collect();
        detached.sort_by_key(|(id, _)| *id);

        let join = |ids: &[NetId]| {
            ids.iter()
                .map(|n| n.value().to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        let join_kinds = |entries: &[(NetId, Vec<ComponentKind>)]| {
            entries
                .iter()
                .map(|(id, kinds)| {
                    format!(
                        "{}:{}",
                        id.value(),
                        kinds.iter().map(|k| k.wire_id().to_string()).collect::<Vec<_>>().join("+")
                    )
                })
                .collect::<Vec<_>>()
                .join(",")
        };

        format!(
            "E={}|L={}|U={}|A={}|D={}",
            join(&enters),
            join(&leaves),
            join(&updates),
            join_kinds(&attached),
            join_kinds(&detached),
        )
    }
}

/// Per-client visibility tracker. Lifetime spans the logical session, including
/// across reconnects (§3 "ClientView lifetime").
#[derive(Debug, Default)]
pub struct ClientView {
    known: HashSet<NetId>,
}

impl ClientView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_entities(&self) -> &HashSet<NetId> {
        &self.known
    }

    /// Seeds `knownEntities` from a just-sent MSG_FULL snapshot, discarding
    /// whatever view state (if any) predates it.
    pub fn init_known(&mut self, net_ids: impl IntoIterator<Item = NetId>) {
        self.known = net_ids.into_iter().collect();
    }

    /// Applies the six transition rules in their specified order. `interest` is
    /// the caller-supplied set of NetIds this client is currently entitled to see.
    pub fn update(&mut self, interest: &HashSet<NetId>, changeset: &Changeset) -> ClientDelta {
        let mut delta = ClientDelta::default();

        // Rule 1: destroyed entities the client knew about leave immediately,
        // regardless of interest.
        for &net_id in &changeset.destroyed {
            if self.known.remove(&net_id) {
                delta.leaves.push(net_id);
            }
        }

        // Rule 2: newly created entities the client is interested in enter with
        // full state.
        for (net_id, _) in &changeset.created {
            if interest.contains(net_id) {
                delta.enters.push(*net_id);
                self.known.insert(*net_id);
            }
        }

        // Rule 3: previously known entities that fell out of interest leave,
        // applied after the scan so rule 4 sees a stable `known`.
        let mut fell_out_of_interest = Vec::new();
        for &net_id in &self.known {
            if !interest.contains(&net_id) && !changeset.destroyed_set.contains(&net_id) {
                fell_out_of_interest.push(net_id);
            }
        }
        for net_id in &fell_out_of_interest {
            delta.leaves.push(*net_id);
        }
        for net_id in fell_out_of_interest {
            self.known.remove(&net_id);
        }

        // Rule 4: pre-existing entities newly in interest enter with full state,
        // fetched by the caller via `extraEnterNetIds` bookkeeping.
        for &net_id in interest {
            if !self.known.contains(&net_id)
                && !changeset.created_set.contains(&net_id)
                && !changeset.destroyed_set.contains(&net_id)
            {
                delta.enters.push(net_id);
                self.known.insert(net_id);
            }
        }

        let entered_this_tick: HashSet<NetId> = delta.enters.iter().copied().collect();

        // Rule 5: dirty components on known, non-created, non-entering entities
        // become updates.
        for (net_id, _) in &changeset.dirty {
            if self.known.contains(net_id)
                && !changeset.created_set.contains(net_id)
                && !entered_this_tick.contains(net_id)
            {
                delta.updates.push(*net_id);
            }
        }

        // Rule 6: attach/detach on known, interested, non-created entities.
        for (net_id, kinds) in &changeset.attached {
            if self.known.contains(net_id) && interest.contains(net_id) && !changeset.created_set.contains(net_id) {
                delta.attached.push((*net_id, kinds.clone()));
            }
        }
        for (net_id, kinds) in &changeset.detached {
            if self.known.contains(net_id) && interest.contains(net_id) && !changeset.created_set.contains(net_id) {
                delta.detached.push((*net_id, kinds.clone()));
            }
        }

        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(vals: &[u32]) -> HashSet<NetId> {
        vals.iter().map(|v| NetId(*v)).collect()
    }

    #[test]
    fn enters_created_entity_when_interested() {
        let mut view = ClientView::new();
        let mut changeset = Changeset::empty();
        changeset.created_set.insert(NetId(1));
        changeset.created.push((NetId(1), vec![]));

        let delta = view.update(&ids(&[1]), &changeset);
        assert_eq!(delta.enters, vec![NetId(1)]);
        assert!(view.known_entities().contains(&NetId(1)));
    }

    #[test]
    fn skips_created_entity_outside_interest() {
        let mut view = ClientView::new();
        let mut changeset = Changeset::empty();
        changeset.created_set.insert(NetId(1));
        changeset.created.push((NetId(1), vec![]));

        let delta = view.update(&ids(&[]), &changeset);
        assert!(delta.enters.is_empty());
        assert!(!view.known_entities().contains(&NetId(1)));
    }

    #[test]
    fn leaves_when_interest_withdrawn() {
        let mut view = ClientView::new();
        view.init_known([NetId(5)]);

        let delta = view.update(&ids(&[]), &Changeset::empty());
        assert_eq!(delta.leaves, vec![NetId(5)]);
        assert!(view.known_entities().is_empty());
    }

    #[test]
    fn reenters_on_renewed_interest_without_create() {
        let mut view = ClientView::new();
        let delta = view.update(&ids(&[7]), &Changeset::empty());
        assert_eq!(delta.enters, vec![NetId(7)]);
    }

    #[test]
    fn destroyed_entity_always_leaves_even_without_interest() {
        let mut view = ClientView::new();
        view.init_known([NetId(3)]);
        let mut changeset = Changeset::empty();
        changeset.destroyed_set.insert(NetId(3));
        changeset.destroyed.push(NetId(3));

        let delta = view.update(&ids(&[3]), &changeset);
        assert_eq!(delta.leaves, vec![NetId(3)]);
        assert!(!view.known_entities().contains(&NetId(3)));
    }

    #[test]
    fn update_skipped_for_entity_entering_this_tick() {
        let mut view = ClientView::new();
        let mut changeset = Changeset::empty();
        changeset.dirty.push((NetId(9), vec![]));

        let delta = view.update(&ids(&[9]), &changeset);
        assert_eq!(delta.enters, vec![NetId(9)]);
        assert!(delta.updates.is_empty());
    }

    #[test]
    fn canonical_key_ignores_insertion_order() {
        let mut a = ClientDelta::default();
        a.enters = vec![NetId(2), NetId(1)];
        let mut b = ClientDelta::default();
        b.enters = vec![NetId(1), NetId(2)];
        assert_eq!(a.canonical_key(), b.canonical_key());
    }
}
