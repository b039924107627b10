use std::collections::HashSet;

use crate::ids::NetId;
use crate::registry::ComponentKind;
use crate::wire::FullComponents;

/// One tick's worth of net-visible mutations (§3 "Changeset"), produced by
/// `SnapshotDiffer::compute_changeset` and consumed by `ClientView::update`.
#[derive(Debug, Clone)]
pub struct Changeset {
    pub created: Vec<(NetId, FullComponents)>,
    pub destroyed: Vec<NetId>,
    /// Per entity, the set of `(component, field bitmask)` pairs that changed.
    pub dirty: Vec<(NetId, Vec<(ComponentKind, u16)>)>,
    pub attached: Vec<(NetId, Vec<ComponentKind>)>,
    pub detached: Vec<(NetId, Vec<ComponentKind>)>,
    pub created_set: HashSet<NetId>,
    pub destroyed_set: HashSet<NetId>,
}

impl Changeset {
    pub fn empty() -> Self {
        Self {
            created: Vec::new(),
            destroyed: Vec::new(),
            dirty: Vec::new(),
            attached: Vec::new(),
            detached: Vec::new(),
            created_set: HashSet::new(),
            destroyed_set: HashSet::new(),
        }
    }

    /// Testable property 4 ("Delta minimality"): true when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.destroyed.is_empty()
            && self.dirty.is_empty()
            && self.attached.is_empty()
            && self.detached.is_empty()
    }
}
