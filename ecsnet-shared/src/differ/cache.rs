use std::collections::HashMap;

use crate::ids::NetId;

/// Per-entity, pre-serialized byte fragments, keyed by `NetId` (§4.1
/// `preEncodeChangeset`/`composeFromCache`). Lets many clients that see the same
/// entity change share one encode instead of re-serializing per client.
///
/// Cleared (not dropped/reallocated) between ticks, matching the Encoder's own
/// arena-style reuse (§9).
#[derive(Debug, Default)]
pub struct EncodedEntityCache {
    pub(crate) enter: HashMap<NetId, Vec<u8>>,
    pub(crate) update: HashMap<NetId, Vec<u8>>,
    pub(crate) attach: HashMap<NetId, Vec<u8>>,
    pub(crate) detach: HashMap<NetId, Vec<u8>>,
}

impl EncodedEntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.enter.clear();
        self.update.clear();
        self.attach.clear();
        self.detach.clear();
    }
}
