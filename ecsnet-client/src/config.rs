//! Client configuration (§6.4.1): the same default-then-override shape as
//! `ecsnet-server`'s `ServerConfig`.

pub use ecsnet_shared::OwnerComponent;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Links the ownership field on a `clientOwned` component to the assigned
    /// `ClientId` (§4.5 "ownedEntities"). `None` means no component diffs out
    /// to MSG_CLIENT_DELTA.
    pub owner_component: Option<OwnerComponent>,
    /// Buffered MSG_DELTA count beyond which a burst-resync is triggered.
    /// `0` disables the policy (§4.5 "Burst-resync policy").
    pub burst_threshold: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            owner_component: None,
            burst_threshold: 0,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner_component(mut self, owner: OwnerComponent) -> Self {
        self.owner_component = Some(owner);
        self
    }

    pub fn with_burst_threshold(mut self, threshold: u32) -> Self {
        self.burst_threshold = threshold;
        self
    }

    pub fn burst_resync_enabled(&self) -> bool {
        self.burst_threshold > 0
    }
}
