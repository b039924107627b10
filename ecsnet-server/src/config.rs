//! Server configuration (§6.4): a plain struct with `Default` plus `with_*`
//! builder methods, matching the teacher's preference for a default-then-override
//! config object over a constructor with a dozen positional arguments.

use std::time::Duration;

pub use ecsnet_shared::OwnerComponent;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port; `0` means "caller must set it" before starting a transport.
    pub port: u16,
    /// Grace period after a transport close before a session is retired. `0`
    /// disables reconnect entirely.
    pub reconnect_window: Duration,
    pub owner_component: Option<OwnerComponent>,
    /// Documentation/metrics only; the core does not gate anything on this
    /// (§4.4.1 — "the host controls tick cadence").
    pub tick_rate_hint: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            reconnect_window: Duration::from_millis(30_000),
            owner_component: None,
            tick_rate_hint: None,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_reconnect_window(mut self, window: Duration) -> Self {
        self.reconnect_window = window;
        self
    }

    pub fn with_owner_component(mut self, owner: OwnerComponent) -> Self {
        self.owner_component = Some(owner);
        self
    }

    pub fn with_tick_rate_hint(mut self, hz: u32) -> Self {
        self.tick_rate_hint = Some(hz);
        self
    }

    pub fn reconnect_enabled(&self) -> bool {
        !self.reconnect_window.is_zero()
    }
}
