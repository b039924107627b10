//! In-process loopback transport used only by the integration tests in
//! `ecsnet-server`/`ecsnet-client` (§6.2.1). Captures outgoing bytes in a queue
//! the test harness drains and re-delivers to the other side by hand — there is
//! no actual socket or thread involved.

use crate::ids::ConnectionId;

use super::{ClientTransport, Transport};

/// Server-side capture: records every `send`/`broadcast` call for the test to
/// inspect or replay.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    sent: Vec<(ConnectionId, Vec<u8>)>,
    broadcasts: Vec<Vec<u8>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain_sent(&mut self) -> Vec<(ConnectionId, Vec<u8>)> {
        std::mem::take(&mut self.sent)
    }

    pub fn drain_broadcasts(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.broadcasts)
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, connection: ConnectionId, bytes: &[u8]) {
        self.sent.push((connection, bytes.to_vec()));
    }

    fn broadcast(&mut self, bytes: &[u8]) {
        self.broadcasts.push(bytes.to_vec());
    }
}

/// Client-side capture of outgoing bytes.
#[derive(Debug, Default)]
pub struct ChannelClientTransport {
    sent: Vec<Vec<u8>>,
}

impl ChannelClientTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }
}

impl ClientTransport for ChannelClientTransport {
    fn send(&mut self, bytes: &[u8]) {
        self.sent.push(bytes.to_vec());
    }
}
