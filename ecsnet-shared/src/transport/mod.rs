//! Transport boundary (§6.2): a plain, synchronous, non-blocking trait. No
//! concrete transport ships in this crate — WebSocket-over-TCP or any other
//! ordered, reliable, message-framed transport is the host's responsibility.

use thiserror::Error;

use crate::ids::ConnectionId;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

/// `TransportError` taxonomy (§7): connection closed unexpectedly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection {0} closed unexpectedly")]
    ConnectionClosed(ConnectionId),
}

/// Multi-connection transport used by `NetServer`. `send`/`broadcast` are
/// non-blocking: they enqueue into the transport's own output buffer.
pub trait Transport {
    fn send(&mut self, connection: ConnectionId, bytes: &[u8]);
    fn broadcast(&mut self, bytes: &[u8]);
}

/// Single-connection transport used by `NetClient`.
pub trait ClientTransport {
    fn send(&mut self, bytes: &[u8]);
}

/// Callbacks a host implements to receive transport lifecycle events. Mirrors
/// §6.2's `Handlers`; the server/client cores invoke these via `on_open`/
/// `on_close`/`on_message` rather than calling back into a polymorphic event bus.
pub trait Handlers {
    fn on_open(&mut self, connection: ConnectionId);
    fn on_close(&mut self, connection: ConnectionId);
    fn on_message(&mut self, connection: ConnectionId, bytes: &[u8]);
}
