//! Stable identifiers carried on the wire, independent of any local storage key.

use std::fmt;

/// Server-assigned, monotonically increasing identifier for a networked entity.
///
/// Never reused within a server's lifetime; see `SnapshotDiffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetId(pub u32);

impl NetId {
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetId({})", self.0)
    }
}

/// Logical client identifier, stable across reconnects within the grace window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(pub u16);

impl ClientId {
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

/// Opaque handle identifying a transport-level connection, supplied by the host.
pub type ConnectionId = u64;
