//! Peer handles and connection states.

use std::fmt;
use std::net::SocketAddr;

/// Process-unique identifier backing a [`Peer`] handle.
///
/// Ids are allocated by the transport and never reused within a process
/// run, so a stale handle can never alias a newer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    /// Creates an id from a raw value. Intended for transport implementations.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Opaque handle to one remote connection endpoint.
///
/// The transport owns all live per-peer state; sessions and applications
/// hold copies of the handle only and query state through the transport.
/// Two handles compare equal iff they refer to the same connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Peer {
    id: PeerId,
    addr: SocketAddr,
}

impl Peer {
    /// Creates a peer handle. Intended for transport implementations.
    #[must_use]
    pub const fn new(id: PeerId, addr: SocketAddr) -> Self {
        Self { id, addr }
    }

    /// Returns the peer's transport-unique id.
    #[must_use]
    pub const fn id(&self) -> PeerId {
        self.id
    }

    /// Returns the remote address of the connection.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}@{}", self.id.raw(), self.addr)
    }
}

/// Connection state of a peer, as tracked by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerState {
    /// A connect request is in flight and unanswered.
    Connecting,
    /// The connection is established.
    Connected,
    /// A local disconnect was requested and is not yet acknowledged.
    ShutdownRequested,
    /// The connection is gone. Also reported for unknown handles.
    Disconnected,
}
