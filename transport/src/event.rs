//! Events and delivery selectors exchanged with the transport.

use std::net::SocketAddr;

use crate::peer::Peer;

/// Delivery guarantee requested for an outbound send.
///
/// Opaque to the session layer; the transport implements whatever subset
/// it supports and the mode is carried back on receive events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    /// Best-effort, may drop, duplicate, or reorder.
    Unreliable,
    /// Best-effort, but stale packets are dropped instead of delivered late.
    UnreliableSequenced,
    /// Delivered exactly once, order not guaranteed.
    ReliableUnordered,
    /// Delivered exactly once, in send order.
    ReliableOrdered,
}

/// Reason code carried by a peer-disconnected event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The local side requested the disconnect.
    LocalRequest,
    /// The remote side requested the disconnect.
    RemoteRequest,
    /// The remote listener rejected the connection request.
    Rejected,
    /// The transport's timeout policy gave up on the connection.
    Timeout,
    /// The transport was stopped while the connection was live.
    TransportStopped,
}

/// Decision over an inbound connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDecision {
    /// Establish the connection.
    Accept,
    /// Refuse the connection; the requester observes a rejection.
    Reject,
}

/// Correlates a [`TransportEvent::ConnectionRequest`] with the
/// [`respond`](crate::Transport::respond) call that answers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    /// Creates a token from a raw value. Intended for transport implementations.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw token value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// An event drained from the transport by [`poll`](crate::Transport::poll).
///
/// Events are delivered in occurrence order per endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A remote endpoint asked to connect. Must be answered via
    /// [`respond`](crate::Transport::respond) with the given token.
    ConnectionRequest {
        /// Token identifying this request in the `respond` call.
        token: RequestToken,
        /// Address of the requesting endpoint.
        remote: SocketAddr,
        /// Raw handshake bytes attached by the requester.
        handshake: Vec<u8>,
    },
    /// A connection finished establishing.
    PeerConnected(Peer),
    /// A connection ended.
    PeerDisconnected {
        /// The peer whose connection ended.
        peer: Peer,
        /// Why the connection ended.
        reason: DisconnectReason,
    },
    /// One packet arrived from a connected peer.
    Receive {
        /// The originating peer.
        peer: Peer,
        /// The packet's bytes.
        payload: Vec<u8>,
        /// The delivery mode the packet was sent with.
        mode: DeliveryMode,
    },
}
