//! The transport contract driven by netmux sessions.

use std::net::SocketAddr;

use crate::error::TransportResult;
use crate::event::{ConnectionDecision, DeliveryMode, RequestToken, TransportEvent};
use crate::peer::{Peer, PeerState};

/// One endpoint of a datagram transport, as consumed by the session layer.
///
/// Implementors are responsible for:
/// - Moving packets between endpoints with the requested [`DeliveryMode`].
/// - Tracking per-peer connection state and round-trip time.
/// - Queueing [`TransportEvent`]s for [`poll`](Self::poll).
///
/// Implementors are NOT responsible for any of the following:
/// - Interpreting packet bytes (the session layer's message-id framing
///   is invisible here).
/// - Retrying failed operations.
/// - Thread safety. The whole stack runs on one logical thread and is
///   driven by a periodic poll.
///
/// Setup operations return structured errors the caller must check.
/// Data-plane operations (send, disconnect) are fire-and-forget: an
/// unknown or already-gone peer target is silently dropped, and outcomes
/// are observed through later events.
pub trait Transport {
    /// Starts the endpoint without listening, for outbound connections.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyRunning`](crate::TransportError::AlreadyRunning)
    /// if the endpoint is running.
    fn start(&mut self) -> TransportResult<()>;

    /// Starts the endpoint listening for inbound connections on `port`.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyRunning`](crate::TransportError::AlreadyRunning)
    /// if the endpoint is running, or
    /// [`BindFailed`](crate::TransportError::BindFailed) if the port is
    /// taken.
    fn listen(&mut self, port: u16) -> TransportResult<()>;

    /// Stops the endpoint, dropping every live connection.
    ///
    /// Remote sides observe a
    /// [`TransportStopped`](crate::DisconnectReason::TransportStopped)
    /// disconnect. No-op if not running.
    fn stop(&mut self);

    /// Returns `true` while the endpoint is started or listening.
    fn is_running(&self) -> bool;

    /// Requests a connection to `addr`, attaching `handshake` bytes for
    /// the remote accept decision.
    ///
    /// Returns the new peer handle in [`Connecting`](PeerState::Connecting)
    /// state. Connecting to an address that already has a live peer
    /// returns that peer's existing handle instead of opening a second
    /// connection.
    ///
    /// # Errors
    ///
    /// Returns [`NotRunning`](crate::TransportError::NotRunning) if the
    /// endpoint is stopped, or [`NoRoute`](crate::TransportError::NoRoute)
    /// if nothing is reachable at `addr`.
    fn connect(&mut self, addr: SocketAddr, handshake: &[u8]) -> TransportResult<Peer>;

    /// Requests disconnection of one peer, attaching `farewell` bytes.
    ///
    /// Acknowledged asynchronously: both sides observe a
    /// [`PeerDisconnected`](TransportEvent::PeerDisconnected) event on a
    /// later poll. Unknown peers are silently ignored.
    fn disconnect(&mut self, peer: Peer, farewell: &[u8]);

    /// Requests disconnection of every live peer.
    fn disconnect_all(&mut self, farewell: &[u8]);

    /// Sends one packet to `peer`. Silently dropped if the peer is not
    /// connected.
    fn send(&mut self, peer: Peer, bytes: &[u8], mode: DeliveryMode);

    /// Sends one packet to every connected peer.
    fn broadcast(&mut self, bytes: &[u8], mode: DeliveryMode);

    /// Drains all pending events, in occurrence order.
    fn poll(&mut self) -> Vec<TransportEvent>;

    /// Answers a [`ConnectionRequest`](TransportEvent::ConnectionRequest).
    ///
    /// Unknown or already-answered tokens are silently ignored.
    fn respond(&mut self, token: RequestToken, decision: ConnectionDecision);

    /// Returns the live state of `peer`, or
    /// [`Disconnected`](PeerState::Disconnected) for unknown handles.
    fn peer_state(&self, peer: Peer) -> PeerState;

    /// Returns the measured round-trip time to `peer` in milliseconds,
    /// or `None` for unknown handles.
    fn rtt_ms(&self, peer: Peer) -> Option<u32>;
}
