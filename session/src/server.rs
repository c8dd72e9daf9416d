//! The server role: hosts inbound connections and tracks the roster.

use std::net::SocketAddr;

use payload::{PayloadReader, PayloadWriter};
use transport::{
    ConnectionDecision, DeliveryMode, DisconnectReason, Peer, Transport, TransportEvent,
};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::notify::Notify;
use crate::router::{compose_message, compose_raw, Router};

/// Decides whether to accept an inbound connection, given the remote
/// address and the raw handshake bytes the requester attached.
pub type ConnectionFilter = Box<dyn FnMut(SocketAddr, &[u8]) -> ConnectionDecision>;

/// A server session: accepts inbound connections, tracks the roster of
/// connected peers, and multiplexes messages by one-byte message id.
///
/// Drive it by calling [`tick`](Self::tick) once per frame. The handler
/// contract from [`ClientSession`](crate::ClientSession) applies here
/// too; server handlers additionally receive the originating peer.
pub struct ServerSession<T: Transport> {
    transport: T,
    router: Router<Peer>,
    write_buffer: Vec<u8>,
    peers: Vec<Peer>,
    connection_filter: Option<ConnectionFilter>,
    hosting_started: Notify<()>,
    closed: Notify<()>,
    peer_connected: Notify<Peer>,
    peer_disconnected: Notify<(Peer, DisconnectReason)>,
}

impl<T: Transport> ServerSession<T> {
    /// Creates a session over `transport` with default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, &SessionConfig::default())
    }

    /// Creates a session over `transport` with the given configuration.
    pub fn with_config(transport: T, config: &SessionConfig) -> Self {
        Self {
            transport,
            router: Router::new(),
            write_buffer: Vec::with_capacity(config.write_buffer_capacity),
            peers: Vec::new(),
            connection_filter: None,
            hosting_started: Notify::default(),
            closed: Notify::default(),
            peer_connected: Notify::default(),
            peer_disconnected: Notify::default(),
        }
    }

    /// Starts listening for connections on `port`. On success the
    /// hosting-started notification fires before this returns.
    ///
    /// # Errors
    ///
    /// Propagates transport bind failures.
    pub fn host(&mut self, port: u16) -> SessionResult<()> {
        self.transport.listen(port)?;
        self.hosting_started.emit(());
        Ok(())
    }

    /// Stops hosting: composes an optional farewell payload once,
    /// disconnects every peer with it, stops the transport, clears the
    /// roster, and fires the closed notification.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotRunning`] if the session is not
    /// hosting.
    pub fn close(&mut self, encode: impl FnOnce(&mut PayloadWriter<'_>)) -> SessionResult<()> {
        if !self.transport.is_running() {
            return Err(SessionError::NotRunning);
        }
        compose_raw(&mut self.write_buffer, encode);
        self.transport.disconnect_all(&self.write_buffer);
        self.transport.stop();
        self.peers.clear();
        self.closed.emit(());
        Ok(())
    }

    /// Requests disconnection of one peer with an optional farewell
    /// payload. The roster entry is removed when the disconnected event
    /// arrives through [`tick`](Self::tick), not here.
    pub fn disconnect_peer(&mut self, peer: Peer, encode: impl FnOnce(&mut PayloadWriter<'_>)) {
        compose_raw(&mut self.write_buffer, encode);
        self.transport.disconnect(peer, &self.write_buffer);
    }

    /// Sends one message to one peer.
    pub fn send_to(
        &mut self,
        peer: Peer,
        id: u8,
        mode: DeliveryMode,
        encode: impl FnOnce(&mut PayloadWriter<'_>),
    ) {
        compose_message(&mut self.write_buffer, id, encode);
        self.transport.send(peer, &self.write_buffer, mode);
    }

    /// Sends one message to every connected peer. The buffer is composed
    /// once and reused for every recipient.
    pub fn send_to_all(
        &mut self,
        id: u8,
        mode: DeliveryMode,
        encode: impl FnOnce(&mut PayloadWriter<'_>),
    ) {
        compose_message(&mut self.write_buffer, id, encode);
        self.transport.broadcast(&self.write_buffer, mode);
    }

    /// Sends one message to every roster peer for which `filter` returns
    /// `true`, evaluating it against the roster in its current order (a
    /// snapshot at call time; order is not stable across churn). The
    /// buffer is composed once and reused for every recipient.
    pub fn send_to_filtered(
        &mut self,
        mut filter: impl FnMut(Peer) -> bool,
        id: u8,
        mode: DeliveryMode,
        encode: impl FnOnce(&mut PayloadWriter<'_>),
    ) {
        compose_message(&mut self.write_buffer, id, encode);
        for &peer in &self.peers {
            if filter(peer) {
                self.transport.send(peer, &self.write_buffer, mode);
            }
        }
    }

    /// Installs the accept/reject filter for inbound connection
    /// requests, replacing any previous one. Without a filter every
    /// request is accepted.
    pub fn set_connection_filter(
        &mut self,
        filter: impl FnMut(SocketAddr, &[u8]) -> ConnectionDecision + 'static,
    ) {
        self.connection_filter = Some(Box::new(filter));
    }

    /// Removes the connection filter, reverting to accept-all.
    pub fn clear_connection_filter(&mut self) {
        self.connection_filter = None;
    }

    /// Returns `true` while hosting.
    pub fn is_running(&self) -> bool {
        self.transport.is_running()
    }

    /// Number of peers currently in the roster.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// The roster of connected peers, in arrival order.
    #[must_use]
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Round-trip time to `peer` in milliseconds, `None` for unknown
    /// handles.
    pub fn rtt_ms(&self, peer: Peer) -> Option<u32> {
        self.transport.rtt_ms(peer)
    }

    /// Registers `handler` for message `id`, silently replacing any
    /// previous handler for that id. The handler receives the
    /// originating peer and a reader positioned after the id byte.
    pub fn register_handler(
        &mut self,
        id: u8,
        handler: impl FnMut(Peer, &mut PayloadReader<'_>) + 'static,
    ) {
        let mut handler = handler;
        self.router
            .register(id, Box::new(move |peer, reader| handler(peer, reader)));
    }

    /// Removes the handler for `id`, returning whether one was present.
    pub fn unregister_handler(&mut self, id: u8) -> bool {
        self.router.unregister(id)
    }

    /// Subscribes to the hosting-started notification, fired
    /// synchronously from a successful [`host`](Self::host).
    pub fn on_hosting_started(&mut self, subscriber: impl FnMut() + 'static) {
        let mut subscriber = subscriber;
        self.hosting_started.subscribe(move |()| subscriber());
    }

    /// Subscribes to the closed notification, fired synchronously from a
    /// successful [`close`](Self::close).
    pub fn on_closed(&mut self, subscriber: impl FnMut() + 'static) {
        let mut subscriber = subscriber;
        self.closed.subscribe(move |()| subscriber());
    }

    /// Subscribes to peer-connected notifications.
    pub fn on_peer_connected(&mut self, subscriber: impl FnMut(Peer) + 'static) {
        self.peer_connected.subscribe(subscriber);
    }

    /// Subscribes to peer-disconnected notifications and their reason
    /// codes.
    pub fn on_peer_disconnected(
        &mut self,
        subscriber: impl FnMut(Peer, DisconnectReason) + 'static,
    ) {
        let mut subscriber = subscriber;
        self.peer_disconnected
            .subscribe(move |(peer, reason)| subscriber(peer, reason));
    }

    /// Polls the transport and processes every pending event. Call once
    /// per frame.
    pub fn tick(&mut self) {
        for event in self.transport.poll() {
            match event {
                TransportEvent::ConnectionRequest {
                    token,
                    remote,
                    handshake,
                } => {
                    let decision = match self.connection_filter.as_mut() {
                        Some(filter) => filter(remote, &handshake),
                        None => ConnectionDecision::Accept,
                    };
                    self.transport.respond(token, decision);
                }
                TransportEvent::PeerConnected(peer) => {
                    // The roster holds each peer at most once.
                    if !self.peers.contains(&peer) {
                        self.peers.push(peer);
                        self.peer_connected.emit(peer);
                    }
                }
                TransportEvent::PeerDisconnected { peer, reason } => {
                    let len_before = self.peers.len();
                    self.peers.retain(|entry| *entry != peer);
                    if self.peers.len() < len_before {
                        self.peer_disconnected.emit((peer, reason));
                    }
                }
                TransportEvent::Receive { peer, payload, .. } => {
                    self.router.dispatch(peer, &payload);
                }
            }
        }
    }
}
