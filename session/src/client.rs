//! The client role: one outbound connection to a remote server.

use std::net::SocketAddr;

use payload::{PayloadReader, PayloadWriter};
use transport::{DeliveryMode, DisconnectReason, Peer, PeerState, Transport, TransportEvent};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::notify::Notify;
use crate::router::{compose_message, compose_raw, Router};

/// A client session: tracks at most one server peer and multiplexes
/// messages to and from it by one-byte message id.
///
/// Drive it by calling [`tick`](Self::tick) once per frame. Connect and
/// disconnect are fire-and-forget requests; their outcomes arrive as
/// notifications during a later tick.
///
/// # Handler contract
///
/// The wire format carries no per-message length: a handler must consume
/// exactly its payload from the reader it is given. A handler that
/// under-consumes leaves bytes that are interpreted as further
/// id-prefixed messages, desynchronizing the rest of that packet. The
/// same applies to ids with no registered handler, which are dropped
/// after consuming only the id byte.
pub struct ClientSession<T: Transport> {
    transport: T,
    server_peer: Option<Peer>,
    router: Router<()>,
    write_buffer: Vec<u8>,
    connection_started: Notify<()>,
    connected: Notify<()>,
    disconnected: Notify<DisconnectReason>,
}

impl<T: Transport> ClientSession<T> {
    /// Creates a session over `transport` with default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, &SessionConfig::default())
    }

    /// Creates a session over `transport` with the given configuration.
    pub fn with_config(transport: T, config: &SessionConfig) -> Self {
        Self {
            transport,
            server_peer: None,
            router: Router::new(),
            write_buffer: Vec::with_capacity(config.write_buffer_capacity),
            connection_started: Notify::default(),
            connected: Notify::default(),
            disconnected: Notify::default(),
        }
    }

    /// Requests a connection to `addr`, letting `encode` append handshake
    /// bytes for the server's accept decision.
    ///
    /// Starts the transport if it is not already running. On success the
    /// returned peer is tracked in [`Connecting`](PeerState::Connecting)
    /// state and the connection-started notification fires before this
    /// returns; the connected notification follows once the accept
    /// round-trips through a later [`tick`](Self::tick).
    ///
    /// # Errors
    ///
    /// Propagates transport start/connect failures, and returns
    /// [`SessionError::AlreadyConnected`] when the transport hands back
    /// the peer this session already tracks (a duplicate connect race).
    pub fn connect(
        &mut self,
        addr: SocketAddr,
        encode: impl FnOnce(&mut PayloadWriter<'_>),
    ) -> SessionResult<()> {
        if !self.transport.is_running() {
            self.transport.start()?;
        }
        compose_raw(&mut self.write_buffer, encode);
        let peer = self.transport.connect(addr, &self.write_buffer)?;
        if self.server_peer == Some(peer) {
            return Err(SessionError::AlreadyConnected);
        }
        self.server_peer = Some(peer);
        self.connection_started.emit(());
        Ok(())
    }

    /// Requests disconnection from the server, letting `encode` append an
    /// optional reason payload.
    ///
    /// No-op if no peer is tracked; the transport is never handed an
    /// absent target. The peer stays tracked until the disconnected
    /// notification arrives through [`tick`](Self::tick).
    pub fn disconnect(&mut self, encode: impl FnOnce(&mut PayloadWriter<'_>)) {
        let Some(peer) = self.server_peer else {
            return;
        };
        compose_raw(&mut self.write_buffer, encode);
        self.transport.disconnect(peer, &self.write_buffer);
    }

    /// Sends one message to the server: the id byte, then whatever
    /// `encode` appends. No-op if no peer is tracked.
    pub fn send(
        &mut self,
        id: u8,
        mode: DeliveryMode,
        encode: impl FnOnce(&mut PayloadWriter<'_>),
    ) {
        let Some(peer) = self.server_peer else {
            return;
        };
        compose_message(&mut self.write_buffer, id, encode);
        self.transport.send(peer, &self.write_buffer, mode);
    }

    /// Returns the live state of the tracked peer, or
    /// [`Disconnected`](PeerState::Disconnected) if none is tracked.
    pub fn connection_state(&self) -> PeerState {
        self.server_peer
            .map_or(PeerState::Disconnected, |peer| {
                self.transport.peer_state(peer)
            })
    }

    /// Returns `true` once the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == PeerState::Connected
    }

    /// Round-trip time to the server in milliseconds, `None` if no peer
    /// is tracked.
    pub fn ping_ms(&self) -> Option<u32> {
        self.server_peer.and_then(|peer| self.transport.rtt_ms(peer))
    }

    /// Registers `handler` for message `id`, silently replacing any
    /// previous handler for that id. See the handler contract on
    /// [`ClientSession`].
    pub fn register_handler(
        &mut self,
        id: u8,
        mut handler: impl FnMut(&mut PayloadReader<'_>) + 'static,
    ) {
        self.router.register(id, Box::new(move |(), reader| handler(reader)));
    }

    /// Removes the handler for `id`, returning whether one was present.
    /// Packets for unregistered ids are silently dropped.
    pub fn unregister_handler(&mut self, id: u8) -> bool {
        self.router.unregister(id)
    }

    /// Subscribes to the connection-started notification, fired
    /// synchronously from a successful [`connect`](Self::connect).
    pub fn on_connection_started(&mut self, subscriber: impl FnMut() + 'static) {
        let mut subscriber = subscriber;
        self.connection_started.subscribe(move |()| subscriber());
    }

    /// Subscribes to the connected notification.
    pub fn on_connected(&mut self, subscriber: impl FnMut() + 'static) {
        let mut subscriber = subscriber;
        self.connected.subscribe(move |()| subscriber());
    }

    /// Subscribes to the disconnected notification and its reason code.
    /// A remote-initiated disconnect arrives here, never as an error.
    pub fn on_disconnected(&mut self, subscriber: impl FnMut(DisconnectReason) + 'static) {
        self.disconnected.subscribe(subscriber);
    }

    /// Polls the transport and processes every pending event. Call once
    /// per frame, before the simulation stage that consumes messages.
    pub fn tick(&mut self) {
        for event in self.transport.poll() {
            match event {
                TransportEvent::PeerConnected(peer) => {
                    self.server_peer = Some(peer);
                    self.connected.emit(());
                }
                TransportEvent::PeerDisconnected { peer, reason } => {
                    if self.server_peer == Some(peer) {
                        self.server_peer = None;
                        self.transport.stop();
                        self.disconnected.emit(reason);
                    }
                }
                TransportEvent::Receive { payload, .. } => {
                    self.router.dispatch((), &payload);
                }
                // Clients do not listen; nothing to answer.
                TransportEvent::ConnectionRequest { .. } => {}
            }
        }
    }
}
