//! In-process transport over a shared memory hub.
//!
//! [`MemoryNetwork`] models one host: every endpoint created from it can
//! reach every listening endpoint by port. Delivery is lossless and in
//! order regardless of the requested [`DeliveryMode`]; the mode is still
//! carried on receive events so higher layers observe what was requested.
//! Connection state changes become visible to an endpoint as it drains
//! the corresponding events, mirroring how a socket-backed transport
//! surfaces handshake round-trips.
//!
//! Single-threaded by design, like everything above it: the hub lives in
//! an `Rc<RefCell<...>>` and endpoints must stay on one thread.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddr};
use std::rc::Rc;

use crate::error::{TransportError, TransportResult};
use crate::event::{ConnectionDecision, DeliveryMode, DisconnectReason, RequestToken, TransportEvent};
use crate::peer::{Peer, PeerId, PeerState};
use crate::transport::Transport;

/// First port handed out to non-listening endpoints.
const EPHEMERAL_PORT_BASE: u16 = 49152;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EndpointId(u64);

#[derive(Debug)]
struct PeerRecord {
    handle: Peer,
    state: PeerState,
    remote_endpoint: EndpointId,
    /// Peer id on the remote endpoint, `None` until the connection is
    /// established or after the link is severed.
    remote_peer: Option<PeerId>,
}

#[derive(Debug, Default)]
struct Endpoint {
    running: bool,
    addr: Option<SocketAddr>,
    listen_port: Option<u16>,
    queue: VecDeque<TransportEvent>,
    peers: HashMap<PeerId, PeerRecord>,
}

#[derive(Debug)]
struct PendingRequest {
    client_endpoint: EndpointId,
    client_peer: PeerId,
    server_endpoint: EndpointId,
}

#[derive(Debug, Default)]
struct Hub {
    endpoints: HashMap<EndpointId, Endpoint>,
    listeners: HashMap<u16, EndpointId>,
    requests: HashMap<u64, PendingRequest>,
    next_endpoint: u64,
    next_peer: u64,
    next_token: u64,
    next_ephemeral: u16,
    rtt_ms: u32,
}

impl Hub {
    fn endpoint(&mut self, id: EndpointId) -> &mut Endpoint {
        self.endpoints.get_mut(&id).expect("endpoint registered at creation")
    }

    fn push_event(&mut self, target: EndpointId, event: TransportEvent) {
        let endpoint = self.endpoint(target);
        if endpoint.running {
            endpoint.queue.push_back(event);
        }
    }

    fn alloc_peer(&mut self) -> PeerId {
        let id = PeerId::from_raw(self.next_peer);
        self.next_peer += 1;
        id
    }

    fn alloc_ephemeral_addr(&mut self) -> SocketAddr {
        let port = EPHEMERAL_PORT_BASE + self.next_ephemeral;
        self.next_ephemeral += 1;
        SocketAddr::from((Ipv4Addr::LOCALHOST, port))
    }

    /// Severs one direction of a link and queues the disconnect event for
    /// the remote side. The remote record stays until its owner polls.
    fn notify_remote_disconnected(&mut self, record_remote: EndpointId, remote_peer: PeerId) {
        let Some(remote_record) = self.endpoint(record_remote).peers.get_mut(&remote_peer) else {
            return;
        };
        remote_record.state = PeerState::Disconnected;
        remote_record.remote_peer = None;
        let handle = remote_record.handle;
        self.push_event(
            record_remote,
            TransportEvent::PeerDisconnected {
                peer: handle,
                reason: DisconnectReason::RemoteRequest,
            },
        );
    }
}

/// Handle to a shared in-process network of [`MemoryTransport`] endpoints.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    hub: Rc<RefCell<Hub>>,
}

impl MemoryNetwork {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new stopped endpoint on this network.
    #[must_use]
    pub fn endpoint(&self) -> MemoryTransport {
        let mut hub = self.hub.borrow_mut();
        let id = EndpointId(hub.next_endpoint);
        hub.next_endpoint += 1;
        hub.endpoints.insert(id, Endpoint::default());
        MemoryTransport {
            hub: Rc::clone(&self.hub),
            id,
        }
    }

    /// Sets the round-trip time reported for every peer on this network.
    pub fn set_rtt_ms(&self, rtt_ms: u32) {
        self.hub.borrow_mut().rtt_ms = rtt_ms;
    }
}

/// One endpoint of a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryTransport {
    hub: Rc<RefCell<Hub>>,
    id: EndpointId,
}

impl MemoryTransport {
    /// Returns the endpoint's synthetic local address while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.hub.borrow_mut().endpoint(self.id).addr
    }
}

impl Transport for MemoryTransport {
    fn start(&mut self) -> TransportResult<()> {
        let mut hub = self.hub.borrow_mut();
        if hub.endpoint(self.id).running {
            return Err(TransportError::AlreadyRunning);
        }
        let addr = hub.alloc_ephemeral_addr();
        let endpoint = hub.endpoint(self.id);
        endpoint.running = true;
        endpoint.addr = Some(addr);
        Ok(())
    }

    fn listen(&mut self, port: u16) -> TransportResult<()> {
        let mut hub = self.hub.borrow_mut();
        if hub.endpoint(self.id).running {
            return Err(TransportError::AlreadyRunning);
        }
        if hub.listeners.contains_key(&port) {
            return Err(TransportError::BindFailed { port });
        }
        hub.listeners.insert(port, self.id);
        let endpoint = hub.endpoint(self.id);
        endpoint.running = true;
        endpoint.addr = Some(SocketAddr::from((Ipv4Addr::LOCALHOST, port)));
        endpoint.listen_port = Some(port);
        Ok(())
    }

    fn stop(&mut self) {
        let mut hub = self.hub.borrow_mut();
        if !hub.endpoint(self.id).running {
            return;
        }

        // Live links: the remote side observes a transport-stopped drop.
        let links: Vec<(EndpointId, PeerId)> = hub
            .endpoint(self.id)
            .peers
            .values()
            .filter_map(|record| record.remote_peer.map(|rp| (record.remote_endpoint, rp)))
            .collect();
        for (remote_endpoint, remote_peer) in links {
            let Some(remote_record) = hub.endpoint(remote_endpoint).peers.get_mut(&remote_peer)
            else {
                continue;
            };
            remote_record.state = PeerState::Disconnected;
            remote_record.remote_peer = None;
            let handle = remote_record.handle;
            hub.push_event(
                remote_endpoint,
                TransportEvent::PeerDisconnected {
                    peer: handle,
                    reason: DisconnectReason::TransportStopped,
                },
            );
        }

        // Unresolved inbound requests: the requester observes a timeout.
        let token_raws: Vec<u64> = hub
            .requests
            .iter()
            .filter(|(_, request)| {
                request.server_endpoint == self.id || request.client_endpoint == self.id
            })
            .map(|(raw, _)| *raw)
            .collect();
        for raw in token_raws {
            let request = hub.requests.remove(&raw).expect("token collected above");
            if request.server_endpoint != self.id {
                continue;
            }
            let Some(record) = hub
                .endpoint(request.client_endpoint)
                .peers
                .get_mut(&request.client_peer)
            else {
                continue;
            };
            record.state = PeerState::Disconnected;
            let handle = record.handle;
            hub.push_event(
                request.client_endpoint,
                TransportEvent::PeerDisconnected {
                    peer: handle,
                    reason: DisconnectReason::Timeout,
                },
            );
        }

        if let Some(port) = hub.endpoint(self.id).listen_port {
            hub.listeners.remove(&port);
        }
        let endpoint = hub.endpoint(self.id);
        endpoint.running = false;
        endpoint.addr = None;
        endpoint.listen_port = None;
        endpoint.queue.clear();
        endpoint.peers.clear();
    }

    fn is_running(&self) -> bool {
        self.hub.borrow_mut().endpoint(self.id).running
    }

    fn connect(&mut self, addr: SocketAddr, handshake: &[u8]) -> TransportResult<Peer> {
        let mut hub = self.hub.borrow_mut();
        if !hub.endpoint(self.id).running {
            return Err(TransportError::NotRunning);
        }

        // A live peer to the same address is returned as-is instead of
        // opening a second connection.
        if let Some(existing) = hub
            .endpoint(self.id)
            .peers
            .values()
            .find(|record| record.handle.addr() == addr && record.state != PeerState::Disconnected)
        {
            return Ok(existing.handle);
        }

        let Some(server_id) = hub.listeners.get(&addr.port()).copied() else {
            return Err(TransportError::NoRoute { addr });
        };
        if !hub.endpoint(server_id).running {
            return Err(TransportError::NoRoute { addr });
        }

        let local_addr = hub
            .endpoint(self.id)
            .addr
            .expect("running endpoint has an address");
        let peer_id = hub.alloc_peer();
        let handle = Peer::new(peer_id, addr);
        hub.endpoint(self.id).peers.insert(
            peer_id,
            PeerRecord {
                handle,
                state: PeerState::Connecting,
                remote_endpoint: server_id,
                remote_peer: None,
            },
        );

        let token_raw = hub.next_token;
        hub.next_token += 1;
        hub.requests.insert(
            token_raw,
            PendingRequest {
                client_endpoint: self.id,
                client_peer: peer_id,
                server_endpoint: server_id,
            },
        );
        hub.push_event(
            server_id,
            TransportEvent::ConnectionRequest {
                token: RequestToken::from_raw(token_raw),
                remote: local_addr,
                handshake: handshake.to_vec(),
            },
        );
        Ok(handle)
    }

    fn disconnect(&mut self, peer: Peer, _farewell: &[u8]) {
        let mut hub = self.hub.borrow_mut();
        let Some(record) = hub.endpoint(self.id).peers.get_mut(&peer.id()) else {
            return;
        };
        if record.state == PeerState::Disconnected {
            return;
        }
        record.state = PeerState::ShutdownRequested;
        let remote = record.remote_peer.take().map(|rp| (record.remote_endpoint, rp));
        let handle = record.handle;

        if let Some((remote_endpoint, remote_peer)) = remote {
            hub.notify_remote_disconnected(remote_endpoint, remote_peer);
        }
        hub.push_event(
            self.id,
            TransportEvent::PeerDisconnected {
                peer: handle,
                reason: DisconnectReason::LocalRequest,
            },
        );
    }

    fn disconnect_all(&mut self, farewell: &[u8]) {
        let handles: Vec<Peer> = {
            let mut hub = self.hub.borrow_mut();
            hub.endpoint(self.id)
                .peers
                .values()
                .filter(|record| record.state != PeerState::Disconnected)
                .map(|record| record.handle)
                .collect()
        };
        for handle in handles {
            self.disconnect(handle, farewell);
        }
    }

    fn send(&mut self, peer: Peer, bytes: &[u8], mode: DeliveryMode) {
        let mut hub = self.hub.borrow_mut();
        let Some(record) = hub.endpoint(self.id).peers.get(&peer.id()) else {
            return;
        };
        if record.state != PeerState::Connected {
            return;
        }
        let Some(remote_peer) = record.remote_peer else {
            return;
        };
        let remote_endpoint = record.remote_endpoint;
        let Some(remote_record) = hub.endpoint(remote_endpoint).peers.get(&remote_peer) else {
            return;
        };
        let remote_handle = remote_record.handle;
        hub.push_event(
            remote_endpoint,
            TransportEvent::Receive {
                peer: remote_handle,
                payload: bytes.to_vec(),
                mode,
            },
        );
    }

    fn broadcast(&mut self, bytes: &[u8], mode: DeliveryMode) {
        let handles: Vec<Peer> = {
            let mut hub = self.hub.borrow_mut();
            hub.endpoint(self.id)
                .peers
                .values()
                .filter(|record| record.state == PeerState::Connected)
                .map(|record| record.handle)
                .collect()
        };
        for handle in handles {
            self.send(handle, bytes, mode);
        }
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let mut hub = self.hub.borrow_mut();
        let endpoint = hub.endpoint(self.id);
        let events: Vec<TransportEvent> = endpoint.queue.drain(..).collect();
        // State changes become visible as their events are drained.
        for event in &events {
            match event {
                TransportEvent::PeerConnected(peer) => {
                    if let Some(record) = endpoint.peers.get_mut(&peer.id()) {
                        record.state = PeerState::Connected;
                    }
                }
                TransportEvent::PeerDisconnected { peer, .. } => {
                    endpoint.peers.remove(&peer.id());
                }
                _ => {}
            }
        }
        events
    }

    fn respond(&mut self, token: RequestToken, decision: ConnectionDecision) {
        let mut hub = self.hub.borrow_mut();
        let Some(request) = hub.requests.remove(&token.raw()) else {
            return;
        };
        let client_handle = match hub
            .endpoint(request.client_endpoint)
            .peers
            .get(&request.client_peer)
        {
            Some(record) if record.state == PeerState::Connecting => record.handle,
            // The requester gave up or stopped in the meantime.
            _ => return,
        };

        match decision {
            ConnectionDecision::Accept => {
                // The server-side handle points at the requester's address.
                let requester_addr = hub
                    .endpoint(request.client_endpoint)
                    .addr
                    .unwrap_or_else(|| client_handle.addr());
                let server_peer = hub.alloc_peer();
                let server_handle = Peer::new(server_peer, requester_addr);
                hub.endpoint(request.server_endpoint).peers.insert(
                    server_peer,
                    PeerRecord {
                        handle: server_handle,
                        state: PeerState::Connected,
                        remote_endpoint: request.client_endpoint,
                        remote_peer: Some(request.client_peer),
                    },
                );
                if let Some(record) = hub
                    .endpoint(request.client_endpoint)
                    .peers
                    .get_mut(&request.client_peer)
                {
                    record.remote_peer = Some(server_peer);
                }
                hub.push_event(
                    request.server_endpoint,
                    TransportEvent::PeerConnected(server_handle),
                );
                hub.push_event(
                    request.client_endpoint,
                    TransportEvent::PeerConnected(client_handle),
                );
            }
            ConnectionDecision::Reject => {
                if let Some(record) = hub
                    .endpoint(request.client_endpoint)
                    .peers
                    .get_mut(&request.client_peer)
                {
                    record.state = PeerState::Disconnected;
                }
                hub.push_event(
                    request.client_endpoint,
                    TransportEvent::PeerDisconnected {
                        peer: client_handle,
                        reason: DisconnectReason::Rejected,
                    },
                );
            }
        }
    }

    fn peer_state(&self, peer: Peer) -> PeerState {
        self.hub
            .borrow_mut()
            .endpoint(self.id)
            .peers
            .get(&peer.id())
            .map_or(PeerState::Disconnected, |record| record.state)
    }

    fn rtt_ms(&self, peer: Peer) -> Option<u32> {
        let mut hub = self.hub.borrow_mut();
        if hub.endpoint(self.id).peers.contains_key(&peer.id()) {
            Some(hub.rtt_ms)
        } else {
            None
        }
    }
}
