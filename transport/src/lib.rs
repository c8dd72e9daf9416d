//! Transport contract and in-process transport for netmux sessions.
//!
//! This crate defines the seam between the session layer and whatever
//! moves packets: the [`Transport`] trait plus the peer, event, and error
//! types it speaks. Reliability, ordering, congestion, and MTU handling
//! all live behind the trait; sessions drive it with a periodic
//! [`poll`](Transport::poll) and never block.
//!
//! [`MemoryTransport`] is the bundled in-process implementation, used by
//! tests and demos to run whole client/server topologies without sockets.
//!
//! # Example
//!
//! ```
//! use transport::{ConnectionDecision, MemoryNetwork, Transport, TransportEvent};
//!
//! let net = MemoryNetwork::new();
//! let mut server = net.endpoint();
//! let mut client = net.endpoint();
//!
//! server.listen(7777).unwrap();
//! client.start().unwrap();
//! client.connect("127.0.0.1:7777".parse().unwrap(), b"hello").unwrap();
//!
//! for event in server.poll() {
//!     if let TransportEvent::ConnectionRequest { token, .. } = event {
//!         server.respond(token, ConnectionDecision::Accept);
//!     }
//! }
//! ```

mod error;
mod event;
mod memory;
mod peer;
mod transport;

pub use error::{TransportError, TransportResult};
pub use event::{
    ConnectionDecision, DeliveryMode, DisconnectReason, RequestToken, TransportEvent,
};
pub use memory::{MemoryNetwork, MemoryTransport};
pub use peer::{Peer, PeerId, PeerState};
pub use transport::Transport;
