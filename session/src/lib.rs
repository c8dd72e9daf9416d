//! Client and server message-multiplexing sessions for netmux.
//!
//! This is the core crate that ties together payload and transport to
//! provide byte-identified message sessions for frame-driven
//! applications.
//!
//! # Features
//!
//! - Client role: one tracked server connection with
//!   connect/disconnect/send and live connection state
//! - Server role: hosting lifecycle, connected-peer roster, targeted,
//!   broadcast, and filtered sends, accept/reject connection filtering
//! - Per-message-id handler registries, independent per role
//! - Explicit subscriber lists for lifecycle notifications
//!
//! # Design Principles
//!
//! - **Explicit ticking** - The embedding application calls
//!   [`tick`](ClientSession::tick) once per frame; nothing schedules
//!   itself.
//! - **Single-threaded** - One logical thread drives everything;
//!   `&mut self` receivers make buffer races and re-entrant sends
//!   unrepresentable.
//! - **No hidden state** - Sessions are plain values constructed by the
//!   application's composition root.
//!
//! # Wire format
//!
//! Every message is one `u8` message id followed by caller-defined
//! payload bytes, uninterpreted by this layer. There is no per-message
//! length prefix: handlers must consume exactly their payload, and
//! unregistered ids drop the rest of the packet out of sync (each is
//! documented on the session types).

mod client;
mod config;
mod error;
mod notify;
mod router;
mod server;

pub use client::ClientSession;
pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use server::{ConnectionFilter, ServerSession};

// The types every handler and encode callback touches.
pub use payload::{PayloadReader, PayloadWriter};
pub use transport::{DeliveryMode, DisconnectReason, Peer, PeerState};

#[cfg(test)]
mod tests {
    use super::*;
    use transport::MemoryNetwork;

    #[test]
    fn public_api_exports() {
        let net = MemoryNetwork::new();
        let client = ClientSession::new(net.endpoint());
        let server = ServerSession::new(net.endpoint());
        assert_eq!(client.connection_state(), PeerState::Disconnected);
        assert_eq!(server.peer_count(), 0);
        let _ = SessionConfig::for_testing();
    }
}
