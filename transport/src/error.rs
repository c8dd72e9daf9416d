//! Error types for transport operations.

use std::fmt;
use std::net::SocketAddr;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced by transport setup operations.
///
/// Data-plane operations (send, disconnect) are fire-and-forget and do not
/// error; see the [`Transport`](crate::Transport) contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport is already running.
    AlreadyRunning,

    /// The operation requires a running transport.
    NotRunning,

    /// The listen port could not be bound.
    BindFailed {
        /// The port that could not be bound.
        port: u16,
    },

    /// No endpoint is reachable at the connect address.
    NoRoute {
        /// The unreachable address.
        addr: SocketAddr,
    },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "transport is already running"),
            Self::NotRunning => write!(f, "transport is not running"),
            Self::BindFailed { port } => write!(f, "could not bind listen port {port}"),
            Self::NoRoute { addr } => write!(f, "no endpoint reachable at {addr}"),
        }
    }
}

impl std::error::Error for TransportError {}
