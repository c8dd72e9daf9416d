//! Error types for session operations.

use std::fmt;

use transport::TransportError;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by session setup operations.
///
/// Send and disconnect are fire-and-forget and never error; absent-target
/// calls are documented no-ops on the session types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The underlying transport failed to start, bind, or route.
    Transport(TransportError),

    /// A connect raced with an identical in-flight or established
    /// connection to the same remote.
    AlreadyConnected,

    /// The operation requires a hosting session.
    NotRunning,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport failure: {err}"),
            Self::AlreadyConnected => write!(f, "already connected to this remote"),
            Self::NotRunning => write!(f, "session is not running"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_wraps_transport() {
        let err = SessionError::Transport(TransportError::NotRunning);
        assert!(err.to_string().contains("transport failure"));
    }

    #[test]
    fn transport_error_converts() {
        let err: SessionError = TransportError::BindFailed { port: 7 }.into();
        assert_eq!(err, SessionError::Transport(TransportError::BindFailed { port: 7 }));
    }

    #[test]
    fn source_is_exposed_for_transport_errors() {
        let err = SessionError::Transport(TransportError::NotRunning);
        assert!(std::error::Error::source(&err).is_some());
        assert!(std::error::Error::source(&SessionError::NotRunning).is_none());
    }
}
