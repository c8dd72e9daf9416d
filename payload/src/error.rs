//! Error types for payload operations.

use std::fmt;

/// Result type for payload operations.
pub type PayloadResult<T> = Result<T, PayloadError>;

/// Errors that can occur while reading or writing payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Attempted to read past the end of the payload.
    UnexpectedEof {
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes available.
        available: usize,
    },

    /// A varint ran past its maximum encoded length without terminating.
    InvalidVarint,

    /// A length-prefixed string did not contain valid UTF-8.
    InvalidUtf8 {
        /// Length of the invalid string body in bytes.
        len: usize,
    },

    /// A string was too long for its length prefix.
    StringTooLong {
        /// Length of the string in bytes.
        len: usize,
        /// Maximum encodable length.
        max: usize,
    },
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof {
                requested,
                available,
            } => {
                write!(
                    f,
                    "attempted to read {requested} bytes but only {available} bytes available"
                )
            }
            Self::InvalidVarint => write!(f, "varint exceeded its maximum encoded length"),
            Self::InvalidUtf8 { len } => {
                write!(f, "string body of {len} bytes is not valid UTF-8")
            }
            Self::StringTooLong { len, max } => {
                write!(f, "string of {len} bytes exceeds maximum length {max}")
            }
        }
    }
}

impl std::error::Error for PayloadError {}
