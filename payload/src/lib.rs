//! Byte-level payload primitives for the netmux session layer.
//!
//! This crate provides [`PayloadWriter`] and [`PayloadReader`] for encoding
//! and decoding message payloads. It is designed for bounded, panic-free
//! operation with explicit error handling.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads are bounds-checked.
//! - **No domain knowledge** - This crate knows nothing about sessions,
//!   peers, or message ids.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use payload::{PayloadReader, PayloadWriter};
//!
//! let mut buf = Vec::new();
//! let mut writer = PayloadWriter::new(&mut buf);
//! writer.write_u16(7);
//! writer.write_str("pos").unwrap();
//!
//! let mut reader = PayloadReader::new(&buf);
//! assert_eq!(reader.read_u16().unwrap(), 7);
//! assert_eq!(reader.read_str().unwrap(), "pos");
//! ```

mod error;
mod reader;
mod writer;

pub use error::{PayloadError, PayloadResult};
pub use reader::PayloadReader;
pub use writer::{PayloadWriter, MAX_STR_LEN};
