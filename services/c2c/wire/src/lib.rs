//! Logical messages, command codes and swappable frame codecs for c2c.
//!
//! This crate defines what the session layer sends ([`Message`] with a
//! [`Command`]) and the [`Parser`] contract it uses to turn messages into
//! frames and back. Two framing variants are provided:
//!
//! - **[`BinaryParser`]**: 12-byte big-endian header
//! - **[`TextParser`]**: 26-byte ASCII hex header, readable in packet dumps
//!
//! ## Frame
//!
//! ```text
//! +----------------------+-------------------------------------------+
//! | header (fixed size)  | version, hop limit, command, lengths      |
//! +----------------------+-------------------------------------------+
//! | from                 | source identity (utf-8)                   |
//! +----------------------+-------------------------------------------+
//! | to                   | destination identity (utf-8)              |
//! +----------------------+-------------------------------------------+
//! | content              | payload, at most chunk_size bytes         |
//! +----------------------+-------------------------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binary;
pub mod codec;
pub mod error;
pub mod message;
pub mod text;

// Re-export main types
pub use binary::{BinaryParser, BINARY_HEADER_SIZE};
pub use codec::{FrameHeader, Parser, ParserKind, DEFAULT_CHUNK_SIZE};
pub use error::WireError;
pub use message::{
    contains_marker, Command, Message, CONNECT_OK, CONTROL_PEER, DEFAULT_HOP_LIMIT, INIT_OK,
    PROTOCOL_VERSION,
};
pub use text::{TextParser, TEXT_HEADER_SIZE};
