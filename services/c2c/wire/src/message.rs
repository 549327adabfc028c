//! Logical messages and command codes.
//!
//! A [`Message`] is what the session layer sends and receives; codecs turn it
//! into wire bytes and back.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version stamped on every outgoing message
pub const PROTOCOL_VERSION: u8 = 1;

/// Relay hop ceiling stamped on every outgoing message
pub const DEFAULT_HOP_LIMIT: u8 = 3;

/// Destination identifier of the control plane
pub const CONTROL_PEER: &str = "0";

/// Marker the control plane puts in a successful INIT response
pub const INIT_OK: &str = "INIT OK";

/// Marker the control plane puts in a successful CONNECT response
pub const CONNECT_OK: &str = "CONNECT OK";

/// Command code carried by every message.
///
/// The low codes are reserved for session control. Everything from
/// [`Command::APP_START`] upwards belongs to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Command(pub u16);

impl Command {
    /// Liveness ping
    pub const PING: Command = Command(2);
    /// One-shot registration of a new identity
    pub const REGISTER: Command = Command(3);
    /// Salted re-initialization of a known identity
    pub const INIT_BY_NAME: Command = Command(4);
    /// Route this connection to a named peer
    pub const CONNECT_BY_NAME: Command = Command(5);
    /// First code available to applications
    pub const APP_START: u16 = 16;

    /// Whether this is a session control command
    pub fn is_control(self) -> bool {
        self.0 < Self::APP_START
    }

    /// Raw wire value
    pub fn code(self) -> u16 {
        self.0
    }
}

impl From<u16> for Command {
    fn from(value: u16) -> Self {
        Command(value)
    }
}

impl From<Command> for u16 {
    fn from(value: Command) -> Self {
        value.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Command::PING => write!(f, "PING"),
            Command::REGISTER => write!(f, "REGISTER"),
            Command::INIT_BY_NAME => write!(f, "INIT_BY_NAME"),
            Command::CONNECT_BY_NAME => write!(f, "CONNECT_BY_NAME"),
            Command(code) => write!(f, "CMD({})", code),
        }
    }
}

/// A logical c2c message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Protocol version
    pub proto: u8,
    /// Remaining relay hops
    pub jmp: u8,
    /// Source identity
    pub from: String,
    /// Destination identity
    pub to: String,
    /// Command code
    pub command: Command,
    /// Payload
    pub content: Bytes,
}

impl Message {
    /// Create a message with the default version and hop limit
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        command: Command,
        content: Bytes,
    ) -> Self {
        Self {
            proto: PROTOCOL_VERSION,
            jmp: DEFAULT_HOP_LIMIT,
            from: from.into(),
            to: to.into(),
            command,
            content,
        }
    }

    /// Whether the payload contains `marker` anywhere
    pub fn content_contains(&self, marker: &str) -> bool {
        contains_marker(&self.content, marker)
    }
}

/// Substring search over raw payload bytes
pub fn contains_marker(haystack: &[u8], marker: &str) -> bool {
    let needle = marker.as_bytes();
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
