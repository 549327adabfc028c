//! Connection error types.

use c2c_wire::WireError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a c2c connection
#[derive(Error, Debug)]
pub enum ConnError {
    /// I/O failure or closed stream
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A bounded operation ran out of time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// No frame started before the header deadline; nothing was consumed
    #[error("no traffic for {0:?}")]
    Idle(Duration),

    /// The codec refused to encode an outgoing message
    #[error("encoding failed: {0}")]
    Encoding(#[source] WireError),

    /// The codec refused an incoming frame header
    #[error("protocol violation: {0}")]
    Protocol(#[source] WireError),

    /// The codec could not parse a complete frame
    #[error("decoding failed: {0}")]
    Decoding(#[source] WireError),

    /// Register or INIT handshake failed
    #[error("cannot {action}: {reason}")]
    Establishment {
        /// Which handshake failed ("register" or "initialize")
        action: &'static str,
        /// Human readable cause
        reason: String,
        /// Underlying failure, if any
        #[source]
        source: Option<Box<ConnError>>,
    },

    /// Connect-by-name was refused or failed
    #[error("cannot connect to {peer}: {reason}")]
    Connect {
        /// Requested peer
        peer: String,
        /// Human readable cause
        reason: String,
        /// Underlying failure, if any
        #[source]
        source: Option<Box<ConnError>>,
    },

    /// Invalid connection configuration
    #[error("invalid config: {0}")]
    Config(String),

    /// The connection was closed locally
    #[error("connection closed")]
    Closed,
}

impl ConnError {
    /// Whether the connection should be discarded after this error
    pub fn is_fatal(&self) -> bool {
        match self {
            ConnError::Transport(_)
            | ConnError::Timeout(_)
            | ConnError::Protocol(_)
            | ConnError::Establishment { .. }
            | ConnError::Closed => true,
            ConnError::Connect { source, .. } => {
                source.as_ref().map(|s| s.is_fatal()).unwrap_or(false)
            }
            ConnError::Idle(_)
            | ConnError::Encoding(_)
            | ConnError::Decoding(_)
            | ConnError::Config(_) => false,
        }
    }

    pub(crate) fn from_header_read(err: WireError) -> Self {
        match err {
            WireError::Io(io) => ConnError::Transport(io),
            other => ConnError::Protocol(other),
        }
    }
}
