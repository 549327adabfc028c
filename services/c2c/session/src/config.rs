//! Connection configuration.

use crate::error::ConnError;
use c2c_wire::{ParserKind, DEFAULT_CHUNK_SIZE};
use std::time::Duration;

/// Which handshake runs when the connection is established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EstablishMode {
    /// Enroll a new identity
    Register,
    /// Re-authenticate a known identity with a salted signature
    #[default]
    Initialize,
}

/// Configuration for a c2c connection
#[derive(Clone)]
pub struct ConnConfig {
    /// Local identity
    pub user: String,
    /// Pass-phrase for the local identity
    pub pass: String,
    /// Largest payload the codec accepts
    pub chunk_size: usize,
    /// Framing variant used by [`crate::Connection::open`]
    pub parser: ParserKind,
    /// Handshake to run
    pub mode: EstablishMode,
    /// Interval between keepalive pings
    pub ping_interval: Duration,
    /// Upper bound for a single frame write (unbounded when `None`)
    pub write_timeout: Option<Duration>,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            pass: String::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            parser: ParserKind::Binary,
            mode: EstablishMode::Initialize,
            ping_interval: Duration::from_secs(10),
            write_timeout: None,
        }
    }
}

impl std::fmt::Debug for ConnConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnConfig")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("chunk_size", &self.chunk_size)
            .field("parser", &self.parser)
            .field("mode", &self.mode)
            .field("ping_interval", &self.ping_interval)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}

impl ConnConfig {
    /// Create a configuration for `user` with default timings
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
            ..Self::default()
        }
    }

    /// Base read timeout, twice the ping interval
    pub fn read_timeout(&self) -> Duration {
        self.ping_interval.saturating_mul(2)
    }

    /// Check the invariants the connection relies on
    pub fn validate(&self) -> Result<(), ConnError> {
        if self.user.is_empty() {
            return Err(ConnError::Config("user must not be empty".into()));
        }
        if self.ping_interval.is_zero() {
            return Err(ConnError::Config("ping interval must be positive".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConnError::Config("chunk size must be positive".into()));
        }
        if matches!(self.write_timeout, Some(t) if t.is_zero()) {
            return Err(ConnError::Config("write timeout must be positive".into()));
        }
        Ok(())
    }
}
