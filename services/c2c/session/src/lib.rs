//! Register/INIT handshake, keepalive, framed read/write and connect-by-name for c2c.
//!
//! This crate provides the client side of a c2c session: it authenticates
//! against the relay's control plane over any byte stream, keeps the session
//! alive with periodic pings, and exchanges framed messages with named peers.
//!
//! ## Features
//!
//! - **Handshakes**: one-shot REGISTER or salted INIT, chosen by config
//! - **Keepalive**: background PING to the control plane, cancelled on close
//! - **Framed I/O**: read deadlines that scale with the bytes still expected
//! - **Connect-by-name**: route the session to a named peer
//! - **Swappable framing**: any [`c2c_wire::Parser`] can be injected
//!
//! ## Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use c2c_session::{connect_tcp, ConnConfig, Connection, EstablishMode};
//! use c2c_wire::Command;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), c2c_session::ConnError> {
//! let mut config = ConnConfig::new("alice", "secret");
//! config.mode = EstablishMode::Register;
//! config.ping_interval = Duration::from_secs(10);
//!
//! let stream = connect_tcp("127.0.0.1:7000".parse().unwrap()).await?;
//! let conn = Connection::open(stream, config).await?;
//!
//! conn.connect("bob").await?;
//! conn.write("bob", Command(100), Bytes::from_static(b"hi")).await?;
//! let (from, command, data) = conn.read().await?;
//! println!("{} sent {} ({} bytes)", from, command, data.len());
//!
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod handshake;
pub mod keepalive;
pub mod stats;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types
pub use config::{ConnConfig, EstablishMode};
pub use connection::{
    header_deadline, remainder_deadline, C2cConnection, Connection, CLOSE_GRACE,
    HEADER_TIMEOUT_FACTOR,
};
pub use credentials::{credential, generate_salt, init_payload, signature, SALT_LEN};
pub use error::ConnError;
pub use handshake::check_response;
pub use keepalive::Canceller;
pub use stats::ConnStats;
pub use transport::{connect_tcp, Transport};
