//! Register / INIT handshakes and connect-by-name.
//!
//! Every exchange here is one request followed by exactly one response that
//! must carry the same command code and a non-empty payload.

use crate::connection::Connection;
use crate::credentials::{credential, init_payload};
use crate::error::ConnError;
use crate::transport::Transport;
use bytes::Bytes;
use c2c_wire::{contains_marker, Command, CONNECT_OK, CONTROL_PEER, INIT_OK};
use tracing::{debug, info, warn};

/// Validate a handshake response, returning the reason on rejection
pub fn check_response(
    expected: Command,
    marker: Option<&str>,
    got: Command,
    payload: &[u8],
) -> Result<(), String> {
    if payload.is_empty() {
        return Err("empty response payload".to_string());
    }
    if got != expected {
        return Err(format!(
            "unexpected response command {} (want {})",
            got, expected
        ));
    }
    if let Some(marker) = marker {
        if !contains_marker(payload, marker) {
            return Err(format!(
                "response missing \"{}\": {}",
                marker,
                String::from_utf8_lossy(payload)
            ));
        }
    }
    Ok(())
}

fn establishment(action: &'static str, err: ConnError) -> ConnError {
    ConnError::Establishment {
        action,
        reason: err.to_string(),
        source: Some(Box::new(err)),
    }
}

impl<S: Transport> Connection<S> {
    /// Enroll the identity with its plain credential hash
    pub(crate) async fn register(&self) -> Result<(), ConnError> {
        let cred = credential(&self.config.user, &self.config.pass);
        debug!("Sending REGISTER for {}", self.config.user);

        let (got, payload) = self
            .exchange(CONTROL_PEER, Command::REGISTER, Bytes::from(cred))
            .await
            .map_err(|e| establishment("register", e))?;

        check_response(Command::REGISTER, None, got, &payload).map_err(|reason| {
            warn!("REGISTER for {} rejected: {}", self.config.user, reason);
            ConnError::Establishment {
                action: "register",
                reason,
                source: None,
            }
        })
    }

    /// Re-authenticate with a freshly salted signature
    pub(crate) async fn initialize(&self) -> Result<(), ConnError> {
        let payload = init_payload(&self.config.user, &self.config.pass);
        debug!("Sending INIT for {}", self.config.user);

        let (got, reply) = self
            .exchange(CONTROL_PEER, Command::INIT_BY_NAME, Bytes::from(payload))
            .await
            .map_err(|e| establishment("initialize", e))?;

        check_response(Command::INIT_BY_NAME, Some(INIT_OK), got, &reply).map_err(|reason| {
            warn!("INIT for {} rejected: {}", self.config.user, reason);
            ConnError::Establishment {
                action: "initialize",
                reason,
                source: None,
            }
        })
    }

    /// Ask the control plane to route this connection to `peer`.
    ///
    /// A refusal is recoverable: the caller may retry with the same or
    /// another name.
    pub async fn connect(&self, peer: &str) -> Result<(), ConnError> {
        let (got, reply) = self
            .exchange(peer, Command::CONNECT_BY_NAME, Bytes::new())
            .await
            .map_err(|e| ConnError::Connect {
                peer: peer.to_string(),
                reason: e.to_string(),
                source: Some(Box::new(e)),
            })?;

        check_response(Command::CONNECT_BY_NAME, Some(CONNECT_OK), got, &reply).map_err(
            |reason| ConnError::Connect {
                peer: peer.to_string(),
                reason,
                source: None,
            },
        )?;

        info!("{} connected to peer {}", self.config.user, peer);
        Ok(())
    }
}
