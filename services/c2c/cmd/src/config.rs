//! Configuration handling for the c2c client.
//!
//! Values come from the YAML config file first, then `C2C_*` environment
//! variables, then command-line flags (applied in `main`).

use anyhow::{Context, Result};
use c2c_session::{ConnConfig, EstablishMode};
use c2c_wire::{ParserKind, DEFAULT_CHUNK_SIZE};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay server address (host:port)
    pub server: String,
    /// Local identity
    pub user: String,
    /// Pass-phrase for the local identity
    pub pass: String,
    /// Register a new identity instead of INIT
    pub register: bool,
    /// Largest payload accepted by the codec
    pub chunk_size: usize,
    /// Framing variant
    pub parser: ParserKind,
    /// Keepalive interval
    pub ping_interval: Duration,
    /// Write deadline, none when unset
    pub write_timeout: Option<Duration>,
    /// Peer to connect to after the handshake
    pub peer: Option<String>,
    /// Command code used for lines read from stdin
    pub command: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:7000".to_string(),
            user: String::new(),
            pass: String::new(),
            register: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            parser: ParserKind::Binary,
            ping_interval: Duration::from_secs(10),
            write_timeout: Some(Duration::from_secs(30)),
            peer: None,
            command: 100,
        }
    }
}

/// Root configuration structure (matches the YAML file)
#[derive(Debug, Deserialize)]
struct RootConfig {
    c2c: Option<FileConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    server: Option<String>,
    user: Option<String>,
    pass: Option<String>,
    register: Option<bool>,
    chunk_size: Option<usize>,
    parser: Option<ParserKind>,
    ping_interval: Option<String>,
    write_timeout: Option<String>,
    peer: Option<String>,
    command: Option<u16>,
}

impl ClientConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        match std::fs::read_to_string(&config_path) {
            Ok(content) => {
                let root: RootConfig = serde_yaml::from_str(&content)
                    .with_context(|| format!("invalid config file {:?}", config_path.as_ref()))?;
                if let Some(file) = root.c2c {
                    config.apply_file_config(file)?;
                }
                info!("Loaded configuration from {:?}", config_path.as_ref());
            }
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", config_path.as_ref());
            }
        }

        config.apply_environment_overrides()?;
        Ok(config)
    }

    fn apply_file_config(&mut self, file: FileConfig) -> Result<()> {
        if let Some(server) = file.server {
            self.server = server;
        }
        if let Some(user) = file.user {
            self.user = user;
        }
        if let Some(pass) = file.pass {
            self.pass = pass;
        }
        if let Some(register) = file.register {
            self.register = register;
        }
        if let Some(chunk_size) = file.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(parser) = file.parser {
            self.parser = parser;
        }
        if let Some(interval) = file.ping_interval {
            self.ping_interval = parse_duration("ping_interval", &interval)?;
        }
        if let Some(timeout) = file.write_timeout {
            self.write_timeout = parse_optional_duration("write_timeout", &timeout)?;
        }
        if file.peer.is_some() {
            self.peer = file.peer;
        }
        if let Some(command) = file.command {
            self.command = command;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) -> Result<()> {
        if let Ok(server) = std::env::var("C2C_SERVER") {
            info!("Server overridden by environment: {}", server);
            self.server = server;
        }
        if let Ok(user) = std::env::var("C2C_USER") {
            info!("User overridden by environment: {}", user);
            self.user = user;
        }
        if let Ok(pass) = std::env::var("C2C_PASS") {
            self.pass = pass;
        }
        if let Ok(peer) = std::env::var("C2C_PEER") {
            info!("Peer overridden by environment: {}", peer);
            self.peer = Some(peer);
        }
        if let Ok(interval) = std::env::var("C2C_PING_INTERVAL") {
            self.ping_interval = parse_duration("C2C_PING_INTERVAL", &interval)?;
            info!("Ping interval overridden by environment: {:?}", self.ping_interval);
        }
        Ok(())
    }

    /// Session configuration for [`c2c_session::Connection::open`]
    pub fn to_conn_config(&self) -> ConnConfig {
        ConnConfig {
            user: self.user.clone(),
            pass: self.pass.clone(),
            chunk_size: self.chunk_size,
            parser: self.parser,
            mode: if self.register {
                EstablishMode::Register
            } else {
                EstablishMode::Initialize
            },
            ping_interval: self.ping_interval,
            write_timeout: self.write_timeout,
        }
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).with_context(|| format!("invalid duration for {}: {}", key, value))
}

/// `"none"` or `"0"` disables the deadline
fn parse_optional_duration(key: &str, value: &str) -> Result<Option<Duration>> {
    match value.trim() {
        "none" | "0" => Ok(None),
        other => parse_duration(key, other).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server, "127.0.0.1:7000");
        assert_eq!(config.ping_interval, Duration::from_secs(10));
        assert_eq!(config.parser, ParserKind::Binary);
        assert!(!config.register);
    }

    #[test]
    fn test_apply_file_config() {
        let yaml_content = r#"
c2c:
  server: relay.example.net:7000
  user: alice
  pass: secret
  register: true
  chunk_size: 4096
  parser: text
  ping_interval: 5s
  write_timeout: none
  peer: bob
  command: 120
"#;
        let root: RootConfig = serde_yaml::from_str(yaml_content).unwrap();
        let mut config = ClientConfig::default();
        config.apply_file_config(root.c2c.unwrap()).unwrap();

        assert_eq!(config.server, "relay.example.net:7000");
        assert_eq!(config.user, "alice");
        assert!(config.register);
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.parser, ParserKind::Text);
        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.write_timeout, None);
        assert_eq!(config.peer.as_deref(), Some("bob"));
        assert_eq!(config.command, 120);

        let conn = config.to_conn_config();
        assert_eq!(conn.mode, EstablishMode::Register);
        assert_eq!(conn.read_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_from_file_keeps_defaults_for_missing_keys() {
        let yaml_content = "c2c:\n  user: carol\n  ping_interval: 1m\n";
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = ClientConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.ping_interval, Duration::from_secs(60));
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.to_conn_config().mode, EstablishMode::Initialize);
    }

    #[test]
    fn test_invalid_duration_is_an_error() {
        let root: RootConfig =
            serde_yaml::from_str("c2c:\n  ping_interval: soon\n").unwrap();
        let mut config = ClientConfig::default();
        assert!(config.apply_file_config(root.c2c.unwrap()).is_err());
    }
}
