//! c2c relay client binary.
//!
//! Connects to a relay over TCP, runs the REGISTER or INIT handshake,
//! optionally routes the session to a named peer, then sends each stdin line
//! to that peer and prints every inbound message.

use bytes::Bytes;
use c2c_session::{connect_tcp, ConnError, Connection, Transport};
use c2c_wire::{Command, ParserKind};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::ClientConfig;
use logging::C2cLogFormatter;

/// c2c relay client
#[derive(Parser, Debug)]
#[command(name = "c2c-client", version, about = "c2c relay client")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "c2c.yaml")]
    config: PathBuf,

    /// Relay address, e.g. 127.0.0.1:7000
    #[arg(long)]
    server: Option<String>,

    /// Local identity
    #[arg(long)]
    user: Option<String>,

    /// Pass-phrase (prefer C2C_PASS)
    #[arg(long)]
    pass: Option<String>,

    /// Register a new identity instead of INIT
    #[arg(long)]
    register: bool,

    /// Peer to connect to after the handshake
    #[arg(long)]
    peer: Option<String>,

    /// Command code for lines read from stdin
    #[arg(long)]
    command: Option<u16>,

    /// Ping interval, e.g. 10s
    #[arg(long)]
    ping_interval: Option<humantime::Duration>,

    /// Framing: binary or text
    #[arg(long)]
    parser: Option<ParserKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(pass) = &self.pass {
            config.pass = pass.clone();
        }
        if self.register {
            config.register = true;
        }
        if let Some(peer) = &self.peer {
            config.peer = Some(peer.clone());
        }
        if let Some(command) = self.command {
            config.command = command;
        }
        if let Some(interval) = &self.ping_interval {
            config.ping_interval = **interval;
        }
        if let Some(parser) = self.parser {
            config.parser = parser;
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("c2c_client={}", args.log_level).parse()?)
        .add_directive(format!("c2c_session={}", args.log_level).parse()?)
        .add_directive(format!("c2c_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(C2cLogFormatter::new("c2c".to_string()))
        .init();

    info!("Starting c2c client v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ClientConfig::load_from_file(&args.config)?;
    args.apply(&mut config);

    if config.user.is_empty() {
        anyhow::bail!("no user configured (--user, C2C_USER or c2c.user in the config file)");
    }
    if command_is_reserved(config.command) {
        anyhow::bail!(
            "command {} is reserved for session control (use {} or above)",
            config.command,
            Command::APP_START
        );
    }

    let addr: SocketAddr = tokio::net::lookup_host(&config.server)
        .await?
        .next()
        .ok_or_else(|| anyhow::anyhow!("cannot resolve {}", config.server))?;
    component_info!("transport", "Connecting to {}", addr);
    let stream = connect_tcp(addr).await?;

    let conn = Arc::new(Connection::open(stream, config.to_conn_config()).await?);

    if let Some(peer) = &config.peer {
        conn.connect(peer).await?;
        component_info!("session", "Routed to peer {}", peer);
    }

    let input = BufReader::new(tokio::io::stdin());
    let result = run_session(conn.clone(), input, &config).await;
    info!("Stats: {:?}", conn.stats());
    result
}

fn command_is_reserved(code: u16) -> bool {
    Command(code).is_control()
}

/// Relay `input` and print inbound traffic until either side ends, then close
async fn run_session<S, R>(
    conn: Arc<Connection<S>>,
    input: R,
    config: &ClientConfig,
) -> anyhow::Result<()>
where
    S: Transport,
    R: AsyncBufRead + Unpin,
{
    let mut inbound = tokio::spawn(print_inbound(conn.clone()));

    let result = tokio::select! {
        relayed = relay_lines(&conn, input, config) => relayed,
        ended = &mut inbound => match ended {
            Ok(err) => {
                component_error!("session", "Read failed: {}", err);
                Err(anyhow::Error::new(err).context("session ended"))
            }
            Err(join) => Err(join.into()),
        },
    };

    conn.close().await?;
    inbound.abort();
    result
}

/// Print inbound messages until a read fails fatally
async fn print_inbound<S: Transport>(conn: Arc<Connection<S>>) -> ConnError {
    loop {
        match conn.read().await {
            Ok((from, command, data)) => {
                println!("{} [{}] {}", from, command, String::from_utf8_lossy(&data));
            }
            Err(ConnError::Idle(after)) => {
                component_warn!("session", "No traffic for {:?}", after);
            }
            Err(e) if e.is_fatal() => return e,
            Err(e) => {
                component_warn!("session", "Dropped inbound frame: {}", e);
            }
        }
    }
}

/// Send each input line to the configured peer until EOF or Ctrl-C
async fn relay_lines<S, R>(
    conn: &Connection<S>,
    input: R,
    config: &ClientConfig,
) -> anyhow::Result<()>
where
    S: Transport,
    R: AsyncBufRead + Unpin,
{
    let target = config.peer.clone().unwrap_or_default();
    let command = Command(config.command);
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if target.is_empty() {
                    component_warn!("session", "No peer configured; dropping input");
                    continue;
                }
                if let Err(e) = conn.write(&target, command, Bytes::from(line)).await {
                    if e.is_fatal() {
                        return Err(e.into());
                    }
                    component_warn!("session", "Write failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing session");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use c2c_wire::{Message, Parser as WireParser, DEFAULT_CHUNK_SIZE};
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "c2c-client",
            "--user",
            "alice",
            "--register",
            "--peer",
            "bob",
            "--ping-interval",
            "3s",
            "--parser",
            "text",
        ]);
        let mut config = ClientConfig::default();
        args.apply(&mut config);

        assert_eq!(config.user, "alice");
        assert!(config.register);
        assert_eq!(config.peer.as_deref(), Some("bob"));
        assert_eq!(config.ping_interval, Duration::from_secs(3));
        assert_eq!(config.parser, ParserKind::Text);
    }

    #[test]
    fn test_reserved_commands() {
        assert!(command_is_reserved(Command::PING.code()));
        assert!(!command_is_reserved(100));
    }

    async fn recv_frame(stream: &mut DuplexStream, parser: &Arc<dyn WireParser>) -> Message {
        let mut buf = parser.read_packet_header(stream).await.unwrap();
        let rest = parser.is_full_receive_msg(&buf).unwrap();
        let start = buf.len();
        buf.resize(start + rest, 0);
        stream.read_exact(&mut buf[start..]).await.unwrap();
        parser.parse_message(&buf).unwrap()
    }

    /// Registered connection plus the relay end of its stream
    async fn registered_session() -> (Arc<Connection<DuplexStream>>, DuplexStream, Arc<dyn WireParser>) {
        let parser = ParserKind::Binary.build(DEFAULT_CHUNK_SIZE);
        let (client, mut relay) = duplex(64 * 1024);

        let relay_parser = parser.clone();
        let handshake = tokio::spawn(async move {
            let req = recv_frame(&mut relay, &relay_parser).await;
            assert_eq!(req.command, Command::REGISTER);
            let ok = Message::new("0", "alice", Command::REGISTER, Bytes::from_static(b"OK"));
            let frame = relay_parser.form_message(&ok).unwrap();
            relay.write_all(&frame).await.unwrap();
            relay
        });

        let mut config = ClientConfig::default();
        config.user = "alice".to_string();
        config.register = true;
        let conn = Connection::establish(client, config.to_conn_config(), parser.clone())
            .await
            .unwrap();
        (Arc::new(conn), handshake.await.unwrap(), parser)
    }

    #[tokio::test]
    async fn test_session_ends_when_relay_goes_away() {
        let (conn, relay, _) = registered_session().await;
        // Keyboard end stays open, so only the inbound side can end the session
        let (input, _keyboard) = duplex(64);
        let config = ClientConfig {
            peer: Some("bob".to_string()),
            ..ClientConfig::default()
        };

        drop(relay);
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            run_session(conn.clone(), BufReader::new(input), &config),
        )
        .await
        .expect("session ended");

        let err = result.unwrap_err();
        assert!(matches!(err.downcast_ref::<ConnError>(), Some(ConnError::Transport(_))));
        assert!(conn.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_read_frame_ends_session() {
        let (conn, mut relay, parser) = registered_session().await;
        let frame = parser
            .form_message(&Message::new(
                "bob",
                "alice",
                Command(100),
                Bytes::from_static(b"hello"),
            ))
            .unwrap();
        relay
            .write_all(&frame[..parser.header_len() + 1])
            .await
            .unwrap();

        let (input, _keyboard) = duplex(64);
        let err = run_session(conn.clone(), BufReader::new(input), &ClientConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<ConnError>(), Some(ConnError::Timeout(_))));
        assert!(conn.is_closed());
        drop(relay);
    }

    #[tokio::test]
    async fn test_input_eof_closes_session() {
        let (conn, _relay, _) = registered_session().await;
        run_session(conn.clone(), BufReader::new(&b""[..]), &ClientConfig::default())
            .await
            .unwrap();
        assert!(conn.is_closed());
    }
}
