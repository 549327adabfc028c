//! The c2c connection: framed I/O over a split transport.
//!
//! A [`Connection`] owns both halves of the stream. Writes go through a
//! mutex shared with the keepalive task so two frames never interleave on
//! the wire. Reads go through their own mutex; the protocol has no
//! request ids, so concurrent readers simply take turns.
//!
//! Every read and write also watches the close signal. [`Connection::close`]
//! therefore never waits behind a stalled transport: pending operations
//! return [`ConnError::Closed`] and both halves are dropped.

use crate::config::{ConnConfig, EstablishMode};
use crate::error::ConnError;
use crate::keepalive::{spawn_keepalive, Canceller};
use crate::stats::{ConnStats, StatsCounters};
use crate::transport::Transport;
use async_trait::async_trait;
use bytes::Bytes;
use c2c_wire::{Command, Message, Parser, CONTROL_PEER};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf, ReadHalf, WriteHalf};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

/// Header reads may take this many read timeouts
pub const HEADER_TIMEOUT_FACTOR: u32 = 10;

/// Upper bound on releasing the transport in [`Connection::close`]
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Deadline for reading a frame header
pub fn header_deadline(read_timeout: Duration) -> Duration {
    read_timeout.saturating_mul(HEADER_TIMEOUT_FACTOR)
}

/// Deadline for reading the `remaining` bytes after a header.
///
/// Each outstanding byte is granted one read timeout.
pub fn remainder_deadline(remaining: usize, read_timeout: Duration) -> Duration {
    read_timeout.saturating_mul(u32::try_from(remaining).unwrap_or(u32::MAX))
}

/// Operations a c2c connection offers to callers
#[async_trait]
pub trait C2cConnection: Send + Sync {
    /// Read one complete message: `(from, command, payload)`
    async fn read(&self) -> Result<(String, Command, Bytes), ConnError>;

    /// Send `data` to `to` with `command`
    async fn write(&self, to: &str, command: Command, data: Bytes) -> Result<(), ConnError>;

    /// Ask the control plane to route this connection to `peer`
    async fn connect(&self, peer: &str) -> Result<(), ConnError>;

    /// Stop keepalive and release the transport
    async fn close(&self) -> Result<(), ConnError>;
}

/// Read adapter that remembers how many bytes went through it
struct CountingReader<'a, R> {
    inner: &'a mut R,
    consumed: usize,
}

impl<'a, R> CountingReader<'a, R> {
    fn new(inner: &'a mut R) -> Self {
        Self { inner, consumed: 0 }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<'_, R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        let poll = Pin::new(&mut *this.inner).poll_read(cx, buf);
        this.consumed += buf.filled().len() - before;
        poll
    }
}

/// State shared between the foreground and the keepalive task
pub(crate) struct Shared<S> {
    user: String,
    parser: Arc<dyn Parser>,
    writer: Mutex<Option<WriteHalf<S>>>,
    write_timeout: Option<Duration>,
    closed: AtomicBool,
    shutdown: watch::Receiver<bool>,
    stats: StatsCounters,
}

impl<S> Shared<S> {
    pub(crate) fn user(&self) -> &str {
        &self.user
    }

    /// Resolves once the connection is closed or dropped
    pub(crate) async fn closed_signal(&self) {
        let mut shutdown = self.shutdown.clone();
        // A dropped sender means the connection is gone as well
        let _ = shutdown.wait_for(|closed| *closed).await;
    }
}

impl<S: Transport> Shared<S> {
    /// Encode and write one frame under the write lock.
    ///
    /// Gives up with [`ConnError::Closed`] as soon as the connection closes,
    /// even while waiting for the lock or for the transport to drain.
    pub(crate) async fn send(
        &self,
        to: &str,
        command: Command,
        content: Bytes,
    ) -> Result<(), ConnError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConnError::Closed);
        }

        let msg = Message::new(self.user.as_str(), to, command, content);
        let frame = self.parser.form_message(&msg).map_err(ConnError::Encoding)?;

        let write = async {
            let mut guard = self.writer.lock().await;
            let writer = guard.as_mut().ok_or(ConnError::Closed)?;
            let io = async {
                writer.write_all(&frame).await?;
                writer.flush().await?;
                Ok::<_, io::Error>(())
            };
            match self.write_timeout {
                Some(limit) => timeout(limit, io)
                    .await
                    .map_err(|_| ConnError::Timeout(limit))??,
                None => io.await?,
            }
            Ok::<_, ConnError>(())
        };

        tokio::select! {
            biased;

            _ = self.closed_signal() => return Err(ConnError::Closed),

            result = write => result?,
        }

        self.stats.record_out(frame.len());
        trace!("Sent {} to {} ({} bytes)", command, to, frame.len());
        Ok(())
    }

    /// Empty PING to the control plane; outcome is counted
    pub(crate) async fn ping(&self) -> Result<(), ConnError> {
        let result = self.send(CONTROL_PEER, Command::PING, Bytes::new()).await;
        self.stats.record_ping(result.is_ok());
        result
    }
}

/// An established c2c session over a byte stream
pub struct Connection<S> {
    pub(crate) shared: Arc<Shared<S>>,
    reader: Mutex<Option<ReadHalf<S>>>,
    pub(crate) config: ConnConfig,
    read_timeout: Duration,
    cancel: Canceller,
    keepalive: Option<JoinHandle<()>>,
}

impl<S: Transport> Connection<S> {
    /// Establish a session using the parser named in `config`
    pub async fn open(stream: S, config: ConnConfig) -> Result<Self, ConnError> {
        let parser = config.parser.build(config.chunk_size);
        Self::establish(stream, config, parser).await
    }

    /// Run the configured handshake over `stream` and start keepalive.
    ///
    /// An injected `parser` must accept the same chunk size as `config`.
    /// On failure the stream is dropped and no keepalive is started.
    pub async fn establish(
        stream: S,
        config: ConnConfig,
        parser: Arc<dyn Parser>,
    ) -> Result<Self, ConnError> {
        config.validate()?;
        if parser.chunk_size() != config.chunk_size {
            return Err(ConnError::Config(format!(
                "{} parser chunk size {} does not match configured {}",
                parser.name(),
                parser.chunk_size(),
                config.chunk_size
            )));
        }

        let (reader, writer) = tokio::io::split(stream);
        let (cancel, cancelled) = Canceller::new();
        let read_timeout = config.read_timeout();

        let shared = Arc::new(Shared {
            user: config.user.clone(),
            parser,
            writer: Mutex::new(Some(writer)),
            write_timeout: config.write_timeout,
            closed: AtomicBool::new(false),
            shutdown: cancelled.clone(),
            stats: StatsCounters::default(),
        });

        let mut conn = Self {
            shared,
            reader: Mutex::new(Some(reader)),
            config,
            read_timeout,
            cancel,
            keepalive: None,
        };

        match conn.config.mode {
            EstablishMode::Register => conn.register().await?,
            EstablishMode::Initialize => conn.initialize().await?,
        }

        info!(
            "c2c session established for {} ({:?}, {} framing)",
            conn.config.user,
            conn.config.mode,
            conn.shared.parser.name()
        );

        conn.keepalive = Some(spawn_keepalive(
            conn.shared.clone(),
            conn.config.ping_interval,
            cancelled,
        ));
        Ok(conn)
    }

    /// Send `data` to `to` with `command`
    pub async fn write(&self, to: &str, command: Command, data: Bytes) -> Result<(), ConnError> {
        self.shared.send(to, command, data).await
    }

    /// Read one complete message.
    ///
    /// Returns `(from, command, payload)`; never a partial frame. When the
    /// header deadline passes before any byte arrives the error is
    /// [`ConnError::Idle`] and the stream is still aligned; any other
    /// timeout leaves a frame half read and is fatal.
    pub async fn read(&self) -> Result<(String, Command, Bytes), ConnError> {
        if self.is_closed() {
            return Err(ConnError::Closed);
        }

        tokio::select! {
            biased;

            _ = self.shared.closed_signal() => Err(ConnError::Closed),

            result = self.read_frame() => result,
        }
    }

    async fn read_frame(&self) -> Result<(String, Command, Bytes), ConnError> {
        let parser = &self.shared.parser;
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(ConnError::Closed)?;
        let mut counted = CountingReader::new(reader);

        let header_wait = header_deadline(self.read_timeout);
        let mut buf = match timeout(header_wait, parser.read_packet_header(&mut counted)).await {
            Ok(header) => header.map_err(ConnError::from_header_read)?,
            Err(_) if counted.consumed == 0 => return Err(ConnError::Idle(header_wait)),
            Err(_) => return Err(ConnError::Timeout(header_wait)),
        };

        let rest = parser.is_full_receive_msg(&buf).map_err(ConnError::Protocol)?;
        if rest > 0 {
            let wait = remainder_deadline(rest, self.read_timeout);
            let start = buf.len();
            buf.resize(start + rest, 0);
            timeout(wait, counted.read_exact(&mut buf[start..]))
                .await
                .map_err(|_| ConnError::Timeout(wait))??;
        }
        drop(guard);

        let msg = parser.parse_message(&buf).map_err(ConnError::Decoding)?;
        self.shared.stats.record_in(buf.len());
        trace!("Received {} from {} ({} bytes)", msg.command, msg.from, buf.len());

        Ok((msg.from, msg.command, msg.content))
    }

    /// Write a request and wait for the single response
    pub(crate) async fn exchange(
        &self,
        to: &str,
        command: Command,
        data: Bytes,
    ) -> Result<(Command, Bytes), ConnError> {
        self.write(to, command, data).await?;
        let (_, reply, payload) = self.read().await?;
        Ok((reply, payload))
    }

    /// Stop keepalive and release the transport.
    ///
    /// Pending reads and writes return [`ConnError::Closed`]. Does not wait
    /// for the keepalive task, and gives the transport at most
    /// [`CLOSE_GRACE`] to shut down. Later calls are no-ops.
    pub async fn close(&self) -> Result<(), ConnError> {
        if !self.cancel.cancel() {
            return Ok(());
        }
        self.shared.closed.store(true, Ordering::Release);

        let release = async {
            let writer = self.shared.writer.lock().await.take();
            let reader = self.reader.lock().await.take();
            let shutdown = match writer {
                Some(mut writer) => writer.shutdown().await,
                None => Ok(()),
            };
            drop(reader);
            shutdown
        };

        match timeout(CLOSE_GRACE, release).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Shutdown for {} failed: {}", self.shared.user, e),
            Err(_) => warn!(
                "Transport for {} did not shut down within {:?}",
                self.shared.user, CLOSE_GRACE
            ),
        }
        info!("c2c session for {} closed", self.shared.user);
        Ok(())
    }
}

impl<S> Connection<S> {
    /// Local identity
    pub fn user(&self) -> &str {
        &self.config.user
    }

    /// Configuration this connection was established with
    pub fn config(&self) -> &ConnConfig {
        &self.config
    }

    /// Base read timeout (twice the ping interval)
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Whether [`Connection::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the keepalive task is still alive
    pub fn is_keepalive_running(&self) -> bool {
        self.keepalive
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Snapshot of the connection counters
    pub fn stats(&self) -> ConnStats {
        self.shared.stats.snapshot()
    }
}

impl<S> Drop for Connection<S> {
    fn drop(&mut self) {
        if self.cancel.cancel() {
            debug!("c2c session for {} dropped without close", self.config.user);
        }
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("user", &self.config.user)
            .field("mode", &self.config.mode)
            .field("read_timeout", &self.read_timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl<S: Transport> C2cConnection for Connection<S> {
    async fn read(&self) -> Result<(String, Command, Bytes), ConnError> {
        Connection::read(self).await
    }

    async fn write(&self, to: &str, command: Command, data: Bytes) -> Result<(), ConnError> {
        Connection::write(self, to, command, data).await
    }

    async fn connect(&self, peer: &str) -> Result<(), ConnError> {
        Connection::connect(self, peer).await
    }

    async fn close(&self) -> Result<(), ConnError> {
        Connection::close(self).await
    }
}
