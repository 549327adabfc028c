//! Scripted control-plane peer for tests.

use bytes::Bytes;
use c2c_wire::{Command, Message, Parser, WireError};
use std::sync::Arc;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

/// Far end of an in-memory transport, speaking the same framing
pub(crate) struct MockPlane {
    stream: DuplexStream,
    parser: Arc<dyn Parser>,
}

impl MockPlane {
    /// Client-side stream plus the plane holding the other end
    pub(crate) fn pair(parser: Arc<dyn Parser>) -> (DuplexStream, MockPlane) {
        let (client, server) = duplex(64 * 1024);
        (
            client,
            MockPlane {
                stream: server,
                parser,
            },
        )
    }

    /// Read one frame sent by the client
    pub(crate) async fn recv(&mut self) -> Result<Message, WireError> {
        let mut buf = self.parser.read_packet_header(&mut self.stream).await?;
        let rest = self.parser.is_full_receive_msg(&buf)?;
        if rest > 0 {
            let start = buf.len();
            buf.resize(start + rest, 0);
            self.stream.read_exact(&mut buf[start..]).await?;
        }
        self.parser.parse_message(&buf)
    }

    /// Send a well-formed frame to the client
    pub(crate) async fn reply(&mut self, from: &str, to: &str, command: Command, content: &[u8]) {
        let msg = Message::new(from, to, command, Bytes::copy_from_slice(content));
        let frame = self.parser.form_message(&msg).expect("test frame");
        self.send_raw(&frame).await;
    }

    /// Send arbitrary bytes to the client
    pub(crate) async fn send_raw(&mut self, bytes: &[u8]) {
        self.try_send_raw(bytes).await.expect("test write");
    }

    /// Send arbitrary bytes, reporting a released client as an error
    pub(crate) async fn try_send_raw(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }
}
