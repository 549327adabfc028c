//! Codec contract between the session layer and a framing implementation.
//!
//! The session layer never touches bytes directly: it forms, sizes and parses
//! frames through a [`Parser`], so framing variants can be swapped without
//! changing session logic.

use crate::binary::BinaryParser;
use crate::error::WireError;
use crate::message::{Command, Message, PROTOCOL_VERSION};
use crate::text::TextParser;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default chunk size hint (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Frame codec capability set
#[async_trait]
pub trait Parser: Send + Sync + fmt::Debug {
    /// Short name of this framing variant
    fn name(&self) -> &'static str;

    /// Size of the fixed frame header in bytes
    fn header_len(&self) -> usize;

    /// Largest content this codec accepts
    fn chunk_size(&self) -> usize;

    /// Encode a logical message into wire bytes
    fn form_message(&self, msg: &Message) -> Result<Bytes, WireError>;

    /// Read exactly one frame header from the stream.
    ///
    /// Deadlines are the caller's concern.
    async fn read_packet_header(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<BytesMut, WireError> {
        let mut buf = BytesMut::zeroed(self.header_len());
        reader.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Number of bytes still missing after `buf` (0 when the frame is complete)
    fn is_full_receive_msg(&self, buf: &[u8]) -> Result<usize, WireError>;

    /// Decode a complete frame
    fn parse_message(&self, buf: &[u8]) -> Result<Message, WireError>;
}

/// Selectable framing variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// Compact big-endian header
    #[default]
    Binary,
    /// ASCII hex header
    Text,
}

impl ParserKind {
    /// Build a shared parser of this kind
    pub fn build(self, chunk_size: usize) -> Arc<dyn Parser> {
        match self {
            ParserKind::Binary => Arc::new(BinaryParser::new(chunk_size)),
            ParserKind::Text => Arc::new(TextParser::new(chunk_size)),
        }
    }
}

impl std::str::FromStr for ParserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(ParserKind::Binary),
            "text" => Ok(ParserKind::Text),
            other => Err(format!("unknown parser kind: {}", other)),
        }
    }
}

/// Header fields shared by every framing variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol version
    pub proto: u8,
    /// Hop limit
    pub jmp: u8,
    /// Command code
    pub command: Command,
    /// Source identity length
    pub from_len: u16,
    /// Destination identity length
    pub to_len: u16,
    /// Content length
    pub content_len: u32,
}

impl FrameHeader {
    /// Describe `msg`, rejecting identities or content that do not fit
    pub fn for_message(msg: &Message, chunk_size: usize) -> Result<Self, WireError> {
        if msg.content.len() > chunk_size {
            return Err(WireError::Size {
                size: msg.content.len(),
                limit: chunk_size,
            });
        }
        let content_len =
            u32::try_from(msg.content.len()).map_err(|_| WireError::Size {
                size: msg.content.len(),
                limit: u32::MAX as usize,
            })?;

        Ok(Self {
            proto: msg.proto,
            jmp: msg.jmp,
            command: msg.command,
            from_len: identity_len(&msg.from)?,
            to_len: identity_len(&msg.to)?,
            content_len,
        })
    }

    /// Bytes following the header
    pub fn body_len(&self) -> usize {
        self.from_len as usize + self.to_len as usize + self.content_len as usize
    }

    /// Reject headers this client cannot accept
    pub fn validate(&self, chunk_size: usize) -> Result<(), WireError> {
        if self.proto != PROTOCOL_VERSION {
            return Err(WireError::Version(self.proto));
        }
        if self.content_len as usize > chunk_size {
            return Err(WireError::Size {
                size: self.content_len as usize,
                limit: chunk_size,
            });
        }
        Ok(())
    }
}

fn identity_len(id: &str) -> Result<u16, WireError> {
    u16::try_from(id.len()).map_err(|_| WireError::IdentityLen(id.len()))
}

/// Append the identity and content section that follows any header
pub(crate) fn put_body(buf: &mut BytesMut, msg: &Message) {
    buf.put_slice(msg.from.as_bytes());
    buf.put_slice(msg.to.as_bytes());
    buf.put_slice(&msg.content);
}

/// Remaining byte count for a buffer whose header is `header`
pub(crate) fn remaining(header: &FrameHeader, header_len: usize, have: usize) -> usize {
    (header_len + header.body_len()).saturating_sub(have)
}

/// Split the body of a complete frame into a message
pub(crate) fn take_body(
    header: &FrameHeader,
    header_len: usize,
    buf: &[u8],
) -> Result<Message, WireError> {
    let total = header_len + header.body_len();
    if buf.len() < total {
        return Err(WireError::Incomplete {
            need: total,
            have: buf.len(),
        });
    }
    if buf.len() > total {
        return Err(WireError::Malformed("trailing bytes after frame"));
    }

    let body = &buf[header_len..];
    let (from, rest) = body.split_at(header.from_len as usize);
    let (to, content) = rest.split_at(header.to_len as usize);

    Ok(Message {
        proto: header.proto,
        jmp: header.jmp,
        from: std::str::from_utf8(from).map_err(|_| WireError::Utf8)?.to_string(),
        to: std::str::from_utf8(to).map_err(|_| WireError::Utf8)?.to_string(),
        command: header.command,
        content: Bytes::copy_from_slice(content),
    })
}
