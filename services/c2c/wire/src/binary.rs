//! Compact binary framing.
//!
//! ```text
//! +---------+---------+-------------+--------------+------------+------------------+
//! | ver u8  | jmp u8  | command u16 | from_len u16 | to_len u16 | content_len u32  |
//! +---------+---------+-------------+--------------+------------+------------------+
//! | from (from_len) | to (to_len) | content (content_len)                          |
//! +------------------------------------------------------------------------------+
//! ```
//!
//! All integers are big-endian.

use crate::codec::{put_body, remaining, take_body, FrameHeader, Parser};
use crate::error::WireError;
use crate::message::{Command, Message};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Binary header size in bytes
pub const BINARY_HEADER_SIZE: usize = 12;

/// Binary framing codec
#[derive(Debug, Clone)]
pub struct BinaryParser {
    chunk_size: usize,
}

impl BinaryParser {
    /// Create a parser accepting content up to `chunk_size` bytes
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    fn encode_header(header: &FrameHeader, buf: &mut BytesMut) {
        buf.put_u8(header.proto);
        buf.put_u8(header.jmp);
        buf.put_u16(header.command.code());
        buf.put_u16(header.from_len);
        buf.put_u16(header.to_len);
        buf.put_u32(header.content_len);
    }

    fn decode_header(mut buf: &[u8]) -> Result<FrameHeader, WireError> {
        if buf.len() < BINARY_HEADER_SIZE {
            return Err(WireError::Incomplete {
                need: BINARY_HEADER_SIZE,
                have: buf.len(),
            });
        }
        Ok(FrameHeader {
            proto: buf.get_u8(),
            jmp: buf.get_u8(),
            command: Command(buf.get_u16()),
            from_len: buf.get_u16(),
            to_len: buf.get_u16(),
            content_len: buf.get_u32(),
        })
    }
}

impl Parser for BinaryParser {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn header_len(&self) -> usize {
        BINARY_HEADER_SIZE
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn form_message(&self, msg: &Message) -> Result<Bytes, WireError> {
        let header = FrameHeader::for_message(msg, self.chunk_size)?;
        let mut buf = BytesMut::with_capacity(BINARY_HEADER_SIZE + header.body_len());
        Self::encode_header(&header, &mut buf);
        put_body(&mut buf, msg);
        Ok(buf.freeze())
    }

    fn is_full_receive_msg(&self, buf: &[u8]) -> Result<usize, WireError> {
        let header = Self::decode_header(buf)?;
        header.validate(self.chunk_size)?;
        Ok(remaining(&header, BINARY_HEADER_SIZE, buf.len()))
    }

    fn parse_message(&self, buf: &[u8]) -> Result<Message, WireError> {
        let header = Self::decode_header(buf)?;
        header.validate(self.chunk_size)?;
        take_body(&header, BINARY_HEADER_SIZE, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_frame_layout() {
        let parser = BinaryParser::new(1024);
        let msg = Message::new("alice", "bob", Command(100), Bytes::from_static(b"hi"));
        let wire = parser.form_message(&msg).unwrap();

        assert_eq!(wire.len(), BINARY_HEADER_SIZE + 5 + 3 + 2);
        assert_eq!(&wire[..4], &[1, 3, 0, 100]);
        assert_eq!(&wire[BINARY_HEADER_SIZE..BINARY_HEADER_SIZE + 5], b"alice");

        let header = &wire[..BINARY_HEADER_SIZE];
        assert_eq!(parser.is_full_receive_msg(header).unwrap(), 10);
        assert_eq!(parser.is_full_receive_msg(&wire).unwrap(), 0);

        let parsed = parser.parse_message(&wire).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_binary_empty_payload_is_header_only_plus_ids() {
        let parser = BinaryParser::new(1024);
        let msg = Message::new("", "", Command::PING, Bytes::new());
        let wire = parser.form_message(&msg).unwrap();
        assert_eq!(wire.len(), BINARY_HEADER_SIZE);
        assert_eq!(parser.is_full_receive_msg(&wire).unwrap(), 0);
    }

    #[test]
    fn test_binary_rejects_bad_version() {
        let parser = BinaryParser::new(1024);
        let mut wire = parser
            .form_message(&Message::new("a", "0", Command::PING, Bytes::new()))
            .unwrap()
            .to_vec();
        wire[0] = 7;
        assert!(matches!(
            parser.is_full_receive_msg(&wire),
            Err(WireError::Version(7))
        ));
    }

    #[test]
    fn test_binary_rejects_truncated_and_trailing() {
        let parser = BinaryParser::new(1024);
        let wire = parser
            .form_message(&Message::new("a", "b", Command(20), Bytes::from_static(b"xyz")))
            .unwrap();

        assert!(matches!(
            parser.parse_message(&wire[..wire.len() - 1]),
            Err(WireError::Incomplete { .. })
        ));

        let mut longer = wire.to_vec();
        longer.push(0);
        assert!(matches!(
            parser.parse_message(&longer),
            Err(WireError::Malformed(_))
        ));
    }

    #[test]
    fn test_binary_rejects_invalid_utf8_identity() {
        let parser = BinaryParser::new(1024);
        let mut wire = parser
            .form_message(&Message::new("a", "b", Command(20), Bytes::new()))
            .unwrap()
            .to_vec();
        wire[BINARY_HEADER_SIZE] = 0xFF;
        assert!(matches!(parser.parse_message(&wire), Err(WireError::Utf8)));
    }

    #[test]
    fn test_binary_enforces_chunk_size_on_receive() {
        let sender = BinaryParser::new(1024);
        let receiver = BinaryParser::new(4);
        let wire = sender
            .form_message(&Message::new("a", "b", Command(20), Bytes::from_static(b"too long")))
            .unwrap();
        assert!(matches!(
            receiver.is_full_receive_msg(&wire[..BINARY_HEADER_SIZE]),
            Err(WireError::Size { size: 8, limit: 4 })
        ));
    }
}
