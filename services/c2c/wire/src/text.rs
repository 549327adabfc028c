//! ASCII framing with a fixed-width hex header.
//!
//! ```text
//! $ VV JJ CCCC FFFF TTTT LLLLLLLL #
//! | |  |  |    |    |    |        +-- terminator
//! | |  |  |    |    |    +----------- content length
//! | |  |  |    |    +---------------- destination length
//! | |  |  |    +--------------------- source length
//! | |  |  +-------------------------- command
//! | |  +----------------------------- hop limit
//! | +-------------------------------- version
//! +---------------------------------- start marker
//! ```
//!
//! Fields are upper-case hex without separators, followed by the body.

use crate::codec::{put_body, remaining, take_body, FrameHeader, Parser};
use crate::error::WireError;
use crate::message::{Command, Message};
use bytes::{BufMut, Bytes, BytesMut};

/// Text header size in bytes
pub const TEXT_HEADER_SIZE: usize = 26;

const START: u8 = b'$';
const END: u8 = b'#';

/// Text framing codec
#[derive(Debug, Clone)]
pub struct TextParser {
    chunk_size: usize,
}

impl TextParser {
    /// Create a parser accepting content up to `chunk_size` bytes
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    fn encode_header(header: &FrameHeader, buf: &mut BytesMut) {
        let line = format!(
            "${:02X}{:02X}{:04X}{:04X}{:04X}{:08X}#",
            header.proto,
            header.jmp,
            header.command.code(),
            header.from_len,
            header.to_len,
            header.content_len
        );
        buf.put_slice(line.as_bytes());
    }

    fn decode_header(buf: &[u8]) -> Result<FrameHeader, WireError> {
        if buf.len() < TEXT_HEADER_SIZE {
            return Err(WireError::Incomplete {
                need: TEXT_HEADER_SIZE,
                have: buf.len(),
            });
        }
        if buf[0] != START || buf[TEXT_HEADER_SIZE - 1] != END {
            return Err(WireError::Malformed("missing header delimiters"));
        }

        let fields = std::str::from_utf8(&buf[1..TEXT_HEADER_SIZE - 1])
            .map_err(|_| WireError::Malformed("non-ascii header"))?;

        Ok(FrameHeader {
            proto: hex_field(fields, 0, 2)? as u8,
            jmp: hex_field(fields, 2, 2)? as u8,
            command: Command(hex_field(fields, 4, 4)? as u16),
            from_len: hex_field(fields, 8, 4)? as u16,
            to_len: hex_field(fields, 12, 4)? as u16,
            content_len: hex_field(fields, 16, 8)?,
        })
    }
}

fn hex_field(fields: &str, start: usize, width: usize) -> Result<u32, WireError> {
    let digits = fields
        .get(start..start + width)
        .ok_or(WireError::Malformed("short header field"))?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(WireError::Malformed("invalid hex in header"));
    }
    u32::from_str_radix(digits, 16).map_err(|_| WireError::Malformed("invalid hex in header"))
}

impl Parser for TextParser {
    fn name(&self) -> &'static str {
        "text"
    }

    fn header_len(&self) -> usize {
        TEXT_HEADER_SIZE
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn form_message(&self, msg: &Message) -> Result<Bytes, WireError> {
        let header = FrameHeader::for_message(msg, self.chunk_size)?;
        let mut buf = BytesMut::with_capacity(TEXT_HEADER_SIZE + header.body_len());
        Self::encode_header(&header, &mut buf);
        put_body(&mut buf, msg);
        Ok(buf.freeze())
    }

    fn is_full_receive_msg(&self, buf: &[u8]) -> Result<usize, WireError> {
        let header = Self::decode_header(buf)?;
        header.validate(self.chunk_size)?;
        Ok(remaining(&header, TEXT_HEADER_SIZE, buf.len()))
    }

    fn parse_message(&self, buf: &[u8]) -> Result<Message, WireError> {
        let header = Self::decode_header(buf)?;
        header.validate(self.chunk_size)?;
        take_body(&header, TEXT_HEADER_SIZE, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_header_is_readable() {
        let parser = TextParser::new(1024);
        let msg = Message::new("alice", "0", Command::REGISTER, Bytes::from_static(b"cred"));
        let wire = parser.form_message(&msg).unwrap();

        assert_eq!(&wire[..TEXT_HEADER_SIZE], b"$010300030005000100000004#");
        assert_eq!(&wire[TEXT_HEADER_SIZE..], b"alice0cred");
        assert_eq!(parser.parse_message(&wire).unwrap(), msg);
    }

    #[test]
    fn test_text_remaining_bytes() {
        let parser = TextParser::new(1024);
        let msg = Message::new("bob", "alice", Command(100), Bytes::from_static(b"payload"));
        let wire = parser.form_message(&msg).unwrap();

        assert_eq!(
            parser.is_full_receive_msg(&wire[..TEXT_HEADER_SIZE]).unwrap(),
            3 + 5 + 7
        );
        assert_eq!(parser.is_full_receive_msg(&wire[..TEXT_HEADER_SIZE + 4]).unwrap(), 11);
        assert_eq!(parser.is_full_receive_msg(&wire).unwrap(), 0);
    }

    #[test]
    fn test_text_rejects_garbage_header() {
        let parser = TextParser::new(1024);
        let garbage = [b'x'; TEXT_HEADER_SIZE];
        assert!(matches!(
            parser.is_full_receive_msg(&garbage),
            Err(WireError::Malformed(_))
        ));

        let mut bad_hex = *b"$0103000300050001000000zz#";
        assert!(parser.is_full_receive_msg(&bad_hex).is_err());
        bad_hex[1] = b'+';
        assert!(parser.is_full_receive_msg(&bad_hex).is_err());
    }

    #[test]
    fn test_text_rejects_short_header() {
        let parser = TextParser::new(1024);
        assert!(matches!(
            parser.is_full_receive_msg(b"$0103"),
            Err(WireError::Incomplete { need: TEXT_HEADER_SIZE, have: 5 })
        ));
    }
}
