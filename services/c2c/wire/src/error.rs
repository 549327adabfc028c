//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Buffer shorter than the codec needs
    #[error("incomplete frame: need {need} bytes, have {have}")]
    Incomplete {
        /// Bytes required
        need: usize,
        /// Bytes available
        have: usize,
    },

    /// Unsupported protocol version
    #[error("version unsupported: {0}")]
    Version(u8),

    /// Content exceeds the chunk size policy
    #[error("size limit exceeded: {size} > {limit}")]
    Size {
        /// Offending size
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// Identity field longer than the header can describe
    #[error("identity too long: {0} bytes")]
    IdentityLen(usize),

    /// Identity is not valid UTF-8
    #[error("identity is not valid utf-8")]
    Utf8,

    /// Malformed frame structure
    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    /// I/O failure while reading a header from the stream
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
