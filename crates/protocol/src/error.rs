//! Protocol-level error types.
//!
//! Codec functions return [`std::io::Result`]; malformed input is reported as
//! [`io::ErrorKind::InvalidData`] wrapping a [`ProtocolError`] so callers can
//! recover the precise cause with [`ProtocolError::from_io`].

use std::io;

use thiserror::Error;

use crate::envelope::EnvelopeError;

/// Violations of the protocol-27 wire format.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProtocolError {
    /// A multiplexed header could not be decoded.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// A sum head carried values outside the allowed ranges.
    #[error("invalid sum head: {0}")]
    InvalidSumHead(String),
    /// A file-list entry could not be decoded.
    #[error("malformed file list entry: {0}")]
    MalformedEntry(String),
    /// A received path is absolute or escapes the destination.
    #[error("unsafe path in file list: {0:?}")]
    UnsafePath(String),
    /// A name or string exceeded the allowed length.
    #[error("{what} length {len} exceeds limit {limit}")]
    TooLong {
        /// What was being read.
        what: &'static str,
        /// Length announced by the peer.
        len: usize,
        /// Maximum accepted.
        limit: usize,
    },
    /// A negative length was announced.
    #[error("negative {what} length {len}")]
    NegativeLength {
        /// What was being read.
        what: &'static str,
        /// Value on the wire.
        len: i32,
    },
    /// A file index outside the file list was received.
    #[error("file index {index} out of range (list has {len} entries)")]
    InvalidIndex {
        /// Index received.
        index: i32,
        /// Number of entries in the list.
        len: usize,
    },
    /// A sentinel arrived where it is not allowed.
    #[error("unexpected {0}")]
    Unexpected(String),
    /// The daemon greeting line could not be understood.
    #[error("malformed greeting {0:?}")]
    MalformedGreeting(String),
    /// The peer speaks a protocol older than 27.
    #[error("protocol version mismatch: peer speaks {0}, need at least 27")]
    UnsupportedVersion(i32),
}

impl ProtocolError {
    /// Extracts a `ProtocolError` carried inside an I/O error, if any.
    pub fn from_io(error: &io::Error) -> Option<&Self> {
        error.get_ref().and_then(|inner| inner.downcast_ref::<Self>())
    }
}

impl From<ProtocolError> for io::Error {
    fn from(error: ProtocolError) -> Self {
        Self::new(io::ErrorKind::InvalidData, error)
    }
}

/// Error text the peer sent on the error channel.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("remote error: {message}")]
pub struct RemoteError {
    message: String,
}

impl RemoteError {
    /// Wraps a message received on the error channel.
    pub fn new(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        Self {
            message: text.trim_end_matches('\n').to_string(),
        }
    }

    /// The message without its trailing newline.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Extracts a `RemoteError` carried inside an I/O error, if any.
    pub fn from_io(error: &io::Error) -> Option<&Self> {
        error.get_ref().and_then(|inner| inner.downcast_ref::<Self>())
    }
}

impl From<RemoteError> for io::Error {
    fn from(error: RemoteError) -> Self {
        Self::other(error)
    }
}
