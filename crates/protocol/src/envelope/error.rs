use ::core::fmt;

use super::{HEADER_LEN, MAX_PAYLOAD_LENGTH};

/// Failures encountered while parsing or constructing multiplexed message headers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EnvelopeError {
    /// Fewer than [`HEADER_LEN`] bytes were provided.
    TruncatedHeader {
        /// Number of bytes that were available.
        actual: usize,
    },
    /// The tag byte was below [`super::MPLEX_BASE`].
    InvalidTag(u8),
    /// The message code is not one of the protocol-27 channels.
    UnknownMessageCode(u8),
    /// The payload length exceeded [`MAX_PAYLOAD_LENGTH`].
    OversizedPayload(u32),
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedHeader { actual } => write!(
                f,
                "multiplexed header truncated: expected {HEADER_LEN} bytes, got {actual}"
            ),
            Self::InvalidTag(tag) => {
                write!(f, "multiplexed header contained invalid tag byte {tag}")
            }
            Self::UnknownMessageCode(code) => {
                write!(f, "unknown multiplexed message code {code}")
            }
            Self::OversizedPayload(len) => write!(
                f,
                "multiplexed payload length {len} exceeds maximum {MAX_PAYLOAD_LENGTH}"
            ),
        }
    }
}

impl std::error::Error for EnvelopeError {}
