//! Multiplexed message envelope.
//!
//! Every multiplexed frame starts with a four-byte little-endian header: the
//! high byte is `MPLEX_BASE + code` and the low 24 bits carry the payload
//! length.

mod error;
mod header;
mod message_code;

pub use error::EnvelopeError;
pub use header::MessageHeader;
pub use message_code::MessageCode;

/// Size of an encoded header.
pub const HEADER_LEN: usize = 4;

/// Offset added to a message code to form the header tag byte.
pub const MPLEX_BASE: u8 = 7;

/// Largest payload accepted in a single frame (256 KiB).
pub const MAX_PAYLOAD_LENGTH: u32 = 256 * 1024;

pub(crate) const PAYLOAD_MASK: u32 = 0x00FF_FFFF;
