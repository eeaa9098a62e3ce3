use super::error::EnvelopeError;
use super::message_code::MessageCode;
use super::{HEADER_LEN, MAX_PAYLOAD_LENGTH, MPLEX_BASE, PAYLOAD_MASK};

/// A decoded multiplexed message header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MessageHeader {
    code: MessageCode,
    payload_len: u32,
}

impl MessageHeader {
    /// Creates a header for `code`, rejecting payloads above
    /// [`MAX_PAYLOAD_LENGTH`].
    pub const fn new(code: MessageCode, payload_len: u32) -> Result<Self, EnvelopeError> {
        if payload_len > MAX_PAYLOAD_LENGTH {
            return Err(EnvelopeError::OversizedPayload(payload_len));
        }
        Ok(Self { code, payload_len })
    }

    /// Parses a header from the beginning of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < HEADER_LEN {
            return Err(EnvelopeError::TruncatedHeader {
                actual: bytes.len(),
            });
        }
        let mut encoded = [0u8; HEADER_LEN];
        encoded.copy_from_slice(&bytes[..HEADER_LEN]);
        Self::from_raw(u32::from_le_bytes(encoded))
    }

    /// Decodes the raw 32-bit header value.
    pub const fn from_raw(raw: u32) -> Result<Self, EnvelopeError> {
        let tag = (raw >> 24) as u8;
        if tag < MPLEX_BASE {
            return Err(EnvelopeError::InvalidTag(tag));
        }
        let code = tag - MPLEX_BASE;
        match MessageCode::from_u8(code) {
            Some(code) => Self::new(code, raw & PAYLOAD_MASK),
            None => Err(EnvelopeError::UnknownMessageCode(code)),
        }
    }

    /// Encodes the header in wire order.
    #[must_use]
    pub const fn encode(self) -> [u8; HEADER_LEN] {
        let tag = (MPLEX_BASE as u32) + (self.code as u32);
        ((tag << 24) | (self.payload_len & PAYLOAD_MASK)).to_le_bytes()
    }

    /// Message channel.
    #[must_use]
    pub const fn code(self) -> MessageCode {
        self.code
    }

    /// Payload length in bytes.
    #[must_use]
    pub const fn payload_len(self) -> usize {
        self.payload_len as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_header_layout() {
        let header = MessageHeader::new(MessageCode::Data, 4).unwrap();
        assert_eq!(header.encode(), [4, 0, 0, 7]);
        assert_eq!(MessageHeader::decode(&[4, 0, 0, 7]).unwrap(), header);
    }

    #[test]
    fn error_and_info_tags() {
        assert_eq!(MessageHeader::decode(&[0, 0, 0, 8]).unwrap().code(), MessageCode::Error);
        assert_eq!(MessageHeader::decode(&[0, 0, 0, 9]).unwrap().code(), MessageCode::Info);
    }

    #[test]
    fn rejects_bad_headers() {
        assert_eq!(
            MessageHeader::decode(&[0, 0, 0, 6]),
            Err(EnvelopeError::InvalidTag(6))
        );
        assert_eq!(
            MessageHeader::decode(&[0, 0, 0, 10]),
            Err(EnvelopeError::UnknownMessageCode(3))
        );
        assert_eq!(
            MessageHeader::decode(&[1, 0, 4, 7]),
            Err(EnvelopeError::OversizedPayload(0x0004_0001))
        );
        assert_eq!(
            MessageHeader::decode(&[1, 2]),
            Err(EnvelopeError::TruncatedHeader { actual: 2 })
        );
    }

    #[test]
    fn max_payload_is_accepted() {
        let raw = (7u32 << 24) | MAX_PAYLOAD_LENGTH;
        assert_eq!(
            MessageHeader::from_raw(raw).unwrap().payload_len(),
            MAX_PAYLOAD_LENGTH as usize
        );
    }
}
