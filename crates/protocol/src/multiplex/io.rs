use std::io::{self, Read, Write};

use crate::envelope::{HEADER_LEN, MAX_PAYLOAD_LENGTH, MessageCode, MessageHeader};
use crate::error::ProtocolError;

/// Writes one frame. Payloads above [`MAX_PAYLOAD_LENGTH`] are rejected with
/// [`io::ErrorKind::InvalidInput`].
pub fn send_msg<W: Write + ?Sized>(
    writer: &mut W,
    code: MessageCode,
    payload: &[u8],
) -> io::Result<()> {
    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    let header = MessageHeader::new(code, len).map_err(|error| {
        io::Error::new(io::ErrorKind::InvalidInput, ProtocolError::from(error))
    })?;
    writer.write_all(&header.encode())?;
    if !payload.is_empty() {
        writer.write_all(payload)?;
    }
    Ok(())
}

/// Reads one frame header and its payload into `buffer`, returning the code.
///
/// Malformed headers, unknown codes and oversized payloads are reported as
/// [`io::ErrorKind::InvalidData`].
pub fn recv_msg<R: Read + ?Sized>(reader: &mut R, buffer: &mut Vec<u8>) -> io::Result<MessageCode> {
    let mut raw = [0u8; HEADER_LEN];
    reader.read_exact(&mut raw)?;
    let header = MessageHeader::decode(&raw).map_err(ProtocolError::from)?;

    buffer.clear();
    buffer.resize(header.payload_len(), 0);
    reader.read_exact(buffer)?;
    Ok(header.code())
}

/// Upper bound for one frame's payload.
pub(super) const MAX_FRAME: usize = MAX_PAYLOAD_LENGTH as usize;
