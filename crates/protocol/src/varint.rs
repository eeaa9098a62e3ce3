//! Fixed-width integer and byte-string primitives.
//!
//! Protocol 27 predates rsync's variable-length integers: every integer is a
//! little-endian `i32`, and 64-bit quantities use the `longint` escape where a
//! leading `-1` announces a full eight-byte value.

use std::io::{self, Read, Write};

use crate::error::ProtocolError;

/// Writes a single byte.
pub fn write_byte<W: Write + ?Sized>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

/// Reads a single byte.
pub fn read_byte<R: Read + ?Sized>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Writes a little-endian 32-bit integer.
pub fn write_int<W: Write + ?Sized>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Reads a little-endian 32-bit integer.
pub fn read_int<R: Read + ?Sized>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Writes a 64-bit integer using the protocol-27 `longint` format.
///
/// Values in `0..=0x7FFF_FFFF` are written as a plain `i32`. Everything else,
/// negative values included, is written as the `-1` marker followed by the
/// full little-endian `i64`.
pub fn write_longint<W: Write + ?Sized>(writer: &mut W, value: i64) -> io::Result<()> {
    if (0..=0x7FFF_FFFF).contains(&value) {
        writer.write_all(&(value as i32).to_le_bytes())
    } else {
        writer.write_all(&(-1i32).to_le_bytes())?;
        writer.write_all(&value.to_le_bytes())
    }
}

/// Reads a 64-bit integer written by [`write_longint`].
pub fn read_longint<R: Read + ?Sized>(reader: &mut R) -> io::Result<i64> {
    let first = read_int(reader)?;
    if first != -1 {
        return Ok(i64::from(first));
    }
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Writes `bytes` verbatim.
pub fn write_bytes<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes)
}

/// Reads exactly `len` bytes.
pub fn read_bytes<R: Read + ?Sized>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Writes an `i32` length followed by the bytes of `value`.
pub fn write_string<W: Write + ?Sized>(writer: &mut W, value: &[u8]) -> io::Result<()> {
    let len = i32::try_from(value.len()).map_err(|_| ProtocolError::TooLong {
        what: "string",
        len: value.len(),
        limit: i32::MAX as usize,
    })?;
    write_int(writer, len)?;
    writer.write_all(value)
}

/// Reads an `i32` length and that many bytes, rejecting negative lengths and
/// lengths above `limit`.
pub fn read_string<R: Read + ?Sized>(
    reader: &mut R,
    what: &'static str,
    limit: usize,
) -> io::Result<Vec<u8>> {
    let len = read_int(reader)?;
    let len = checked_len(len, what, limit)?;
    read_bytes(reader, len)
}

/// Validates a length read from the wire.
pub fn checked_len(len: i32, what: &'static str, limit: usize) -> io::Result<usize> {
    let Ok(len) = usize::try_from(len) else {
        return Err(ProtocolError::NegativeLength { what, len }.into());
    };
    if len > limit {
        return Err(ProtocolError::TooLong { what, len, limit }.into());
    }
    Ok(len)
}
