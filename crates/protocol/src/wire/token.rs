//! Delta token stream.
//!
//! Each token is one little-endian `i32`:
//!
//! | value      | meaning                                         |
//! |------------|-------------------------------------------------|
//! | `n > 0`    | `n` literal bytes follow                         |
//! | `-(i + 1)` | copy block `i` of the receiver's basis file     |
//! | `0`        | end of file                                     |
//!
//! The sign overloading only exists on the wire; [`TokenReader`] turns it
//! into a [`Token`] straight away.

use std::io::{self, Read, Write};

use crate::varint::{read_int, write_int};

/// Largest literal run written under one token.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// A decoded delta token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Token {
    /// Literal bytes to append.
    Literal(Vec<u8>),
    /// Copy block `index` from the basis file.
    Copy(u32),
    /// End of the token stream for this file.
    End,
}

impl Token {
    /// Encodes the token.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Self::Literal(data) => write_literal(writer, data),
            Self::Copy(index) => write_copy(writer, *index),
            Self::End => write_end(writer),
        }
    }
}

/// Writes `data` as literal tokens of at most [`CHUNK_SIZE`] bytes.
pub fn write_literal<W: Write + ?Sized>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    for chunk in data.chunks(CHUNK_SIZE) {
        write_int(writer, chunk.len() as i32)?;
        writer.write_all(chunk)?;
    }
    Ok(())
}

/// Writes a copy token for block `index`.
pub fn write_copy<W: Write + ?Sized>(writer: &mut W, index: u32) -> io::Result<()> {
    let index = i32::try_from(index).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "block index exceeds i32 range")
    })?;
    write_int(writer, -(index + 1))
}

/// Writes the end-of-file token.
pub fn write_end<W: Write + ?Sized>(writer: &mut W) -> io::Result<()> {
    write_int(writer, 0)
}

/// Decodes tokens, splitting long literal runs into [`CHUNK_SIZE`] pieces.
///
/// A peer may announce a literal longer than one chunk; the remainder is kept
/// as residue and returned by subsequent calls before the next token header is
/// read.
#[derive(Debug, Default)]
pub struct TokenReader {
    residue: usize,
}

impl TokenReader {
    /// Creates a reader positioned at a token boundary.
    pub const fn new() -> Self {
        Self { residue: 0 }
    }

    /// Reads the next token.
    pub fn next_token<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<Token> {
        if self.residue == 0 {
            let value = read_int(reader)?;
            if value == 0 {
                return Ok(Token::End);
            }
            if value < 0 {
                // -(i + 1) for i in 0..=i32::MAX - 1; i32::MIN maps to i32::MAX.
                let index = (-(i64::from(value) + 1)) as u32;
                return Ok(Token::Copy(index));
            }
            self.residue = value as usize;
        }

        let len = self.residue.min(CHUNK_SIZE);
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        self.residue -= len;
        Ok(Token::Literal(data))
    }
}
