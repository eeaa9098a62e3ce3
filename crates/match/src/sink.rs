//! Destinations for the tokens produced by a search.

use std::io::{self, Write};

use protocol::wire::{write_copy, write_end, write_literal};

/// Receives the delta for one file in file order.
pub trait TokenSink {
    /// Bytes the receiver does not have.
    fn literal(&mut self, data: &[u8]) -> io::Result<()>;

    /// Block `index` of the receiver's basis file, `len` bytes long.
    fn copy(&mut self, index: u32, len: u32) -> io::Result<()>;

    /// No more tokens for this file.
    fn end(&mut self) -> io::Result<()>;
}

/// Encodes tokens onto the wire.
#[derive(Debug)]
pub struct WireTokenSink<'a, W: ?Sized> {
    writer: &'a mut W,
}

impl<'a, W: Write + ?Sized> WireTokenSink<'a, W> {
    /// Writes tokens to `writer`.
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<W: Write + ?Sized> TokenSink for WireTokenSink<'_, W> {
    fn literal(&mut self, data: &[u8]) -> io::Result<()> {
        write_literal(self.writer, data)
    }

    fn copy(&mut self, index: u32, _len: u32) -> io::Result<()> {
        write_copy(self.writer, index)
    }

    fn end(&mut self) -> io::Result<()> {
        write_end(self.writer)
    }
}

/// One token kept by a [`TokenRecorder`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RecordedToken {
    /// Literal bytes.
    Literal(Vec<u8>),
    /// Block index.
    Copy(u32),
    /// End of file.
    End,
}

/// Keeps tokens in memory. Adjacent literals are merged.
#[derive(Clone, Debug, Default)]
pub struct TokenRecorder {
    /// Tokens in emission order.
    pub tokens: Vec<RecordedToken>,
}

impl TokenSink for TokenRecorder {
    fn literal(&mut self, data: &[u8]) -> io::Result<()> {
        if let Some(RecordedToken::Literal(pending)) = self.tokens.last_mut() {
            pending.extend_from_slice(data);
        } else if !data.is_empty() {
            self.tokens.push(RecordedToken::Literal(data.to_vec()));
        }
        Ok(())
    }

    fn copy(&mut self, index: u32, _len: u32) -> io::Result<()> {
        self.tokens.push(RecordedToken::Copy(index));
        Ok(())
    }

    fn end(&mut self) -> io::Result<()> {
        self.tokens.push(RecordedToken::End);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::wire::{Token, TokenReader, CHUNK_SIZE};
    use std::io::Cursor;

    #[test]
    fn wire_sink_chunks_long_literals() {
        let mut out = Vec::new();
        let mut sink = WireTokenSink::new(&mut out);
        sink.literal(&vec![9u8; CHUNK_SIZE + 3]).expect("literal");
        sink.copy(2, 700).expect("copy");
        sink.end().expect("end");

        let mut cursor = Cursor::new(out);
        let mut reader = TokenReader::new();
        let mut lengths = Vec::new();
        loop {
            match reader.next_token(&mut cursor).expect("token") {
                Token::Literal(data) => lengths.push(data.len()),
                Token::Copy(index) => assert_eq!(index, 2),
                Token::End => break,
            }
        }
        assert_eq!(lengths, [CHUNK_SIZE, 3]);
    }

    #[test]
    fn recorder_merges_adjacent_literals() {
        let mut recorder = TokenRecorder::default();
        recorder.literal(b"ab").expect("literal");
        recorder.literal(b"cd").expect("literal");
        recorder.copy(0, 700).expect("copy");
        recorder.literal(b"").expect("literal");
        recorder.end().expect("end");
        assert_eq!(
            recorder.tokens,
            [
                RecordedToken::Literal(b"abcd".to_vec()),
                RecordedToken::Copy(0),
                RecordedToken::End
            ]
        );
    }
}
