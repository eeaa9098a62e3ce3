use std::io::{self, Write};

use super::io::{MAX_FRAME, send_msg};
use crate::envelope::MessageCode;

/// Bytes of data buffered before a data frame is emitted.
pub const IO_BUFFER_SIZE: usize = 32 * 1024;

/// Buffering writer that wraps data in [`MessageCode::Data`] frames.
///
/// Data accumulates until [`IO_BUFFER_SIZE`] bytes are pending or the writer
/// is flushed. Out-of-band messages go through
/// [`send_message`](Self::send_message), which emits pending data first so
/// the peer sees both channels in write order.
pub struct MuxWriter<W: Write> {
    inner: W,
    pending: Vec<u8>,
}

impl<W: Write> MuxWriter<W> {
    /// Wraps `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(IO_BUFFER_SIZE),
        }
    }

    /// Sends `payload` on channel `code`, splitting it into maximum-size
    /// frames when necessary.
    pub fn send_message(&mut self, code: MessageCode, payload: &[u8]) -> io::Result<()> {
        self.emit_pending()?;
        for chunk in payload.chunks(MAX_FRAME) {
            send_msg(&mut self.inner, code, chunk)?;
        }
        self.inner.flush()
    }

    /// Reference to the wrapped writer.
    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Returns the wrapped writer. Pending data is written first.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.emit_pending()?;
        Ok(self.inner)
    }

    fn emit_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        send_msg(&mut self.inner, MessageCode::Data, &self.pending)?;
        self.pending.clear();
        Ok(())
    }
}

impl<W: Write> Write for MuxWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let room = IO_BUFFER_SIZE - self.pending.len();
        let take = room.min(buf.len());
        self.pending.extend_from_slice(&buf[..take]);
        if self.pending.len() == IO_BUFFER_SIZE {
            self.emit_pending()?;
        }
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit_pending()?;
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiplex::recv_msg;
    use std::io::Cursor;

    fn frames(stream: &[u8]) -> Vec<(MessageCode, Vec<u8>)> {
        let mut cursor = Cursor::new(stream);
        let mut out = Vec::new();
        while (cursor.position() as usize) < stream.len() {
            let mut payload = Vec::new();
            let code = recv_msg(&mut cursor, &mut payload).unwrap();
            out.push((code, payload));
        }
        out
    }

    #[test]
    fn small_writes_coalesce_until_flush() {
        let mut writer = MuxWriter::new(Vec::new());
        writer.write_all(b"abc").unwrap();
        writer.write_all(b"def").unwrap();
        assert!(writer.get_ref().is_empty());
        writer.flush().unwrap();

        let frames = frames(writer.get_ref());
        assert_eq!(frames, vec![(MessageCode::Data, b"abcdef".to_vec())]);
    }

    #[test]
    fn full_buffer_emits_frame() {
        let mut writer = MuxWriter::new(Vec::new());
        writer.write_all(&vec![1u8; IO_BUFFER_SIZE + 10]).unwrap();
        writer.flush().unwrap();

        let frames = frames(writer.get_ref());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].1.len(), IO_BUFFER_SIZE);
        assert_eq!(frames[1].1.len(), 10);
    }

    #[test]
    fn messages_follow_pending_data() {
        let mut writer = MuxWriter::new(Vec::new());
        writer.write_all(b"data").unwrap();
        writer.send_message(MessageCode::Error, b"boom\n").unwrap();

        let frames = frames(writer.get_ref());
        assert_eq!(frames[0], (MessageCode::Data, b"data".to_vec()));
        assert_eq!(frames[1], (MessageCode::Error, b"boom\n".to_vec()));
    }
}
