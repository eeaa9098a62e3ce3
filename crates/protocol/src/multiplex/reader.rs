//! Demultiplexing reader.

use std::io::{self, Read};

use logging::{Logger, info_log};

use super::io::recv_msg;
use crate::envelope::MessageCode;
use crate::error::RemoteError;

/// Reader that strips multiplex framing and returns only data-channel bytes.
///
/// Info frames are logged through the supplied [`Logger`] and skipped. An
/// error frame ends reading with an [`io::Error`] carrying a [`RemoteError`].
pub struct MuxReader<R> {
    inner: R,
    buffer: Vec<u8>,
    pos: usize,
    logger: Logger,
}

impl<R: Read> MuxReader<R> {
    /// Wraps `inner`.
    pub fn new(inner: R, logger: Logger) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(super::IO_BUFFER_SIZE),
            pos: 0,
            logger,
        }
    }

    /// Reference to the wrapped reader.
    pub const fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Reads frames until a non-empty data frame is buffered.
    fn fill(&mut self) -> io::Result<()> {
        loop {
            let code = recv_msg(&mut self.inner, &mut self.buffer)?;
            self.pos = 0;
            match code {
                MessageCode::Data if !self.buffer.is_empty() => return Ok(()),
                MessageCode::Data => {}
                MessageCode::Info => {
                    let text = String::from_utf8_lossy(&self.buffer);
                    info_log!(self.logger, Misc, 1, "{}", text.trim_end_matches('\n'));
                    self.buffer.clear();
                }
                MessageCode::Error => {
                    let error = RemoteError::new(&self.buffer);
                    self.buffer.clear();
                    return Err(error.into());
                }
            }
        }
    }
}

impl<R: Read> Read for MuxReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos >= self.buffer.len() {
            self.fill()?;
        }
        let available = &self.buffer[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}
