//! Connection halves that start plain and can switch to multiplexed framing.

use std::io::{self, Read, Write};

use logging::Logger;

use super::reader::MuxReader;
use super::writer::MuxWriter;
use crate::envelope::MessageCode;

/// Write half of a connection.
pub enum WireWriter<W: Write> {
    /// Bytes go to the stream unframed.
    Plain(W),
    /// Bytes are wrapped in data frames.
    Multiplex(MuxWriter<W>),
}

impl<W: Write> WireWriter<W> {
    /// Starts in plain mode.
    pub const fn plain(writer: W) -> Self {
        Self::Plain(writer)
    }

    /// Switches to multiplexed output.
    pub fn activate_multiplex(self) -> io::Result<Self> {
        match self {
            Self::Plain(writer) => Ok(Self::Multiplex(MuxWriter::new(writer))),
            Self::Multiplex(_) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "multiplex already active",
            )),
        }
    }

    /// Returns `true` once multiplexing is active.
    pub const fn is_multiplexed(&self) -> bool {
        matches!(self, Self::Multiplex(_))
    }

    /// Sends an out-of-band message. Returns `false` without writing when the
    /// stream is not multiplexed, since a plain stream has no side channel.
    pub fn send_message(&mut self, code: MessageCode, payload: &[u8]) -> io::Result<bool> {
        match self {
            Self::Plain(_) => Ok(false),
            Self::Multiplex(writer) => writer.send_message(code, payload).map(|()| true),
        }
    }

    /// Reports `message` on the error channel if possible.
    pub fn send_error(&mut self, message: &str) -> io::Result<bool> {
        let mut payload = message.as_bytes().to_vec();
        if !payload.ends_with(b"\n") {
            payload.push(b'\n');
        }
        self.send_message(MessageCode::Error, &payload)
    }
}

impl<W: Write> Write for WireWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(writer) => writer.write(buf),
            Self::Multiplex(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(writer) => writer.flush(),
            Self::Multiplex(writer) => writer.flush(),
        }
    }
}

/// Read half of a connection.
pub enum WireReader<R: Read> {
    /// Bytes are read unframed.
    Plain(R),
    /// Frames are demultiplexed.
    Multiplex(MuxReader<R>),
}

impl<R: Read> WireReader<R> {
    /// Starts in plain mode.
    pub const fn plain(reader: R) -> Self {
        Self::Plain(reader)
    }

    /// Switches to demultiplexed input. Info frames are logged to `logger`.
    pub fn activate_multiplex(self, logger: Logger) -> io::Result<Self> {
        match self {
            Self::Plain(reader) => Ok(Self::Multiplex(MuxReader::new(reader, logger))),
            Self::Multiplex(_) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "multiplex already active",
            )),
        }
    }

    /// Returns `true` once multiplexing is active.
    pub const fn is_multiplexed(&self) -> bool {
        matches!(self, Self::Multiplex(_))
    }
}

impl<R: Read> Read for WireReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(reader) => reader.read(buf),
            Self::Multiplex(reader) => reader.read(buf),
        }
    }
}
