//! The byte stream a session runs over.
//!
//! A [`Connection`] owns both halves of the transport, buffers them, counts
//! the raw bytes crossing each direction and switches either half to
//! multiplexed framing once the binary phase starts.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use logging::Logger;
use protocol::{WireReader, WireWriter};

use crate::error::TransferError;

/// Shared count of bytes that crossed one direction of the transport.
#[derive(Clone, Debug, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    /// Bytes counted so far.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, amount: usize) {
        self.0.fetch_add(amount as u64, Ordering::Relaxed);
    }
}

/// Counts the bytes read from the wrapped transport.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    count: ByteCounter,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.add(n);
        Ok(n)
    }
}

/// Counts the bytes written to the wrapped transport.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    count: ByteCounter,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count.add(n);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Read half of a [`Connection`].
pub type ConnectionReader<R> = WireReader<BufReader<CountingReader<R>>>;

/// Write half of a [`Connection`].
pub type ConnectionWriter<W> = WireWriter<BufWriter<CountingWriter<W>>>;

/// Both halves of a session's transport.
pub struct Connection<R: Read, W: Write> {
    reader: ConnectionReader<R>,
    writer: ConnectionWriter<W>,
    read_count: ByteCounter,
    write_count: ByteCounter,
}

impl<R: Read, W: Write> Connection<R, W> {
    /// Wraps a transport. Both halves start plain.
    pub fn new(reader: R, writer: W) -> Self {
        let read_count = ByteCounter::default();
        let write_count = ByteCounter::default();
        let reader = CountingReader {
            inner: reader,
            count: read_count.clone(),
        };
        let writer = CountingWriter {
            inner: writer,
            count: write_count.clone(),
        };
        Self {
            reader: WireReader::plain(BufReader::new(reader)),
            writer: WireWriter::plain(BufWriter::new(writer)),
            read_count,
            write_count,
        }
    }

    /// Frames everything written from now on. Servers do this once the
    /// checksum seed has been sent.
    pub fn multiplex_output(self) -> io::Result<Self> {
        let Self {
            reader,
            writer,
            read_count,
            write_count,
        } = self;
        Ok(Self {
            reader,
            writer: writer.activate_multiplex()?,
            read_count,
            write_count,
        })
    }

    /// Demultiplexes everything read from now on. Clients do this once the
    /// checksum seed has been read; info messages from the peer go to
    /// `logger`.
    pub fn multiplex_input(self, logger: Logger) -> io::Result<Self> {
        let Self {
            reader,
            writer,
            read_count,
            write_count,
        } = self;
        Ok(Self {
            reader: reader.activate_multiplex(logger)?,
            writer,
            read_count,
            write_count,
        })
    }

    /// The read half.
    pub fn reader(&mut self) -> &mut ConnectionReader<R> {
        &mut self.reader
    }

    /// The write half.
    pub fn writer(&mut self) -> &mut ConnectionWriter<W> {
        &mut self.writer
    }

    /// Both halves at once, for roles that read and write concurrently.
    pub fn split(&mut self) -> (&mut ConnectionReader<R>, &mut ConnectionWriter<W>) {
        (&mut self.reader, &mut self.writer)
    }

    /// Raw bytes read from the transport so far.
    pub fn bytes_read(&self) -> u64 {
        self.read_count.get()
    }

    /// Raw bytes written to the transport so far.
    pub fn bytes_written(&self) -> u64 {
        self.write_count.get()
    }

    /// Tells the peer about a fatal `error` over the error channel.
    ///
    /// Nothing is sent when the output is not multiplexed, when the error
    /// came from the peer in the first place or when the session was
    /// cancelled by the other half. Failures to deliver the message are
    /// ignored; the connection is going away either way.
    pub fn report_error(&mut self, error: &TransferError) {
        if matches!(error, TransferError::Remote(_) | TransferError::Cancelled) {
            return;
        }
        if let Ok(true) = self.writer.send_error(&error.to_string()) {
            let _ = self.writer.flush();
        }
    }
}
