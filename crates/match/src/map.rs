//! Bounded read window over the file being matched.

use std::io::{self, Read, Seek, SeekFrom};

/// Smallest window, regardless of block length.
pub const MAX_MAP_SIZE: usize = 256 * 1024;

const ALIGN: u64 = 1024;

/// Window size used for a file matched with `block_length` blocks:
/// `max(3 * block_length, 256 KiB)` rounded up to a multiple of 1024.
#[must_use]
pub fn window_size(block_length: u32) -> usize {
    let wanted = (3 * u64::from(block_length)).max(MAX_MAP_SIZE as u64);
    (wanted.div_ceil(ALIGN) * ALIGN) as usize
}

/// A sliding window over a seekable source of known length.
///
/// [`read`](Self::read) serves any range inside the file. Ranges already
/// covered by the window are returned without I/O; anything else triggers a
/// refill that keeps the overlapping tail of the previous window.
#[derive(Debug)]
pub struct MapFile<R> {
    source: R,
    file_len: u64,
    default_window: usize,
    buffer: Vec<u8>,
    start: u64,
    /// Position of `source`, when known.
    cursor: Option<u64>,
}

impl<R: Read + Seek> MapFile<R> {
    /// Maps `source`, whose length is `file_len`, for matching blocks of
    /// `block_length` bytes.
    pub fn new(source: R, file_len: u64, block_length: u32) -> Self {
        Self {
            source,
            file_len,
            default_window: window_size(block_length),
            buffer: Vec::new(),
            start: 0,
            cursor: None,
        }
    }

    /// Length of the mapped file.
    pub const fn len(&self) -> u64 {
        self.file_len
    }

    /// Returns `true` for an empty file.
    pub const fn is_empty(&self) -> bool {
        self.file_len == 0
    }

    /// Current window as `(start, length)`.
    pub fn window(&self) -> (u64, usize) {
        (self.start, self.buffer.len())
    }

    /// Returns the `len` bytes at `offset`.
    ///
    /// Fails with `UnexpectedEof` if the range extends past the mapped length
    /// or the source turns out to be shorter than announced.
    pub fn read(&mut self, offset: u64, len: usize) -> io::Result<&[u8]> {
        let end = offset
            .checked_add(len as u64)
            .filter(|&end| end <= self.file_len)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("range {offset}+{len} beyond mapped length {}", self.file_len),
                )
            })?;

        let window_end = self.start + self.buffer.len() as u64;
        if offset < self.start || end > window_end {
            self.refill(offset, end)?;
        }
        let at = (offset - self.start) as usize;
        Ok(&self.buffer[at..at + len])
    }

    fn refill(&mut self, offset: u64, end: u64) -> io::Result<()> {
        let new_start = offset - offset % ALIGN;
        let mut new_end = (new_start + self.default_window as u64).min(self.file_len);
        if new_end < end {
            new_end = end;
        }

        let old_start = self.start;
        let old_end = old_start + self.buffer.len() as u64;
        let mut fresh = Vec::with_capacity((new_end - new_start) as usize);
        let mut fill_from = new_start;
        if new_start >= old_start && new_start < old_end {
            let keep_to = old_end.min(new_end);
            let from = (new_start - old_start) as usize;
            let to = (keep_to - old_start) as usize;
            fresh.extend_from_slice(&self.buffer[from..to]);
            fill_from = keep_to;
        }

        if fill_from < new_end {
            if self.cursor != Some(fill_from) {
                self.source.seek(SeekFrom::Start(fill_from))?;
            }
            let missing = (new_end - fill_from) as usize;
            let at = fresh.len();
            fresh.resize(at + missing, 0);
            if let Err(error) = self.source.read_exact(&mut fresh[at..]) {
                self.cursor = None;
                return Err(error);
            }
            self.cursor = Some(new_end);
        }

        self.buffer = fresh;
        self.start = new_start;
        Ok(())
    }

    /// Releases the window and returns the source.
    pub fn into_inner(self) -> R {
        self.source
    }
}
