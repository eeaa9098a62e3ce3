//! Sum head and block signatures sent from the generator to the sender.
//!
//! A [`SumHead`] is four little-endian `i32`s: block count, block length,
//! strong-sum length and the length of the final short block. It is followed
//! by `count` pairs of a weak checksum (`i32`) and a strong checksum truncated
//! to the announced length.

use std::io::{self, Read, Write};

use crate::error::ProtocolError;
use crate::varint::{read_int, write_int};

/// Largest block length a peer may announce.
pub const MAX_BLOCK_SIZE: u32 = 1 << 29;

/// Longest strong checksum, the full MD4 digest.
pub const MAX_SUM_LENGTH: u32 = 16;

/// Block layout for one file's signature.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SumHead {
    /// Number of blocks.
    pub count: u32,
    /// Bytes per block.
    pub block_length: u32,
    /// Bytes of each strong checksum that are transmitted.
    pub checksum_length: u32,
    /// Length of the final block when it is short, zero otherwise.
    pub remainder: u32,
}

impl SumHead {
    /// The head sent when the generator wants the whole file.
    pub const EMPTY: Self = Self {
        count: 0,
        block_length: 0,
        checksum_length: 0,
        remainder: 0,
    };

    /// Returns `true` when no blocks are announced.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Length of block `index`.
    pub const fn block_len(&self, index: u32) -> u32 {
        if self.remainder != 0 && index + 1 == self.count {
            self.remainder
        } else {
            self.block_length
        }
    }

    /// File offset of block `index`.
    pub const fn offset(&self, index: u32) -> u64 {
        index as u64 * self.block_length as u64
    }

    /// Total file length described by the layout.
    pub const fn file_length(&self) -> u64 {
        if self.count == 0 {
            return 0;
        }
        self.offset(self.count - 1) + self.block_len(self.count - 1) as u64
    }

    /// Checks the invariants a received head must satisfy.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.block_length > MAX_BLOCK_SIZE {
            return Err(ProtocolError::InvalidSumHead(format!(
                "block length {} exceeds {MAX_BLOCK_SIZE}",
                self.block_length
            )));
        }
        if self.checksum_length > MAX_SUM_LENGTH {
            return Err(ProtocolError::InvalidSumHead(format!(
                "checksum length {} exceeds {MAX_SUM_LENGTH}",
                self.checksum_length
            )));
        }
        if self.remainder > self.block_length {
            return Err(ProtocolError::InvalidSumHead(format!(
                "remainder {} exceeds block length {}",
                self.remainder, self.block_length
            )));
        }
        if self.count > 0 && self.block_length == 0 {
            return Err(ProtocolError::InvalidSumHead(format!(
                "{} blocks of length zero",
                self.count
            )));
        }
        Ok(())
    }
}

/// One block's signature.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SumBuf {
    /// Block number.
    pub index: u32,
    /// Offset of the block in the basis file.
    pub offset: u64,
    /// Block length.
    pub len: u32,
    /// Weak rolling checksum.
    pub sum1: u32,
    /// Strong checksum; only the first `checksum_length` bytes are meaningful.
    pub sum2: [u8; MAX_SUM_LENGTH as usize],
}

impl SumBuf {
    /// The transmitted prefix of the strong checksum.
    pub fn strong(&self, checksum_length: u32) -> &[u8] {
        &self.sum2[..checksum_length as usize]
    }
}

/// Writes a sum head.
pub fn write_sum_head<W: Write + ?Sized>(writer: &mut W, head: &SumHead) -> io::Result<()> {
    for value in [
        head.count,
        head.block_length,
        head.checksum_length,
        head.remainder,
    ] {
        let value = i32::try_from(value).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "sum head field exceeds i32")
        })?;
        write_int(writer, value)?;
    }
    Ok(())
}

/// Reads and validates a sum head. Out-of-range values are rejected, never
/// clamped.
pub fn read_sum_head<R: Read + ?Sized>(reader: &mut R) -> io::Result<SumHead> {
    let mut field = |name: &str| -> io::Result<u32> {
        let value = read_int(reader)?;
        u32::try_from(value).map_err(|_| {
            ProtocolError::InvalidSumHead(format!("negative {name} {value}")).into()
        })
    };
    let head = SumHead {
        count: field("count")?,
        block_length: field("block length")?,
        checksum_length: field("checksum length")?,
        remainder: field("remainder")?,
    };
    head.validate()?;
    Ok(head)
}

/// Writes the block signatures announced by `head`.
pub fn write_sum_bufs<W: Write + ?Sized>(
    writer: &mut W,
    head: &SumHead,
    sums: &[SumBuf],
) -> io::Result<()> {
    for sum in sums {
        write_int(writer, sum.sum1 as i32)?;
        writer.write_all(sum.strong(head.checksum_length))?;
    }
    Ok(())
}

/// Reads `head.count` block signatures.
pub fn read_sum_bufs<R: Read + ?Sized>(reader: &mut R, head: &SumHead) -> io::Result<Vec<SumBuf>> {
    let mut sums = Vec::with_capacity(head.count.min(1 << 16) as usize);
    for index in 0..head.count {
        let sum1 = read_int(reader)? as u32;
        let mut sum2 = [0u8; MAX_SUM_LENGTH as usize];
        reader.read_exact(&mut sum2[..head.checksum_length as usize])?;
        sums.push(SumBuf {
            index,
            offset: head.offset(index),
            len: head.block_len(index),
            sum1,
            sum2,
        });
    }
    Ok(sums)
}
