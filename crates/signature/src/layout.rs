//! crates/signature/src/layout.rs
//!
//! Block sizing for protocol-27 signatures.

use protocol::wire::{MAX_BLOCK_SIZE, MAX_SUM_LENGTH, SumHead};
use thiserror::Error;

/// Smallest block length chosen by the sizing heuristic.
pub const BLOCK_SIZE: u32 = 700;

/// Strong checksum bytes sent per block.
pub const SUM_LENGTH: u32 = MAX_SUM_LENGTH;

/// Errors produced when calculating signature layouts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum SignatureLayoutError {
    /// The number of blocks does not fit the wire's `i32` count.
    #[error("block count {blocks} derived from block length {block_length} exceeds i32::MAX")]
    BlockCountOverflow {
        /// Block length that triggered the overflow.
        block_length: u32,
        /// Block count produced by the sizing heuristic.
        blocks: u64,
    },
}

/// Derives the block layout for a basis file of `file_length` bytes.
///
/// Files up to `700 * 700` bytes use [`BLOCK_SIZE`]. Larger files use the
/// square root of the length rounded down to a multiple of 8, capped at
/// [`MAX_BLOCK_SIZE`]. Every block carries a 16-byte strong checksum and the
/// last block holds `len % block_length` bytes when that is non-zero.
pub fn sum_sizes_sqroot(file_length: u64) -> Result<SumHead, SignatureLayoutError> {
    let block_length = block_length_for(file_length);
    let blocks = file_length.div_ceil(u64::from(block_length));
    let count = u32::try_from(blocks)
        .ok()
        .filter(|&count| count <= i32::MAX as u32)
        .ok_or(SignatureLayoutError::BlockCountOverflow {
            block_length,
            blocks,
        })?;
    Ok(SumHead {
        count,
        block_length,
        checksum_length: SUM_LENGTH,
        remainder: (file_length % u64::from(block_length)) as u32,
    })
}

/// Bitwise square root over the bits from the top power of two down to 8.
fn block_length_for(file_length: u64) -> u32 {
    if file_length <= u64::from(BLOCK_SIZE) * u64::from(BLOCK_SIZE) {
        return BLOCK_SIZE;
    }

    let mut bit: u64 = 1;
    let mut rest = file_length >> 2;
    while rest != 0 {
        bit <<= 1;
        rest >>= 2;
    }
    if bit >= u64::from(MAX_BLOCK_SIZE) {
        return MAX_BLOCK_SIZE;
    }

    let mut length: u64 = 0;
    while bit >= 8 {
        length |= bit;
        if file_length < length * length {
            length &= !bit;
        }
        bit >>= 1;
    }
    (length as u32).max(BLOCK_SIZE)
}
