//! crates/signature/src/generation.rs
//!
//! File signature generation from basis file contents.

use std::io::{self, Read};

use checksums::{RollingChecksum, block_checksum};
use protocol::wire::{MAX_SUM_LENGTH, SumBuf, SumHead};
use rayon::prelude::*;
use thiserror::Error;

use crate::file::FileSignature;

/// Blocks read and hashed together in one parallel batch.
const BATCH_BLOCKS: usize = 256;

/// Errors returned when generating file signatures.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Underlying I/O failure raised while reading file contents.
    #[error("failed to read input while generating signature: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
    /// The layout asked for more strong checksum bytes than MD4 provides.
    #[error("requested strong checksum length {0} exceeds 16")]
    DigestLengthMismatch(u32),
}

/// Computes the block signatures of `reader` for the layout in `head`.
///
/// Exactly `head.file_length()` bytes are consumed; a shorter input is an
/// [`io::ErrorKind::UnexpectedEof`] error. Blocks are read in batches and
/// their checksums computed in parallel, so memory stays bounded by the batch
/// size whatever the file length.
pub fn generate_file_signature<R: Read>(
    mut reader: R,
    head: SumHead,
    seed: i32,
) -> Result<FileSignature, SignatureError> {
    if head.checksum_length > MAX_SUM_LENGTH {
        return Err(SignatureError::DigestLengthMismatch(head.checksum_length));
    }
    if head.is_empty() {
        return Ok(FileSignature::from_raw_parts(head, Vec::new()));
    }

    let block_len = head.block_length as usize;
    let mut blocks = Vec::with_capacity(head.count.min(1 << 16) as usize);
    let mut buffer = Vec::with_capacity(block_len * BATCH_BLOCKS.min(head.count as usize));
    let mut next = 0u32;
    while next < head.count {
        let batch_end = head.count.min(next + BATCH_BLOCKS as u32);
        let batch_bytes: usize = (next..batch_end)
            .map(|index| head.block_len(index) as usize)
            .sum();
        buffer.resize(batch_bytes, 0);
        reader.read_exact(&mut buffer)?;

        let first = next;
        let sums: Vec<SumBuf> = buffer
            .par_chunks(block_len)
            .enumerate()
            .map(|(offset, chunk)| block_sum(&head, first + offset as u32, chunk, seed))
            .collect();
        blocks.extend(sums);
        next = batch_end;
    }
    Ok(FileSignature::from_raw_parts(head, blocks))
}

fn block_sum(head: &SumHead, index: u32, data: &[u8], seed: i32) -> SumBuf {
    SumBuf {
        index,
        offset: head.offset(index),
        len: data.len() as u32,
        sum1: RollingChecksum::from_block(data).value(),
        sum2: block_checksum(data, seed),
    }
}
