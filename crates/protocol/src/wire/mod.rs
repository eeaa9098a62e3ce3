//! Per-file delta exchange: block signatures and the token stream.

pub mod signature;
pub mod token;

pub use signature::{
    MAX_BLOCK_SIZE, MAX_SUM_LENGTH, SumBuf, SumHead, read_sum_bufs, read_sum_head, write_sum_bufs, write_sum_head,
};
pub use token::{CHUNK_SIZE, Token, TokenReader, write_copy, write_end, write_literal};
