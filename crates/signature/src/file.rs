//! crates/signature/src/file.rs
//!
//! Aggregated file signature container.

use std::io::{self, Write};

use protocol::wire::{SumBuf, SumHead, write_sum_bufs, write_sum_head};

/// Signature of a basis file: its layout and one entry per block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileSignature {
    head: SumHead,
    blocks: Vec<SumBuf>,
}

impl FileSignature {
    /// Creates a signature from its parts, as received from the wire.
    #[must_use]
    pub const fn from_raw_parts(head: SumHead, blocks: Vec<SumBuf>) -> Self {
        Self { head, blocks }
    }

    /// The signature of a missing basis file: no blocks at all.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            head: SumHead::EMPTY,
            blocks: Vec::new(),
        }
    }

    /// Returns the layout used to generate the signature.
    #[inline]
    #[must_use]
    pub const fn head(&self) -> &SumHead {
        &self.head
    }

    /// Returns the block entries in file order.
    #[inline]
    #[must_use]
    pub fn blocks(&self) -> &[SumBuf] {
        &self.blocks
    }

    /// Returns `true` when the signature has no blocks.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Writes the sum head and every block sum.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        write_sum_head(writer, &self.head)?;
        write_sum_bufs(writer, &self.head, &self.blocks)
    }
}
