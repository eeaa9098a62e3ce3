//! Seeded MD4 strong checksums.
//!
//! Two constructions are used on the wire and they differ in where the
//! session seed goes:
//!
//! - block checksums hash the block followed by the seed,
//! - the whole-file checksum hashes the seed followed by the file contents.

use std::fmt;

use digest::Digest;

/// Length in bytes of an MD4 digest and the longest strong sum on the wire.
pub const MD4_DIGEST_LEN: usize = 16;

/// Streaming MD4 hasher.
#[derive(Clone, Default)]
pub struct Md4 {
    inner: md4::Md4,
}

impl fmt::Debug for Md4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Md4").finish_non_exhaustive()
    }
}

impl Md4 {
    /// Creates a hasher with an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds additional bytes into the digest state.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalises the digest and returns the 128-bit MD4 output.
    #[must_use]
    pub fn finalize(self) -> [u8; MD4_DIGEST_LEN] {
        self.inner.finalize().into()
    }

    /// One-shot digest of `data`.
    #[must_use]
    pub fn digest(data: &[u8]) -> [u8; MD4_DIGEST_LEN] {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}

/// Strong checksum of one block: `MD4(block || seed)` with the seed as four
/// little-endian bytes.
///
/// Callers truncate the result to the negotiated checksum length.
#[must_use]
pub fn block_checksum(block: &[u8], seed: i32) -> [u8; MD4_DIGEST_LEN] {
    let mut hasher = Md4::new();
    hasher.update(block);
    hasher.update(&seed.to_le_bytes());
    hasher.finalize()
}

/// Running whole-file checksum, `MD4(seed || data...)`.
///
/// Both the sender and the receiver feed every byte of the file in order,
/// literal or matched, and compare the results at the end of the file.
#[derive(Clone, Debug)]
pub struct FileDigest {
    hasher: Md4,
    len: u64,
}

impl FileDigest {
    /// Starts a digest keyed with the session seed.
    #[must_use]
    pub fn new(seed: i32) -> Self {
        let mut hasher = Md4::new();
        hasher.update(&seed.to_le_bytes());
        Self { hasher, len: 0 }
    }

    /// Feeds file bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.len += data.len() as u64;
    }

    /// Number of file bytes hashed so far.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if no file bytes were hashed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finishes the digest.
    #[must_use]
    pub fn finalize(self) -> [u8; MD4_DIGEST_LEN] {
        self.hasher.finalize()
    }
}
