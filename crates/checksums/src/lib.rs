#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Checksum primitives for the protocol-27 delta algorithm:
//!
//! - [`RollingChecksum`], the weak 32-bit checksum that can slide over a file
//!   one byte at a time, and [`tag`], its 16-bit hash-table bucket;
//! - [`block_checksum`] and [`FileDigest`], the seeded MD4 strong sums used to
//!   confirm block matches and to verify whole files.
//!
//! # Examples
//!
//! ```
//! use checksums::{RollingChecksum, weak_checksum};
//!
//! let data = b"the quick brown fox";
//! let mut rolling = RollingChecksum::from_block(&data[..8]);
//! rolling.roll(data[0], data[8]).unwrap();
//! assert_eq!(rolling.value(), weak_checksum(&data[1..9]));
//! ```

mod rolling;
pub mod strong;

pub use rolling::{RollingChecksum, RollingError, tag, weak_checksum};
pub use strong::{FileDigest, MD4_DIGEST_LEN, Md4, block_checksum};
