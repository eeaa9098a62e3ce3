#![deny(unsafe_code)]
#![deny(missing_docs)]

//! Block signatures of basis files.
//!
//! The generator describes its copy of a file as a [`SumHead`] layout chosen
//! by [`sum_sizes_sqroot`] plus one weak and one strong checksum per block.
//! The sender uses that [`FileSignature`] to find blocks it does not need to
//! send.
//!
//! ```
//! use signature::{generate_file_signature, sum_sizes_sqroot};
//!
//! let data = vec![0x5a; 2_000];
//! let head = sum_sizes_sqroot(data.len() as u64).expect("layout");
//! let signature = generate_file_signature(data.as_slice(), head, 42).expect("signature");
//! assert_eq!(signature.blocks().len(), 3);
//! ```
//!
//! [`SumHead`]: protocol::wire::SumHead

mod file;
mod generation;
mod layout;

pub use file::FileSignature;
pub use generation::{SignatureError, generate_file_signature};
pub use layout::{BLOCK_SIZE, SUM_LENGTH, SignatureLayoutError, sum_sizes_sqroot};
