#![deny(unsafe_code)]

//! Block matching and delta generation for rsync transfers.
//!
//! The sender receives a [`FileSignature`] describing the generator's copy of
//! a file and scans its own copy for blocks it can reference instead of
//! sending:
//! - [`MapFile`] is the bounded sliding window over the sender's file
//! - [`TagIndex`] groups signature blocks by the 16-bit tag of their weak sum
//! - [`HashSearch`] rolls the weak checksum byte by byte and emits copy and
//!   literal tokens into a [`TokenSink`]
//! - [`whole_file_digest`] computes the trailing file checksum without a
//!   search, used when the generator asked for the whole file
//!
//! ```
//! use std::io::Cursor;
//!
//! use matching::{HashSearch, MapFile, RecordedToken, TokenRecorder};
//! use signature::{generate_file_signature, sum_sizes_sqroot};
//!
//! let basis = vec![7u8; 4096];
//! let head = sum_sizes_sqroot(basis.len() as u64).expect("layout");
//! let signature = generate_file_signature(basis.as_slice(), head, 0).expect("signature");
//!
//! let mut map = MapFile::new(Cursor::new(basis.clone()), basis.len() as u64, head.block_length);
//! let mut tokens = TokenRecorder::default();
//! let report = HashSearch::new(&signature, 0).run(&mut map, &mut tokens).expect("search");
//! assert_eq!(report.literal_bytes, 0);
//! assert!(matches!(tokens.tokens[0], RecordedToken::Copy(0)));
//! ```
//!
//! [`FileSignature`]: signature::FileSignature

mod digest;
mod index;
mod map;
mod search;
mod sink;

pub use digest::whole_file_digest;
pub use index::TagIndex;
pub use map::{MAX_MAP_SIZE, MapFile, window_size};
pub use search::{HashSearch, MatchReport};
pub use sink::{RecordedToken, TokenRecorder, TokenSink, WireTokenSink};
