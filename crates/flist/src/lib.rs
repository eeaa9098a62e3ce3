#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `flist` scans the sender's operands and produces the file list that is
//! sent at the start of every transfer. Each entry keeps the local path it
//! was read from so the sender can open it when the receiver asks for it by
//! index.
//!
//! # Design
//!
//! - [`FileListBuilder`] carries the negotiated options: recursion, symlinks,
//!   devices, ownership names and the filter rules that prune the scan.
//! - [`BuiltFileList`] pairs the sorted [`FileList`](protocol::flist::FileList)
//!   with the source paths in the same order.
//!
//! # Invariants
//!
//! - Names are relative, `/`-separated and never contain `..`.
//! - The list is sorted and deduplicated exactly as the receiver sorts the
//!   list it decodes, so indices agree on both ends.
//! - Unreadable directories and vanished files are logged and recorded in
//!   the list's I/O error flag; they never abort the scan.
//!
//! # Examples
//!
//! ```
//! use flist::FileListBuilder;
//! use logging::{Logger, Role};
//! use std::fs;
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let temp = tempfile::tempdir()?;
//! let root = temp.path().join("src");
//! fs::create_dir_all(root.join("nested"))?;
//! fs::write(root.join("file.txt"), b"data")?;
//! fs::write(root.join("nested/more.txt"), b"data")?;
//!
//! let built = FileListBuilder::new(Logger::quiet(Role::Sender))
//!     .recursive(true)
//!     .build(&[&root])?;
//! let names: Vec<String> = built.list.entries.iter().map(|e| e.name()).collect();
//! assert_eq!(names, ["src", "src/file.txt", "src/nested", "src/nested/more.txt"]);
//! # Ok(())
//! # }
//! # demo().unwrap();
//! ```

mod builder;
mod error;

pub use crate::builder::{BuiltFileList, FileListBuilder, IOERR_GENERAL, IOERR_VANISHED};
pub use crate::error::FileListError;
