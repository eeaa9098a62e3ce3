#![allow(clippy::module_name_repetitions)]

//! File list encoding and decoding for protocol 27.
//!
//! Each entry is a flags byte followed by the name and whichever metadata
//! fields differ from the previous entry:
//!
//! 1. flags byte (a zero byte ends the list)
//! 2. shared-prefix length (byte, with `XMIT_SAME_NAME`) and name suffix
//!    length (`i32` with `XMIT_LONG_NAME`, otherwise a byte), then the suffix
//! 3. size as a `longint`
//! 4. mtime, mode, uid, gid and device number as `i32`s, each omitted when
//!    flagged as unchanged or not negotiated
//! 5. symlink target for symlinks when links are preserved
//!
//! After the terminator come the optional uid and gid name lists and the
//! sender's I/O error flag.
//!
//! # Example
//!
//! ```
//! use protocol::flist::{FileEntry, FileType};
//!
//! let entry = FileEntry::regular("test.txt", 1024, 0o644);
//! assert_eq!(entry.name(), "test.txt");
//! assert_eq!(entry.size(), 1024);
//! assert_eq!(entry.file_type(), FileType::Regular);
//! ```

mod entry;
mod file_type;
mod flags;
mod idlist;
mod list;
mod options;
mod read;
mod sort;
mod write;

/// Longest relative path accepted from a peer.
pub const MAX_PATH_LEN: usize = 4096;

pub use entry::FileEntry;
pub use file_type::{FileType, S_IFMT};
pub use flags::{
    XMIT_LONG_NAME, XMIT_SAME_GID, XMIT_SAME_MODE, XMIT_SAME_NAME, XMIT_SAME_RDEV_PRE28,
    XMIT_SAME_TIME, XMIT_SAME_UID, XMIT_TOP_DIR,
};
pub use idlist::{IdName, read_id_list, write_id_list};
pub use list::{FileList, read_file_list, write_file_list};
pub use options::ListOptions;
pub use read::{FileListReader, validate_name};
pub use sort::{sort_file_list, sort_file_list_by};
pub use write::FileListWriter;
