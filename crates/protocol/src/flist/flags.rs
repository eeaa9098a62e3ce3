//! Transmit flags for protocol-27 file-list entries.
//!
//! Protocol 27 has a single flags byte per entry; a zero byte ends the list.
//! The bit values match the reference `rsync.h`.

/// Directory named on the command line.
pub const XMIT_TOP_DIR: u8 = 1 << 0;

/// Mode equals the previous entry's mode.
pub const XMIT_SAME_MODE: u8 = 1 << 1;

/// Device number equals the previous entry's (protocols before 28).
pub const XMIT_SAME_RDEV_PRE28: u8 = 1 << 2;

/// Uid equals the previous entry's uid.
pub const XMIT_SAME_UID: u8 = 1 << 3;

/// Gid equals the previous entry's gid.
pub const XMIT_SAME_GID: u8 = 1 << 4;

/// A byte giving the length of the prefix shared with the previous name
/// follows.
pub const XMIT_SAME_NAME: u8 = 1 << 5;

/// The name suffix length is an `i32` rather than a byte.
pub const XMIT_LONG_NAME: u8 = 1 << 6;

/// Modification time equals the previous entry's.
pub const XMIT_SAME_TIME: u8 = 1 << 7;
