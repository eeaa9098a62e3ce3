//! File list encoding for the sending side.

use std::io::{self, Write};

use crate::varint::{write_byte, write_bytes, write_int, write_longint};

use super::entry::FileEntry;
use super::flags::{
    XMIT_LONG_NAME, XMIT_SAME_GID, XMIT_SAME_MODE, XMIT_SAME_RDEV_PRE28, XMIT_SAME_TIME,
    XMIT_SAME_UID, XMIT_TOP_DIR,
};
use super::options::ListOptions;

/// State carried between entries while writing a file list.
///
/// Fields equal to the previous entry's are omitted and flagged instead. All
/// comparison state starts at zero and an empty name.
#[derive(Debug)]
pub struct FileListWriter {
    options: ListOptions,
    prev_mode: u32,
    prev_mtime: i64,
    prev_uid: u32,
    prev_gid: u32,
    prev_rdev: u32,
}

impl FileListWriter {
    /// Creates a writer for the negotiated options.
    #[must_use]
    pub fn new(options: ListOptions) -> Self {
        Self {
            options,
            prev_mode: 0,
            prev_mtime: 0,
            prev_uid: 0,
            prev_gid: 0,
            prev_rdev: 0,
        }
    }

    /// Writes one entry.
    ///
    /// Names are always sent in full with an `i32` length, so the flags byte
    /// is never zero.
    pub fn write_entry<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        entry: &FileEntry,
    ) -> io::Result<()> {
        let file_type = entry.file_type();
        let mut flags = XMIT_LONG_NAME;
        if entry.is_top_dir() {
            flags |= XMIT_TOP_DIR;
        }

        let mode = entry.mode();
        if mode == self.prev_mode {
            flags |= XMIT_SAME_MODE;
        } else {
            self.prev_mode = mode;
        }

        let mtime = entry.mtime();
        if mtime == self.prev_mtime {
            flags |= XMIT_SAME_TIME;
        } else {
            self.prev_mtime = mtime;
        }

        let uid = entry.uid().unwrap_or(0);
        if self.options.preserve_uid {
            if uid == self.prev_uid {
                flags |= XMIT_SAME_UID;
            } else {
                self.prev_uid = uid;
            }
        }

        let gid = entry.gid().unwrap_or(0);
        if self.options.preserve_gid {
            if gid == self.prev_gid {
                flags |= XMIT_SAME_GID;
            } else {
                self.prev_gid = gid;
            }
        }

        let sends_rdev = self.options.preserve_devices && file_type.is_device();
        let rdev = entry.rdev().unwrap_or(0);
        if sends_rdev {
            if rdev == self.prev_rdev {
                flags |= XMIT_SAME_RDEV_PRE28;
            } else {
                self.prev_rdev = rdev;
            }
        } else {
            self.prev_rdev = 0;
        }

        write_byte(writer, flags)?;
        let name = entry.name_bytes();
        let name_len = i32::try_from(name.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "file name too long")
        })?;
        write_int(writer, name_len)?;
        write_bytes(writer, name)?;

        let size = i64::try_from(entry.size())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file size too large"))?;
        write_longint(writer, size)?;
        if flags & XMIT_SAME_TIME == 0 {
            write_int(writer, mtime as i32)?;
        }
        if flags & XMIT_SAME_MODE == 0 {
            write_int(writer, mode as i32)?;
        }
        if self.options.preserve_uid && flags & XMIT_SAME_UID == 0 {
            write_int(writer, uid as i32)?;
        }
        if self.options.preserve_gid && flags & XMIT_SAME_GID == 0 {
            write_int(writer, gid as i32)?;
        }
        if sends_rdev && flags & XMIT_SAME_RDEV_PRE28 == 0 {
            write_int(writer, rdev as i32)?;
        }
        if self.options.preserve_links && file_type.is_symlink() {
            let target = entry.link_target().unwrap_or_default();
            let len = i32::try_from(target.len()).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "symlink target too long")
            })?;
            write_int(writer, len)?;
            write_bytes(writer, target)?;
        }
        Ok(())
    }

    /// Writes the zero flags byte that terminates the entries.
    pub fn write_end<W: Write + ?Sized>(&mut self, writer: &mut W) -> io::Result<()> {
        write_byte(writer, 0)
    }
}
