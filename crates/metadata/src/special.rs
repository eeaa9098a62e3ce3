use std::io;
use std::path::Path;

use protocol::flist::{FileEntry, FileType};
use rustix::fs::{self as unix_fs, CWD, Mode};

use crate::error::MetadataError;

/// Splits a 32-bit device number as the sender's `dev_t` encoded it.
pub const fn split_rdev(rdev: u32) -> (u32, u32) {
    let major = (rdev >> 8) & 0xfff;
    let minor = (rdev & 0xff) | ((rdev >> 12) & 0xf_ff00);
    (major, minor)
}

/// Packs a major/minor pair into the 32-bit form carried by the file list.
pub const fn join_rdev(major: u32, minor: u32) -> u32 {
    (minor & 0xff) | ((major & 0xfff) << 8) | ((minor & 0xf_ff00) << 12)
}

/// Converts a local `st_rdev` into the 32-bit form carried by the file list.
pub const fn rdev_from_dev(dev: u64) -> u32 {
    let major = ((dev >> 8) & 0xfff) | ((dev >> 32) & !0xfff);
    let minor = (dev & 0xff) | ((dev >> 12) & !0xff);
    join_rdev(major as u32, minor as u32)
}

/// Creates a device node, fifo or socket for `entry` at `destination`.
///
/// The caller removes any existing entry first. Device nodes normally
/// require privileges; the error is returned for the caller to log.
pub fn create_special(destination: &Path, entry: &FileEntry) -> Result<(), MetadataError> {
    let file_type = match entry.file_type() {
        FileType::CharDevice => unix_fs::FileType::CharacterDevice,
        FileType::BlockDevice => unix_fs::FileType::BlockDevice,
        FileType::Fifo => unix_fs::FileType::Fifo,
        FileType::Socket => unix_fs::FileType::Socket,
        other => {
            return Err(MetadataError::new(
                "create special file",
                destination,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{other:?} is not a special file"),
                ),
            ));
        }
    };
    let (major, minor) = split_rdev(entry.rdev().unwrap_or(0));
    unix_fs::mknodat(
        CWD,
        destination,
        file_type,
        Mode::from_bits_truncate(entry.permissions()),
        unix_fs::makedev(major, minor),
    )
    .map_err(|error| MetadataError::new("create special file", destination, io::Error::from(error)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::FileTypeExt;

    #[test]
    fn rdev_split_round_trips() {
        for (major, minor) in [(0, 0), (1, 3), (8, 17), (136, 300), (4095, 0xfffff)] {
            assert_eq!(split_rdev(join_rdev(major, minor)), (major, minor));
        }
    }

    #[test]
    fn local_dev_numbers_convert() {
        // glibc encoding of makedev(8, 17)
        assert_eq!(split_rdev(rdev_from_dev(0x0811)), (8, 17));
        assert_eq!(rdev_from_dev(0), 0);
    }

    #[test]
    fn creates_fifo() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pipe");
        let entry = FileEntry::from_mode("pipe", 0o010_640).expect("fifo");
        create_special(&path, &entry).expect("mkfifo");
        let metadata = std::fs::symlink_metadata(&path).expect("lstat");
        assert!(metadata.file_type().is_fifo());
    }

    #[test]
    fn rejects_regular_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let entry = FileEntry::regular("f", 0, 0o644);
        assert!(create_special(&dir.path().join("f"), &entry).is_err());
    }
}
