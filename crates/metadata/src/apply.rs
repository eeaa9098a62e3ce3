use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use filetime::{FileTime, set_file_mtime, set_symlink_file_times};
use protocol::flist::FileEntry;
use rustix::fs::{self as unix_fs, AtFlags, CWD};

use crate::error::MetadataError;
use crate::options::MetadataOptions;
use crate::ownership::{gid_from_raw, uid_from_raw};

/// Local owner and group to give a destination entry, already mapped from
/// the sender's ids.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Ownership {
    /// Owner to set, if any.
    pub uid: Option<u32>,
    /// Group to set, if any.
    pub gid: Option<u32>,
}

/// Applies the attributes of `entry` selected by `options` to `destination`.
///
/// Ownership is changed first because `chown` may clear set-id bits that the
/// permission step then restores. Symlinks are never followed and never
/// have their permissions changed.
pub fn apply_entry_metadata(
    destination: &Path,
    entry: &FileEntry,
    options: &MetadataOptions,
    ownership: Ownership,
) -> Result<(), MetadataError> {
    let is_symlink = entry.file_type().is_symlink();
    let uid = ownership.uid.filter(|_| options.owner());
    let gid = ownership.gid.filter(|_| options.group());
    if uid.is_some() || gid.is_some() {
        let flags = if is_symlink {
            AtFlags::SYMLINK_NOFOLLOW
        } else {
            AtFlags::empty()
        };
        unix_fs::chownat(
            CWD,
            destination,
            uid.map(uid_from_raw),
            gid.map(gid_from_raw),
            flags,
        )
        .map_err(|error| {
            MetadataError::new("preserve ownership", destination, io::Error::from(error))
        })?;
    }

    if options.permissions() && !is_symlink {
        set_mode(destination, entry.permissions())?;
    }

    if options.times() {
        let mtime = FileTime::from_unix_time(entry.mtime(), 0);
        if is_symlink {
            set_symlink_file_times(destination, mtime, mtime)
        } else {
            set_file_mtime(destination, mtime)
        }
        .map_err(|error| MetadataError::new("preserve timestamps", destination, error))?;
    }
    Ok(())
}

/// Sets the permission bits of `destination`.
pub fn set_mode(destination: &Path, mode: u32) -> Result<(), MetadataError> {
    fs::set_permissions(destination, fs::Permissions::from_mode(mode))
        .map_err(|error| MetadataError::new("preserve permissions", destination, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;

    #[test]
    fn applies_mode_and_mtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("file");
        fs::write(&path, b"data").expect("write");

        let entry = FileEntry::regular("file", 4, 0o640).with_mtime(1_700_000_000);
        let options = MetadataOptions::new()
            .preserve_permissions(true)
            .preserve_times(true);
        apply_entry_metadata(&path, &entry, &options, Ownership::default()).expect("apply");

        let metadata = fs::metadata(&path).expect("metadata");
        assert_eq!(metadata.mode() & 0o7777, 0o640);
        assert_eq!(metadata.mtime(), 1_700_000_000);
    }

    #[test]
    fn disabled_options_leave_file_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("file");
        fs::write(&path, b"data").expect("write");
        set_mode(&path, 0o600).expect("chmod");
        let before = fs::metadata(&path).expect("metadata").mtime();

        let entry = FileEntry::regular("file", 4, 0o777).with_mtime(5);
        apply_entry_metadata(&path, &entry, &MetadataOptions::new(), Ownership::default())
            .expect("apply");

        let metadata = fs::metadata(&path).expect("metadata");
        assert_eq!(metadata.mode() & 0o777, 0o600);
        assert_eq!(metadata.mtime(), before);
    }

    #[test]
    fn symlink_times_do_not_follow() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("target");
        fs::write(&target, b"t").expect("write");
        let link = dir.path().join("link");
        std::os::unix::fs::symlink("target", &link).expect("symlink");
        let target_mtime = fs::metadata(&target).expect("metadata").mtime();

        let entry = FileEntry::symlink("link", "target").with_mtime(1_000_000);
        let options = MetadataOptions::new().preserve_times(true).preserve_permissions(true);
        apply_entry_metadata(&link, &entry, &options, Ownership::default()).expect("apply");

        assert_eq!(fs::symlink_metadata(&link).expect("lstat").mtime(), 1_000_000);
        assert_eq!(fs::metadata(&target).expect("stat").mtime(), target_mtime);
    }

    #[test]
    fn chown_to_current_ids_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("file");
        fs::write(&path, b"data").expect("write");
        let metadata = fs::metadata(&path).expect("metadata");

        let entry = FileEntry::regular("file", 4, 0o644);
        let options = MetadataOptions::new().preserve_owner(true).preserve_group(true);
        let ownership = Ownership {
            uid: Some(metadata.uid()),
            gid: Some(metadata.gid()),
        };
        apply_entry_metadata(&path, &entry, &options, ownership).expect("apply");
    }
}
