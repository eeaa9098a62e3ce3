use std::fmt;

use super::file_type::{FileType, S_IFMT};

/// One file-list record.
///
/// Names are relative paths as raw bytes, `/`-separated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileEntry {
    name: Vec<u8>,
    file_type: FileType,
    mode: u32,
    size: u64,
    mtime: i64,
    uid: Option<u32>,
    gid: Option<u32>,
    rdev: Option<u32>,
    link_target: Option<Vec<u8>>,
    top_dir: bool,
}

impl FileEntry {
    fn with_type(name: Vec<u8>, file_type: FileType, permissions: u32) -> Self {
        Self {
            name,
            file_type,
            mode: file_type.mode_bits() | (permissions & !S_IFMT),
            size: 0,
            mtime: 0,
            uid: None,
            gid: None,
            rdev: None,
            link_target: None,
            top_dir: false,
        }
    }

    /// Builds an entry from a full mode, classifying it once.
    ///
    /// Returns `None` when the mode's type bits are unknown.
    pub fn from_mode(name: impl Into<Vec<u8>>, mode: u32) -> Option<Self> {
        let file_type = FileType::from_mode(mode)?;
        Some(Self::with_type(name.into(), file_type, mode))
    }

    /// A regular file.
    pub fn regular(name: impl Into<Vec<u8>>, size: u64, permissions: u32) -> Self {
        let mut entry = Self::with_type(name.into(), FileType::Regular, permissions);
        entry.size = size;
        entry
    }

    /// A directory.
    pub fn directory(name: impl Into<Vec<u8>>, permissions: u32) -> Self {
        Self::with_type(name.into(), FileType::Directory, permissions)
    }

    /// A symbolic link pointing at `target`.
    pub fn symlink(name: impl Into<Vec<u8>>, target: impl Into<Vec<u8>>) -> Self {
        let target = target.into();
        let mut entry = Self::with_type(name.into(), FileType::Symlink, 0o777);
        entry.size = target.len() as u64;
        entry.link_target = Some(target);
        entry
    }

    /// Sets the modification time in seconds.
    pub fn with_mtime(mut self, mtime: i64) -> Self {
        self.mtime = mtime;
        self
    }

    /// Sets the length.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Sets the owner.
    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Sets the group.
    pub fn with_gid(mut self, gid: u32) -> Self {
        self.gid = Some(gid);
        self
    }

    /// Sets the device number.
    pub fn with_rdev(mut self, rdev: u32) -> Self {
        self.rdev = Some(rdev);
        self
    }

    /// Sets the symlink target.
    pub fn with_link_target(mut self, target: impl Into<Vec<u8>>) -> Self {
        self.link_target = Some(target.into());
        self
    }

    /// Marks a directory as named on the command line.
    pub fn with_top_dir(mut self, top_dir: bool) -> Self {
        self.top_dir = top_dir && self.file_type.is_dir();
        self
    }

    /// Relative path bytes.
    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    /// Relative path, lossily decoded for display.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Classified type.
    pub const fn file_type(&self) -> FileType {
        self.file_type
    }

    /// Full mode including type bits.
    pub const fn mode(&self) -> u32 {
        self.mode
    }

    /// Permission bits only.
    pub const fn permissions(&self) -> u32 {
        self.mode & !S_IFMT
    }

    /// Length in bytes.
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Modification time in seconds since the epoch.
    pub const fn mtime(&self) -> i64 {
        self.mtime
    }

    /// Owner, when known.
    pub const fn uid(&self) -> Option<u32> {
        self.uid
    }

    /// Group, when known.
    pub const fn gid(&self) -> Option<u32> {
        self.gid
    }

    /// Device number for devices.
    pub const fn rdev(&self) -> Option<u32> {
        self.rdev
    }

    /// Symlink target bytes.
    pub fn link_target(&self) -> Option<&[u8]> {
        self.link_target.as_deref()
    }

    /// Whether this directory was named on the command line.
    pub const fn is_top_dir(&self) -> bool {
        self.top_dir
    }

    /// Shorthand for `file_type().is_dir()`.
    pub const fn is_dir(&self) -> bool {
        self.file_type.is_dir()
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.name))?;
        if self.is_dir() && self.name != b"." {
            f.write_str("/")?;
        }
        Ok(())
    }
}
