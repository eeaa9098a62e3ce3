//! File type derived once from POSIX mode bits.

/// Mask selecting the type bits of a mode.
pub const S_IFMT: u32 = 0o170_000;
const S_IFSOCK: u32 = 0o140_000;
const S_IFLNK: u32 = 0o120_000;
const S_IFREG: u32 = 0o100_000;
const S_IFBLK: u32 = 0o060_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFCHR: u32 = 0o020_000;
const S_IFIFO: u32 = 0o010_000;

/// The kinds of file a list entry can describe.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FileType {
    /// Regular file.
    Regular,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Character device.
    CharDevice,
    /// Block device.
    BlockDevice,
    /// Named pipe.
    Fifo,
    /// Unix domain socket.
    Socket,
}

impl FileType {
    /// Classifies `mode`. Returns `None` for unknown type bits.
    pub const fn from_mode(mode: u32) -> Option<Self> {
        match mode & S_IFMT {
            S_IFREG => Some(Self::Regular),
            S_IFDIR => Some(Self::Directory),
            S_IFLNK => Some(Self::Symlink),
            S_IFCHR => Some(Self::CharDevice),
            S_IFBLK => Some(Self::BlockDevice),
            S_IFIFO => Some(Self::Fifo),
            S_IFSOCK => Some(Self::Socket),
            _ => None,
        }
    }

    /// The `S_IF*` bits for this type.
    pub const fn mode_bits(self) -> u32 {
        match self {
            Self::Regular => S_IFREG,
            Self::Directory => S_IFDIR,
            Self::Symlink => S_IFLNK,
            Self::CharDevice => S_IFCHR,
            Self::BlockDevice => S_IFBLK,
            Self::Fifo => S_IFIFO,
            Self::Socket => S_IFSOCK,
        }
    }

    /// Types that carry a device number in the protocol-27 file list.
    ///
    /// Fifos and sockets count as devices here; their number is simply zero.
    pub const fn is_device(self) -> bool {
        matches!(
            self,
            Self::CharDevice | Self::BlockDevice | Self::Fifo | Self::Socket
        )
    }

    /// Returns `true` for directories.
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Returns `true` for regular files.
    pub const fn is_regular(self) -> bool {
        matches!(self, Self::Regular)
    }

    /// Returns `true` for symbolic links.
    pub const fn is_symlink(self) -> bool {
        matches!(self, Self::Symlink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_every_type() {
        for file_type in [
            FileType::Regular,
            FileType::Directory,
            FileType::Symlink,
            FileType::CharDevice,
            FileType::BlockDevice,
            FileType::Fifo,
            FileType::Socket,
        ] {
            let mode = file_type.mode_bits() | 0o644;
            assert_eq!(FileType::from_mode(mode), Some(file_type));
        }
        assert_eq!(FileType::from_mode(0o644), None);
    }

    #[test]
    fn device_classification() {
        assert!(FileType::Fifo.is_device());
        assert!(FileType::CharDevice.is_device());
        assert!(!FileType::Symlink.is_device());
        assert!(!FileType::Regular.is_device());
    }
}
