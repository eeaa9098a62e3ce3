use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use protocol::flist::{FileEntry, FileList};

use crate::error::TransferError;

/// Where the receiver places incoming entries.
///
/// A destination is either a directory that entry names are joined onto or,
/// when a single non-directory entry is transferred to a path that is not a
/// directory, the exact path that entry is written to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Destination {
    root: PathBuf,
    single_file: bool,
}

impl Destination {
    /// Decides how `path` receives the entries of `list`, creating the
    /// destination directory when it is missing (unless `dry_run`).
    pub fn resolve(path: &Path, list: &FileList, dry_run: bool) -> Result<Self, TransferError> {
        let single_entry = matches!(list.entries.as_slice(), [entry] if !entry.is_dir());
        let names_directory = path.as_os_str().as_bytes().ends_with(b"/");

        match fs::metadata(path) {
            Ok(metadata) if metadata.is_dir() => Ok(Self::directory(path)),
            Ok(_) if single_entry => Ok(Self::file(path)),
            Ok(_) => Err(TransferError::NotADirectory {
                path: path.to_path_buf(),
            }),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                if single_entry && !names_directory {
                    return Ok(Self::file(path));
                }
                if !dry_run {
                    fs::create_dir_all(path)
                        .map_err(|source| TransferError::io("create directory", path, source))?;
                }
                Ok(Self::directory(path))
            }
            Err(error) => Err(TransferError::io("stat", path, error)),
        }
    }

    /// A destination directory.
    pub fn directory(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            single_file: false,
        }
    }

    /// A destination that is itself the target of the only entry.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            root: path.into(),
            single_file: true,
        }
    }

    /// The directory or file path given to [`resolve`](Self::resolve).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path for `entry`.
    pub fn path_for(&self, entry: &FileEntry) -> PathBuf {
        let name = entry.name_bytes();
        if self.single_file || name == b"." {
            self.root.clone()
        } else {
            self.root.join(OsStr::from_bytes(name))
        }
    }
}
