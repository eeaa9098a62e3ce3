use std::fs::{self, Metadata};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use filters::FilterSet;
use logging::{Logger, debug_log, error_log, info_log, warn_log};
use metadata::{group_name, id_names, rdev_from_dev, user_name};
use protocol::flist::{FileEntry, FileList, FileType, sort_file_list_by};

use crate::error::FileListError;

/// I/O error flag bit for general failures while scanning.
pub const IOERR_GENERAL: i32 = 1;

/// I/O error flag bit for files that disappeared while scanning.
pub const IOERR_VANISHED: i32 = 2;

/// A file list together with the local path each entry was read from.
#[derive(Clone, Debug, Default)]
pub struct BuiltFileList {
    /// Entries in transfer order, ready to send.
    pub list: FileList,
    sources: Vec<PathBuf>,
}

impl BuiltFileList {
    /// Local path of the entry at `index`.
    pub fn source(&self, index: usize) -> Option<&Path> {
        self.sources.get(index).map(PathBuf::as_path)
    }
}

/// Configures the sender-side scan of operand paths.
///
/// Each operand contributes its own final component as a name, or `.` when
/// it ends with `/`, in which case its contents are listed directly below
/// the transfer root.
#[derive(Clone, Debug)]
pub struct FileListBuilder {
    logger: Logger,
    recursive: bool,
    links: bool,
    devices: bool,
    owner: bool,
    group: bool,
    numeric_ids: bool,
    filters: FilterSet,
}

impl FileListBuilder {
    /// Creates a builder that lists only regular files and `.` roots.
    #[must_use]
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            recursive: false,
            links: false,
            devices: false,
            owner: false,
            group: false,
            numeric_ids: false,
            filters: FilterSet::default(),
        }
    }

    /// Descends into directories (`-r`).
    #[must_use]
    pub const fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Lists symlinks (`-l`).
    #[must_use]
    pub const fn links(mut self, links: bool) -> Self {
        self.links = links;
        self
    }

    /// Lists devices, fifos and sockets (`-D`).
    #[must_use]
    pub const fn devices(mut self, devices: bool) -> Self {
        self.devices = devices;
        self
    }

    /// Collects owner names for the uid list (`-o`).
    #[must_use]
    pub const fn owner(mut self, owner: bool) -> Self {
        self.owner = owner;
        self
    }

    /// Collects group names for the gid list (`-g`).
    #[must_use]
    pub const fn group(mut self, group: bool) -> Self {
        self.group = group;
        self
    }

    /// Skips name lists entirely (`--numeric-ids`).
    #[must_use]
    pub const fn numeric_ids(mut self, numeric_ids: bool) -> Self {
        self.numeric_ids = numeric_ids;
        self
    }

    /// Prunes paths rejected by `filters`.
    #[must_use]
    pub fn filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    /// Scans `roots` and returns the sorted list.
    pub fn build<P: AsRef<Path>>(&self, roots: &[P]) -> Result<BuiltFileList, FileListError> {
        info_log!(self.logger, Flist, 1, "building file list");
        let mut scan = Scan {
            builder: self,
            found: Vec::new(),
            io_error: 0,
        };
        for root in roots {
            scan.add_root(root.as_ref())?;
        }

        let Scan {
            mut found,
            io_error,
            ..
        } = scan;
        sort_file_list_by(&mut found, |(entry, _)| entry);
        let (entries, sources): (Vec<_>, Vec<_>) = found.into_iter().unzip();

        let mut list = FileList {
            entries,
            io_error,
            ..FileList::default()
        };
        if self.owner && !self.numeric_ids {
            list.uid_names = id_names(list.entries.iter().filter_map(FileEntry::uid), user_name);
        }
        if self.group && !self.numeric_ids {
            list.gid_names = id_names(list.entries.iter().filter_map(FileEntry::gid), group_name);
        }
        debug_log!(
            self.logger,
            Flist,
            1,
            "file list has {} entries, {} bytes",
            list.len(),
            list.total_size()
        );
        Ok(BuiltFileList { list, sources })
    }
}

struct Scan<'a> {
    builder: &'a FileListBuilder,
    found: Vec<(FileEntry, PathBuf)>,
    io_error: i32,
}

impl Scan<'_> {
    fn logger(&self) -> &Logger {
        &self.builder.logger
    }

    fn add_root(&mut self, root: &Path) -> Result<(), FileListError> {
        let text = root.as_os_str().as_bytes();
        let contents_only =
            text.ends_with(b"/") || text == b"." || text.ends_with(b"/.");
        let name: Vec<u8> = if contents_only {
            b".".to_vec()
        } else {
            root.file_name()
                .ok_or_else(|| FileListError::InvalidRoot(root.to_path_buf()))?
                .as_bytes()
                .to_vec()
        };

        let metadata = match fs::symlink_metadata(root) {
            Ok(metadata) => metadata,
            Err(error) => {
                error_log!(self.logger(), "link_stat {} failed: {error}", root.display());
                self.io_error |= IOERR_GENERAL;
                return Ok(());
            }
        };
        if contents_only {
            if !metadata.is_dir() {
                warn_log!(self.logger(), "{} is not a directory", root.display());
                self.io_error |= IOERR_GENERAL;
                return Ok(());
            }
            self.push(name, root.to_path_buf(), &metadata, true);
            if self.builder.recursive {
                self.walk(root, &[]);
            } else {
                self.list_directory_once(root);
            }
            return Ok(());
        }

        if metadata.is_dir() && !self.builder.recursive {
            info_log!(
                self.logger(),
                Skip,
                1,
                "skipping directory {}",
                String::from_utf8_lossy(&name)
            );
            return Ok(());
        }
        if !self.builder.filters.allows(Path::new(std::ffi::OsStr::from_bytes(&name)), metadata.is_dir()) {
            debug_log!(
                self.logger(),
                Filter,
                1,
                "excluding {}",
                String::from_utf8_lossy(&name)
            );
            return Ok(());
        }
        let is_dir = metadata.is_dir();
        if self.push(name.clone(), root.to_path_buf(), &metadata, true) && is_dir {
            self.walk(root, &name);
        }
        Ok(())
    }

    fn list_directory_once(&mut self, dir: &Path) {
        for (child, child_name) in self.read_children(dir, &[]) {
            if let Some(metadata) = self.stat(&child) {
                if metadata.is_dir() {
                    info_log!(
                        self.logger(),
                        Skip,
                        1,
                        "skipping directory {}",
                        String::from_utf8_lossy(&child_name)
                    );
                    continue;
                }
                if self.allowed(&child_name, false) {
                    self.push(child_name, child, &metadata, false);
                }
            }
        }
    }

    fn walk(&mut self, dir: &Path, prefix: &[u8]) {
        let mut pending = vec![(dir.to_path_buf(), prefix.to_vec())];
        while let Some((dir, prefix)) = pending.pop() {
            for (child, child_name) in self.read_children(&dir, &prefix) {
                let Some(metadata) = self.stat(&child) else {
                    continue;
                };
                let is_dir = metadata.is_dir();
                if !self.allowed(&child_name, is_dir) {
                    continue;
                }
                if self.push(child_name.clone(), child.clone(), &metadata, false) && is_dir {
                    pending.push((child, child_name));
                }
            }
        }
    }

    fn read_children(&mut self, dir: &Path, prefix: &[u8]) -> Vec<(PathBuf, Vec<u8>)> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(error) => {
                error_log!(
                    self.logger(),
                    "opendir {} failed: {error}",
                    dir.display()
                );
                self.io_error |= IOERR_GENERAL;
                return Vec::new();
            }
        };
        let mut children = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => {
                    let file_name = entry.file_name();
                    let mut name = prefix.to_vec();
                    if !name.is_empty() {
                        name.push(b'/');
                    }
                    name.extend_from_slice(file_name.as_bytes());
                    children.push((entry.path(), name));
                }
                Err(error) => {
                    error_log!(self.logger(), "readdir {} failed: {error}", dir.display());
                    self.io_error |= IOERR_GENERAL;
                }
            }
        }
        children
    }

    fn allowed(&self, name: &[u8], is_dir: bool) -> bool {
        let allowed = self
            .builder
            .filters
            .allows(Path::new(std::ffi::OsStr::from_bytes(name)), is_dir);
        if !allowed {
            debug_log!(
                self.logger(),
                Filter,
                1,
                "excluding {}",
                String::from_utf8_lossy(name)
            );
        }
        allowed
    }

    fn stat(&mut self, path: &Path) -> Option<Metadata> {
        match fs::symlink_metadata(path) {
            Ok(metadata) => Some(metadata),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                warn_log!(self.logger(), "file has vanished: {}", path.display());
                self.io_error |= IOERR_VANISHED;
                None
            }
            Err(error) => {
                error_log!(self.logger(), "link_stat {} failed: {error}", path.display());
                self.io_error |= IOERR_GENERAL;
                None
            }
        }
    }

    /// Adds an entry when its type is wanted. Returns `true` if it was added.
    fn push(&mut self, name: Vec<u8>, source: PathBuf, metadata: &Metadata, top: bool) -> bool {
        let Some(file_type) = FileType::from_mode(metadata.mode()) else {
            return false;
        };
        let display = String::from_utf8_lossy(&name).into_owned();
        let mut entry = match FileEntry::from_mode(name, metadata.mode()) {
            Some(entry) => entry
                .with_mtime(metadata.mtime())
                .with_uid(metadata.uid())
                .with_gid(metadata.gid())
                .with_top_dir(top),
            None => return false,
        };
        match file_type {
            FileType::Regular => entry = entry.with_size(metadata.len()),
            FileType::Directory => {}
            FileType::Symlink => {
                if !self.builder.links {
                    info_log!(self.logger(), Nonreg, 1, "skipping non-regular file \"{display}\"");
                    return false;
                }
                match fs::read_link(&source) {
                    Ok(target) => {
                        entry = entry
                            .with_size(metadata.len())
                            .with_link_target(target.into_os_string().as_bytes());
                    }
                    Err(error) => {
                        error_log!(self.logger(), "readlink {display} failed: {error}");
                        self.io_error |= IOERR_GENERAL;
                        return false;
                    }
                }
            }
            _ => {
                if !self.builder.devices {
                    info_log!(self.logger(), Nonreg, 1, "skipping non-regular file \"{display}\"");
                    return false;
                }
                entry = entry.with_rdev(rdev_from_dev(metadata.rdev()));
            }
        }
        debug_log!(self.logger(), Flist, 2, "listing {display}");
        self.found.push((entry, source));
        true
    }
}
