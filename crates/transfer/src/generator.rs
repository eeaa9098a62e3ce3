//! The generator half of the receiving side.
//!
//! Walks the file list in order and brings each destination entry up to
//! date where it can do so locally: directories, symlinks and special files
//! are created directly, unchanged regular files are skipped by the quick
//! check. Every other regular file is requested from the sender, with block
//! signatures of the existing copy when there is one.

use std::ffi::OsStr;
use std::fs::{self, File, Metadata};
use std::io::{self, BufReader, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, symlink};
use std::path::{Path, PathBuf};

use logging::{Logger, debug_log, error_log, info_log, warn_log};
use metadata::{MetadataOptions, apply_entry_metadata, create_special, rdev_from_dev};
use protocol::flist::{FileEntry, FileList, FileType};
use protocol::varint::write_int;
use signature::{FileSignature, generate_file_signature, sum_sizes_sqroot};

use crate::cancel::CancelToken;
use crate::destination::Destination;
use crate::error::TransferError;
use crate::options::TransferOptions;
use crate::receiver::Ownerships;

/// What the generator did with the file list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct GeneratorReport {
    /// Regular files requested from the sender.
    pub requested: usize,
    /// Regular files already up to date.
    pub skipped: usize,
    /// Entries that could not be created or requested.
    pub failed: usize,
    /// Attributes that could not be applied.
    pub metadata_errors: Vec<(PathBuf, String)>,
}

pub(crate) struct Generator<'a> {
    pub options: &'a TransferOptions,
    pub metadata: MetadataOptions,
    pub logger: Logger,
    pub list: &'a FileList,
    pub dest: &'a Destination,
    pub owners: &'a Ownerships,
    pub cancel: &'a CancelToken,
}

impl Generator<'_> {
    /// Processes every entry, then closes both request phases.
    pub fn run<W: Write + ?Sized>(&self, writer: &mut W) -> Result<GeneratorReport, TransferError> {
        let mut report = GeneratorReport::default();
        for (index, entry) in self.list.entries.iter().enumerate() {
            self.cancel.check()?;
            let index = i32::try_from(index).map_err(|_| {
                TransferError::Unsupported(format!("file lists longer than {} entries", i32::MAX))
            })?;
            self.generate(index, entry, writer, &mut report)?;
        }

        write_int(writer, -1)?;
        writer.flush()?;
        debug_log!(self.logger, Genr, 1, "generate_files phase=1");
        // Failed files are not retried, so the redo phase is empty.
        write_int(writer, -1)?;
        writer.flush()?;
        debug_log!(self.logger, Genr, 1, "generate_files finished");
        Ok(report)
    }

    fn generate<W: Write + ?Sized>(
        &self,
        index: i32,
        entry: &FileEntry,
        writer: &mut W,
        report: &mut GeneratorReport,
    ) -> Result<(), TransferError> {
        let path = self.dest.path_for(entry);
        debug_log!(self.logger, Genr, 2, "recv_generator({}, {index})", path.display());
        let existing = match fs::symlink_metadata(&path) {
            Ok(metadata) => Some(metadata),
            Err(error) if error.kind() == io::ErrorKind::NotFound => None,
            Err(error) => {
                self.fail(report, &format!("stat {} failed: {error}", path.display()));
                return Ok(());
            }
        };

        match entry.file_type() {
            FileType::Directory => self.make_directory(entry, &path, existing.as_ref(), report),
            FileType::Symlink => self.make_symlink(entry, &path, existing.as_ref(), report),
            FileType::Regular => self.request_file(index, entry, &path, existing, writer, report)?,
            FileType::CharDevice | FileType::BlockDevice | FileType::Fifo | FileType::Socket => {
                self.make_special(entry, &path, existing.as_ref(), report);
            }
        }
        Ok(())
    }

    fn make_directory(
        &self,
        entry: &FileEntry,
        path: &Path,
        existing: Option<&Metadata>,
        report: &mut GeneratorReport,
    ) {
        if existing.is_some_and(Metadata::is_dir) {
            return;
        }
        if self.options.dry_run {
            info_log!(self.logger, Name, 1, "{}/", entry.name());
            return;
        }
        if let Some(metadata) = existing
            && !self.remove_existing(path, metadata, report)
        {
            return;
        }
        match fs::create_dir(path) {
            Ok(()) => info_log!(self.logger, Name, 1, "{}/", entry.name()),
            Err(error) => self.fail(
                report,
                &format!("mkdir {} failed: {error}", path.display()),
            ),
        }
    }

    fn make_symlink(
        &self,
        entry: &FileEntry,
        path: &Path,
        existing: Option<&Metadata>,
        report: &mut GeneratorReport,
    ) {
        let Some(target) = entry.link_target() else {
            self.fail(report, &format!("symlink {} has no target", entry.name()));
            return;
        };
        let target = OsStr::from_bytes(target);
        if let Some(metadata) = existing {
            if metadata.file_type().is_symlink()
                && fs::read_link(path).is_ok_and(|current| current.as_os_str() == target)
            {
                self.apply_metadata(entry, path, report);
                return;
            }
            if self.options.dry_run {
                info_log!(self.logger, Name, 1, "{} -> {}", entry.name(), target.display());
                return;
            }
            if !self.remove_existing(path, metadata, report) {
                return;
            }
        } else if self.options.dry_run {
            info_log!(self.logger, Name, 1, "{} -> {}", entry.name(), target.display());
            return;
        }

        match symlink(target, path) {
            Ok(()) => {
                info_log!(self.logger, Name, 1, "{} -> {}", entry.name(), target.display());
                self.apply_metadata(entry, path, report);
            }
            Err(error) => self.fail(
                report,
                &format!("symlink {} -> {} failed: {error}", path.display(), target.display()),
            ),
        }
    }

    fn make_special(
        &self,
        entry: &FileEntry,
        path: &Path,
        existing: Option<&Metadata>,
        report: &mut GeneratorReport,
    ) {
        if let Some(metadata) = existing {
            let same_type = FileType::from_mode(metadata.mode()) == Some(entry.file_type());
            let same_rdev = rdev_from_dev(metadata.rdev()) == entry.rdev().unwrap_or(0);
            if same_type && same_rdev {
                self.apply_metadata(entry, path, report);
                return;
            }
        }
        if self.options.dry_run {
            info_log!(self.logger, Name, 1, "{}", entry.name());
            return;
        }
        if let Some(metadata) = existing
            && !self.remove_existing(path, metadata, report)
        {
            return;
        }
        match create_special(path, entry) {
            Ok(()) => {
                info_log!(self.logger, Name, 1, "{}", entry.name());
                self.apply_metadata(entry, path, report);
            }
            Err(error) => self.fail(report, &error.to_string()),
        }
    }

    fn request_file<W: Write + ?Sized>(
        &self,
        index: i32,
        entry: &FileEntry,
        path: &Path,
        existing: Option<Metadata>,
        writer: &mut W,
        report: &mut GeneratorReport,
    ) -> Result<(), TransferError> {
        let basis_len = match existing {
            Some(metadata) if metadata.is_file() => {
                if !self.options.ignore_times
                    && metadata.len() == entry.size()
                    && metadata.mtime() == entry.mtime()
                {
                    info_log!(self.logger, Skip, 1, "{} is uptodate", entry.name());
                    self.apply_metadata(entry, path, report);
                    report.skipped += 1;
                    return Ok(());
                }
                Some(metadata.len())
            }
            Some(metadata) => {
                if !self.options.dry_run && !self.remove_existing(path, &metadata, report) {
                    return Ok(());
                }
                None
            }
            None => None,
        };

        report.requested += 1;
        if self.options.dry_run {
            info_log!(self.logger, Name, 1, "{}", entry.name());
            return Ok(());
        }

        let signature = basis_len
            .and_then(|len| self.basis_signature(path, len))
            .unwrap_or_else(FileSignature::empty);
        debug_log!(
            self.logger,
            Genr,
            1,
            "requesting {} with {} blocks of {} bytes",
            entry.name(),
            signature.head().count,
            signature.head().block_length
        );
        write_int(writer, index)?;
        signature.write_to(writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Block signatures of the existing copy. `None` falls back to a
    /// whole-file request.
    fn basis_signature(&self, path: &Path, len: u64) -> Option<FileSignature> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) => {
                warn_log!(self.logger, "failed to open basis {}: {error}", path.display());
                return None;
            }
        };
        let head = sum_sizes_sqroot(len).ok()?;
        match generate_file_signature(BufReader::new(file), head, self.options.seed) {
            Ok(signature) => Some(signature),
            Err(error) => {
                warn_log!(self.logger, "failed to checksum basis {}: {error}", path.display());
                None
            }
        }
    }

    /// Deletes whatever is in the way of a new entry. Returns `false` when
    /// the entry had to be given up.
    fn remove_existing(&self, path: &Path, metadata: &Metadata, report: &mut GeneratorReport) -> bool {
        let removed = if metadata.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match removed {
            Ok(()) => {
                debug_log!(self.logger, Genr, 1, "removed {}", path.display());
                true
            }
            Err(error) => {
                self.fail(report, &format!("delete {} failed: {error}", path.display()));
                false
            }
        }
    }

    fn apply_metadata(&self, entry: &FileEntry, path: &Path, report: &mut GeneratorReport) {
        if self.options.dry_run {
            return;
        }
        let ownership = self.owners.for_entry(entry);
        if let Err(error) = apply_entry_metadata(path, entry, &self.metadata, ownership) {
            warn_log!(self.logger, "{error}");
            report
                .metadata_errors
                .push((path.to_path_buf(), error.to_string()));
        }
    }

    fn fail(&self, report: &mut GeneratorReport, message: &str) {
        error_log!(self.logger, "{message}");
        report.failed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logging::{Role, VerbosityConfig};
    use protocol::varint::read_int;
    use protocol::wire::{read_sum_bufs, read_sum_head};
    use std::io::Cursor;
    use tempfile::tempdir;

    struct Fixture {
        options: TransferOptions,
        logger: Logger,
        owners: Ownerships,
        cancel: CancelToken,
    }

    impl Fixture {
        fn new(options: TransferOptions) -> Self {
            Self {
                owners: Ownerships::new(&options, &FileList::default()),
                options,
                logger: Logger::capturing(VerbosityConfig::from_verbose_level(2), Role::Generator),
                cancel: CancelToken::new(),
            }
        }

        fn run(&self, list: &FileList, dest: &Destination) -> (GeneratorReport, Vec<u8>) {
            let generator = Generator {
                options: &self.options,
                metadata: self.options.metadata_options(),
                logger: self.logger.clone(),
                list,
                dest,
                owners: &self.owners,
                cancel: &self.cancel,
            };
            let mut out = Vec::new();
            let report = generator.run(&mut out).expect("generate");
            (report, out)
        }
    }

    #[test]
    fn missing_file_is_requested_whole() {
        let dir = tempdir().expect("tempdir");
        let list = FileList::new(vec![FileEntry::regular("new.txt", 10, 0o644)]);
        let dest = Destination::directory(dir.path());
        let (report, out) = Fixture::new(TransferOptions::default()).run(&list, &dest);

        assert_eq!(report.requested, 1);
        let mut cursor = Cursor::new(out);
        assert_eq!(read_int(&mut cursor).expect("index"), 0);
        assert!(read_sum_head(&mut cursor).expect("head").is_empty());
        assert_eq!(read_int(&mut cursor).expect("phase"), -1);
        assert_eq!(read_int(&mut cursor).expect("phase"), -1);
    }

    #[test]
    fn existing_file_is_requested_with_signature() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("data"), vec![3u8; 5000]).expect("write");
        let list = FileList::new(vec![FileEntry::regular("data", 6000, 0o644).with_mtime(1)]);
        let dest = Destination::directory(dir.path());
        let (_, out) = Fixture::new(TransferOptions::default()).run(&list, &dest);

        let mut cursor = Cursor::new(out);
        assert_eq!(read_int(&mut cursor).expect("index"), 0);
        let head = read_sum_head(&mut cursor).expect("head");
        assert_eq!(head.file_length(), 5000);
        assert_eq!(read_sum_bufs(&mut cursor, &head).expect("sums").len(), head.count as usize);
        assert_eq!(read_int(&mut cursor).expect("phase"), -1);
    }

    #[test]
    fn quick_check_skips_matching_files() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("same");
        fs::write(&path, b"hello").expect("write");
        let mtime = fs::metadata(&path).expect("stat").mtime();
        let list = FileList::new(vec![FileEntry::regular("same", 5, 0o644).with_mtime(mtime)]);
        let dest = Destination::directory(dir.path());

        let fixture = Fixture::new(TransferOptions::default());
        let (report, out) = fixture.run(&list, &dest);
        assert_eq!(report.skipped, 1);
        assert_eq!(out, [(-1i32).to_le_bytes(), (-1i32).to_le_bytes()].concat());
        assert!(
            fixture
                .logger
                .captured()
                .iter()
                .any(|event| event.message == "same is uptodate")
        );

        let ignore_times = TransferOptions {
            ignore_times: true,
            ..TransferOptions::default()
        };
        let (report, _) = Fixture::new(ignore_times).run(&list, &dest);
        assert_eq!(report.requested, 1);
    }

    #[test]
    fn creates_directories_and_symlinks() {
        let dir = tempdir().expect("tempdir");
        let list = FileList::new(vec![
            FileEntry::directory("sub", 0o755),
            FileEntry::symlink("sub/link", "../target"),
        ]);
        let dest = Destination::directory(dir.path());
        let options = TransferOptions {
            links: true,
            ..TransferOptions::default()
        };
        let (report, out) = Fixture::new(options).run(&list, &dest);

        assert_eq!(report.failed, 0);
        assert!(dir.path().join("sub").is_dir());
        assert_eq!(
            fs::read_link(dir.path().join("sub/link")).expect("link"),
            Path::new("../target")
        );
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn wrong_symlink_target_is_replaced() {
        let dir = tempdir().expect("tempdir");
        symlink("elsewhere", dir.path().join("hey")).expect("symlink");
        let list = FileList::new(vec![FileEntry::symlink("hey", "hello")]);
        let dest = Destination::directory(dir.path());
        let options = TransferOptions {
            links: true,
            ..TransferOptions::default()
        };
        Fixture::new(options).run(&list, &dest);
        assert_eq!(fs::read_link(dir.path().join("hey")).expect("link"), Path::new("hello"));
    }

    #[test]
    fn directory_in_place_of_file_is_removed() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("blocker/inner")).expect("mkdir");
        let list = FileList::new(vec![FileEntry::regular("blocker", 3, 0o644)]);
        let dest = Destination::directory(dir.path());
        let (report, out) = Fixture::new(TransferOptions::default()).run(&list, &dest);

        assert_eq!(report.requested, 1);
        assert!(!dir.path().join("blocker").exists());
        let mut cursor = Cursor::new(out);
        assert_eq!(read_int(&mut cursor).expect("index"), 0);
        assert!(read_sum_head(&mut cursor).expect("head").is_empty());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = tempdir().expect("tempdir");
        let list = FileList::new(vec![
            FileEntry::directory("sub", 0o755),
            FileEntry::regular("sub/file", 3, 0o644),
        ]);
        let dest = Destination::directory(dir.path());
        let options = TransferOptions {
            dry_run: true,
            ..TransferOptions::default()
        };
        let fixture = Fixture::new(options);
        let (report, out) = fixture.run(&list, &dest);

        assert_eq!(report.requested, 1);
        assert!(!dir.path().join("sub").exists());
        assert_eq!(out.len(), 8);
        let names: Vec<String> = fixture
            .logger
            .captured()
            .into_iter()
            .map(|event| event.message)
            .collect();
        assert!(names.contains(&"sub/".to_owned()));
        assert!(names.contains(&"sub/file".to_owned()));
    }

    #[test]
    fn cancellation_stops_generation() {
        let dir = tempdir().expect("tempdir");
        let list = FileList::new(vec![FileEntry::regular("a", 1, 0o644)]);
        let dest = Destination::directory(dir.path());
        let fixture = Fixture::new(TransferOptions::default());
        fixture.cancel.cancel();
        let generator = Generator {
            options: &fixture.options,
            metadata: fixture.options.metadata_options(),
            logger: fixture.logger.clone(),
            list: &list,
            dest: &dest,
            owners: &fixture.owners,
            cancel: &fixture.cancel,
        };
        let mut out = Vec::new();
        assert!(matches!(generator.run(&mut out), Err(TransferError::Cancelled)));
        assert!(out.is_empty());
    }
}
