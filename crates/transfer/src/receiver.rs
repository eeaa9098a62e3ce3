//! The receiving role.
//!
//! A receiver session runs two halves at once over one connection. The
//! [generator](crate::generator) thread owns the write half and requests
//! files; the receive phase, on the calling thread, owns the read half and
//! rebuilds each requested file from the sender's token stream. The halves
//! share nothing but the file list and a [`CancelToken`] that lets either
//! one stop the other when it fails.

use std::fs::{self, File, Permissions};
use std::io::{self, BufWriter, Read, Write};
use std::os::unix::fs::{FileExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::thread;

use checksums::{FileDigest, MD4_DIGEST_LEN};
use logging::{Logger, Role, debug_log, error_log, info_log, warn_log};
use metadata::{IdMapper, MetadataOptions, Ownership, apply_entry_metadata};
use protocol::ProtocolError;
use protocol::filters::write_filter_list;
use protocol::flist::{FileEntry, FileList, read_file_list};
use protocol::varint::{read_int, read_longint, write_int};
use protocol::wire::{SumHead, Token, TokenReader, read_sum_head};

use crate::cancel::CancelToken;
use crate::connection::Connection;
use crate::destination::Destination;
use crate::error::TransferError;
use crate::generator::{Generator, GeneratorReport};
use crate::options::TransferOptions;
use crate::stats::{PeerStats, TransferStats};
use crate::temp::open_tmpfile;

/// Mode bits cleared from new files when permissions are not preserved.
const DEFAULT_UMASK: u32 = 0o022;

/// Maps the sender's uids and gids to local ones.
#[derive(Clone, Debug, Default)]
pub(crate) struct Ownerships {
    users: IdMapper,
    groups: IdMapper,
}

impl Ownerships {
    /// Resolves the name lists of `list` unless ids are numeric.
    pub fn new(options: &TransferOptions, list: &FileList) -> Self {
        let users = if options.owner && !options.numeric_ids {
            IdMapper::for_users(&list.uid_names)
        } else {
            IdMapper::identity()
        };
        let groups = if options.group && !options.numeric_ids {
            IdMapper::for_groups(&list.gid_names)
        } else {
            IdMapper::identity()
        };
        Self { users, groups }
    }

    /// Local owner and group for `entry`.
    pub fn for_entry(&self, entry: &FileEntry) -> Ownership {
        Ownership {
            uid: entry.uid().map(|uid| self.users.map(uid)),
            gid: entry.gid().map(|gid| self.groups.map(gid)),
        }
    }
}

/// Receives files from a sending peer into a local destination.
#[derive(Clone, Debug)]
pub struct Receiver {
    options: TransferOptions,
    logger: Logger,
    cancel: CancelToken,
}

impl Receiver {
    /// Creates a receiver. Diagnostics are reported under
    /// [`Role::Receiver`] and [`Role::Generator`].
    pub fn new(options: TransferOptions, logger: Logger) -> Self {
        Self {
            options,
            logger: logger.with_role(Role::Receiver),
            cancel: CancelToken::new(),
        }
    }

    /// Uses `cancel` to coordinate the two halves of the session. Register
    /// a hook on it that unblocks the transport, such as a socket shutdown,
    /// so that a failure on one side cannot leave the other waiting.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the receiving side of a session over `conn`, placing entries
    /// under `dest`.
    ///
    /// A fatal error is reported to the peer over the error channel when the
    /// output is multiplexed, then returned. Files that fail individually
    /// are counted in [`TransferStats::files_failed`] instead.
    pub fn run<R, W>(
        &self,
        conn: &mut Connection<R, W>,
        dest: &Path,
    ) -> Result<TransferStats, TransferError>
    where
        R: Read,
        W: Write + Send,
    {
        let result = self.run_session(conn, dest);
        if let Err(error) = &result {
            if !matches!(error, TransferError::Cancelled) {
                error_log!(self.logger, "{error}");
            }
            conn.report_error(error);
        }
        result
    }

    fn run_session<R, W>(
        &self,
        conn: &mut Connection<R, W>,
        dest: &Path,
    ) -> Result<TransferStats, TransferError>
    where
        R: Read,
        W: Write + Send,
    {
        if !self.options.server {
            let rules: Vec<_> = self.options.filters.iter().map(|rule| rule.to_wire()).collect();
            write_filter_list(conn.writer(), &rules)?;
            conn.writer().flush()?;
        }

        let list = read_file_list(conn.reader(), self.options.list_options())?;
        info_log!(self.logger, Flist, 1, "received {} file list entries", list.len());
        let mut stats = TransferStats {
            files_listed: list.len(),
            total_size: list.total_size(),
            io_error: list.io_error,
            ..TransferStats::default()
        };
        if list.io_error != 0 {
            warn_log!(self.logger, "some files could not be listed by the sender (io_error={})", list.io_error);
        }
        if list.is_empty() {
            info_log!(self.logger, Misc, 1, "nothing to do: file list is empty");
            stats.bytes_read = conn.bytes_read();
            stats.bytes_written = conn.bytes_written();
            return Ok(stats);
        }

        let dest = Destination::resolve(dest, &list, self.options.dry_run)?;
        let owners = Ownerships::new(&self.options, &list);
        let metadata = self.options.metadata_options();

        let (generated, received) = self.run_halves(conn, &list, &dest, &owners, metadata);
        let (generated, received) = merge_results(generated, received)?;
        stats.files_skipped = generated.skipped;
        stats.files_failed = generated.failed + received.failed;
        stats.files_transferred = received.transferred;
        stats.literal_bytes = received.literal_bytes;
        stats.matched_bytes = received.matched_bytes;
        stats.metadata_errors = generated.metadata_errors;
        stats.metadata_errors.extend(received.metadata_errors);

        if !self.options.server {
            let reader = conn.reader();
            stats.peer = Some(PeerStats {
                total_read: read_longint(reader)?,
                total_written: read_longint(reader)?,
                total_size: read_longint(reader)?,
            });
        }

        if !self.options.dry_run {
            self.finish_directories(&list, &dest, &owners, metadata, &mut stats);
        }

        write_int(conn.writer(), -1)?;
        conn.writer().flush()?;
        stats.bytes_read = conn.bytes_read();
        stats.bytes_written = conn.bytes_written();
        Ok(stats)
    }

    /// Runs the generator on a scoped thread and the receive phase on this
    /// one. Whichever fails first cancels the other.
    fn run_halves<R, W>(
        &self,
        conn: &mut Connection<R, W>,
        list: &FileList,
        dest: &Destination,
        owners: &Ownerships,
        metadata: MetadataOptions,
    ) -> (
        Result<GeneratorReport, TransferError>,
        Result<ReceiveReport, TransferError>,
    )
    where
        R: Read,
        W: Write + Send,
    {
        let (reader, writer) = conn.split();
        let cancel = &self.cancel;
        let generator = Generator {
            options: &self.options,
            metadata,
            logger: self.logger.with_role(Role::Generator),
            list,
            dest,
            owners,
            cancel,
        };
        let phase = ReceivePhase {
            options: &self.options,
            metadata,
            logger: &self.logger,
            list,
            dest,
            owners,
            cancel,
        };

        thread::scope(|scope| {
            let task = scope.spawn(move || {
                let result = generator.run(writer);
                if result.is_err() {
                    cancel.cancel();
                }
                result
            });
            let received = phase.run(reader);
            if received.is_err() {
                cancel.cancel();
            }
            let generated = task.join().unwrap_or_else(|_| {
                Err(TransferError::Protocol(io::Error::other("generator thread panicked")))
            });
            (generated, received)
        })
    }

    /// Applies directory attributes once their contents are in place, so
    /// that new entries do not disturb the modification times.
    fn finish_directories(
        &self,
        list: &FileList,
        dest: &Destination,
        owners: &Ownerships,
        metadata: MetadataOptions,
        stats: &mut TransferStats,
    ) {
        for entry in list.entries.iter().filter(|entry| entry.is_dir()) {
            let path = dest.path_for(entry);
            if !path.is_dir() {
                continue;
            }
            if let Err(error) = apply_entry_metadata(&path, entry, &metadata, owners.for_entry(entry)) {
                warn_log!(self.logger, "{error}");
                stats.metadata_errors.push((path, error.to_string()));
            }
        }
    }
}

/// Keeps the more informative of two half-session results: an error that
/// caused a cancellation wins over the resulting [`TransferError::Cancelled`].
fn merge_results(
    generated: Result<GeneratorReport, TransferError>,
    received: Result<ReceiveReport, TransferError>,
) -> Result<(GeneratorReport, ReceiveReport), TransferError> {
    match (generated, received) {
        (Ok(generated), Ok(received)) => Ok((generated, received)),
        (Err(TransferError::Cancelled), Err(error)) | (Err(error), _) | (_, Err(error)) => {
            Err(error)
        }
    }
}

#[derive(Debug, Default)]
struct ReceiveReport {
    transferred: usize,
    failed: usize,
    literal_bytes: u64,
    matched_bytes: u64,
    metadata_errors: Vec<(PathBuf, String)>,
}

struct ReceivePhase<'a> {
    options: &'a TransferOptions,
    metadata: MetadataOptions,
    logger: &'a Logger,
    list: &'a FileList,
    dest: &'a Destination,
    owners: &'a Ownerships,
    cancel: &'a CancelToken,
}

impl ReceivePhase<'_> {
    /// Receives files until the sender closes its second phase.
    fn run<R: Read + ?Sized>(&self, reader: &mut R) -> Result<ReceiveReport, TransferError> {
        let mut report = ReceiveReport::default();
        let mut phase = 0;
        loop {
            let index = read_int(reader)?;
            if index == -1 {
                if phase > 0 {
                    return Ok(report);
                }
                phase += 1;
                debug_log!(self.logger, Recv, 1, "recv_files phase={phase}");
                continue;
            }
            self.cancel.check()?;

            let entry = self.list.get(index).ok_or_else(|| {
                io::Error::from(ProtocolError::InvalidIndex {
                    index,
                    len: self.list.len(),
                })
            })?;
            if !entry.file_type().is_regular() {
                return Err(io::Error::from(ProtocolError::Unexpected(format!(
                    "file data for non-regular entry {}",
                    entry.name()
                )))
                .into());
            }
            let head = read_sum_head(reader)?;
            debug_log!(self.logger, Recv, 1, "recv_files({})", entry.name());
            self.receive_file(reader, entry, &head, &mut report)?;
        }
    }

    /// Rebuilds one file. Local failures cost only this file; the token
    /// stream is always consumed so the connection stays in step.
    fn receive_file<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        entry: &FileEntry,
        head: &SumHead,
        report: &mut ReceiveReport,
    ) -> Result<(), TransferError> {
        let path = self.dest.path_for(entry);
        let basis = if head.is_empty() {
            None
        } else {
            match File::open(&path) {
                Ok(file) => Some(file),
                Err(error) => {
                    error_log!(self.logger, "failed to open basis {}: {error}", path.display());
                    None
                }
            }
        };
        let mut target = open_tmpfile(&path)
            .map(|(file, guard)| (BufWriter::new(file), guard))
            .map_err(|error| TransferError::io("create temporary file for", &path, error));

        let output = target.as_mut().ok().map(|(writer, _)| writer);
        let data = receive_data(reader, head, basis.as_ref(), output, self.options.seed, &path)?;
        report.literal_bytes += data.literal_bytes;
        report.matched_bytes += data.matched_bytes;

        let (writer, mut guard) = match (target, data.local_error) {
            (Err(error), _) | (Ok(_), Some(error)) => {
                error_log!(self.logger, "{error}");
                report.failed += 1;
                return Ok(());
            }
            (Ok(target), None) => target,
        };
        if data.digest != data.expected {
            let error = TransferError::Corruption { path: path.clone() };
            error_log!(self.logger, "{error}; update discarded");
            report.failed += 1;
            return Ok(());
        }

        let committed = writer
            .into_inner()
            .map_err(|error| TransferError::io("write", guard.path(), error.into_error()))
            .and_then(|file| self.commit(entry, &path, &file, guard.path(), report));
        if let Err(error) = committed {
            error_log!(self.logger, "{error}");
            report.failed += 1;
            return Ok(());
        }
        guard.keep();
        if data.literal_bytes == 0 && data.matched_bytes > 0 {
            info_log!(self.logger, Copy, 1, "{} rebuilt from the local basis", entry.name());
        }
        info_log!(self.logger, Name, 1, "{}", entry.name());
        report.transferred += 1;
        Ok(())
    }

    /// Sets attributes on the temporary file and renames it into place.
    fn commit(
        &self,
        entry: &FileEntry,
        path: &Path,
        file: &File,
        temp_path: &Path,
        report: &mut ReceiveReport,
    ) -> Result<(), TransferError> {
        let mode = if self.options.perms {
            entry.permissions()
        } else {
            match fs::metadata(path) {
                Ok(existing) if existing.is_file() => existing.permissions().mode() & 0o7777,
                _ => entry.permissions() & !DEFAULT_UMASK,
            }
        };
        file.set_permissions(Permissions::from_mode(mode))
            .map_err(|error| TransferError::io("chmod", temp_path, error))?;

        let ownership = self.owners.for_entry(entry);
        if self.metadata.owner() || self.metadata.group() {
            debug_log!(
                self.logger,
                Own,
                1,
                "set ownership of {} to uid={:?} gid={:?}",
                entry.name(),
                ownership.uid,
                ownership.gid
            );
        }
        if let Err(error) = apply_entry_metadata(temp_path, entry, &self.metadata, ownership) {
            warn_log!(self.logger, "{error}");
            report
                .metadata_errors
                .push((path.to_path_buf(), error.to_string()));
        }

        fs::rename(temp_path, path).map_err(|error| TransferError::io("rename", path, error))
    }
}

/// The result of consuming one file's token stream.
struct ReceivedData {
    /// First local failure, if any. The file is unusable when set.
    local_error: Option<TransferError>,
    digest: [u8; MD4_DIGEST_LEN],
    expected: [u8; MD4_DIGEST_LEN],
    literal_bytes: u64,
    matched_bytes: u64,
}

/// Applies the token stream for one file to `output`.
///
/// Literal tokens are written as they arrive and copy tokens are read from
/// `basis` at the offset of the referenced block. The seeded digest covers
/// the reconstructed bytes in order. Errors reading the connection and block
/// indices outside the signature are fatal; a missing basis or a failed
/// write is recorded in [`ReceivedData::local_error`] and the rest of the
/// stream is still consumed.
fn receive_data<R, W>(
    reader: &mut R,
    head: &SumHead,
    basis: Option<&File>,
    mut output: Option<&mut W>,
    seed: i32,
    path: &Path,
) -> Result<ReceivedData, TransferError>
where
    R: Read + ?Sized,
    W: Write,
{
    let mut tokens = TokenReader::new();
    let mut digest = FileDigest::new(seed);
    let mut local_error = None;
    let mut block = Vec::new();
    let mut literal_bytes = 0u64;
    let mut matched_bytes = 0u64;

    loop {
        let token = tokens.next_token(reader)?;
        let data: &[u8] = match &token {
            Token::End => break,
            Token::Literal(data) => {
                literal_bytes += data.len() as u64;
                data
            }
            &Token::Copy(index) => {
                if index >= head.count {
                    return Err(io::Error::from(ProtocolError::Unexpected(format!(
                        "block index {index} beyond the {} blocks of {}",
                        head.count,
                        path.display()
                    )))
                    .into());
                }
                let len = head.block_len(index) as usize;
                matched_bytes += len as u64;
                block.resize(len, 0);
                let read = match basis {
                    Some(file) => file.read_exact_at(&mut block, head.offset(index)),
                    None => Err(io::Error::new(io::ErrorKind::NotFound, "no basis file")),
                };
                if let Err(error) = read {
                    local_error.get_or_insert_with(|| TransferError::io("read basis", path, error));
                }
                &block
            }
        };
        digest.update(data);
        if local_error.is_none()
            && let Some(out) = output.as_mut()
            && let Err(error) = out.write_all(data)
        {
            local_error = Some(TransferError::io("write", path, error));
        }
    }

    let mut expected = [0u8; MD4_DIGEST_LEN];
    reader.read_exact(&mut expected)?;
    Ok(ReceivedData {
        local_error,
        digest: digest.finalize(),
        expected,
        literal_bytes,
        matched_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::wire::{write_copy, write_end, write_literal};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn digest_of(seed: i32, data: &[u8]) -> [u8; MD4_DIGEST_LEN] {
        let mut digest = FileDigest::new(seed);
        digest.update(data);
        digest.finalize()
    }

    fn head(count: u32, block_length: u32, remainder: u32) -> SumHead {
        SumHead {
            count,
            block_length,
            checksum_length: 16,
            remainder,
        }
    }

    #[test]
    fn rebuilds_from_literals_and_copies() {
        let dir = tempdir().expect("tempdir");
        let basis_path = dir.path().join("basis");
        fs::write(&basis_path, b"AAAABBBBCC").expect("write");
        let basis = File::open(&basis_path).expect("open");

        let mut stream = Vec::new();
        write_copy(&mut stream, 1).expect("copy");
        write_literal(&mut stream, b"xyz").expect("literal");
        write_copy(&mut stream, 2).expect("copy");
        write_end(&mut stream).expect("end");
        stream.extend_from_slice(&digest_of(5, b"BBBBxyzCC"));

        let mut output = Vec::new();
        let data = receive_data(
            &mut Cursor::new(stream),
            &head(3, 4, 2),
            Some(&basis),
            Some(&mut output),
            5,
            &basis_path,
        )
        .expect("receive");

        assert!(data.local_error.is_none());
        assert_eq!(data.digest, data.expected);
        assert_eq!(data.literal_bytes, 3);
        assert_eq!(data.matched_bytes, 6);
        assert_eq!(output, b"BBBBxyzCC");
    }

    #[test]
    fn block_index_past_signature_is_fatal() {
        let mut stream = Vec::new();
        write_copy(&mut stream, 9).expect("copy");
        let err = receive_data(
            &mut Cursor::new(stream),
            &head(2, 4, 0),
            None,
            None::<&mut Vec<u8>>,
            0,
            Path::new("f"),
        )
        .err()
        .expect("protocol error");
        assert!(err.is_fatal());
    }

    #[test]
    fn missing_basis_consumes_stream_and_fails_file() {
        let mut stream = Vec::new();
        write_copy(&mut stream, 0).expect("copy");
        write_end(&mut stream).expect("end");
        stream.extend_from_slice(&[0u8; MD4_DIGEST_LEN]);
        write_int(&mut stream, -1).expect("trailer");

        let mut cursor = Cursor::new(stream);
        let mut output = Vec::new();
        let data = receive_data(
            &mut cursor,
            &head(1, 4, 0),
            None,
            Some(&mut output),
            0,
            Path::new("f"),
        )
        .expect("stream stays in step");
        assert!(data.local_error.is_some());
        assert!(output.is_empty());
        assert_eq!(read_int(&mut cursor).expect("next"), -1);
    }

    #[test]
    fn merge_prefers_the_cause_over_cancellation() {
        let merged = merge_results(
            Err(TransferError::Cancelled),
            Err(TransferError::Unsupported("x".to_owned())),
        );
        assert!(matches!(merged, Err(TransferError::Unsupported(_))));

        let merged = merge_results(
            Err(TransferError::Unsupported("y".to_owned())),
            Err(TransferError::Cancelled),
        );
        assert!(matches!(merged, Err(TransferError::Unsupported(_))));
    }

    #[test]
    fn ownership_passes_ids_through_with_numeric_ids() {
        let options = TransferOptions {
            owner: true,
            group: true,
            numeric_ids: true,
            ..TransferOptions::default()
        };
        let owners = Ownerships::new(&options, &FileList::default());
        let entry = FileEntry::regular("f", 1, 0o644).with_uid(1234).with_gid(99);
        assert_eq!(
            owners.for_entry(&entry),
            Ownership {
                uid: Some(1234),
                gid: Some(99)
            }
        );
    }
}
