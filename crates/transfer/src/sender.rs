//! The sending role.
//!
//! The sender builds the file list from local paths, answers each request
//! from the peer's generator with the file's delta against the signature
//! that came with the request, and closes the session with the statistics
//! exchange.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::thread;

use checksums::{FileDigest, MD4_DIGEST_LEN};
use filters::{FilterRule, FilterSet};
use flist::{BuiltFileList, FileListBuilder, IOERR_GENERAL, IOERR_VANISHED};
use logging::{Logger, Role, debug_log, error_log, info_log, warn_log};
use matching::{HashSearch, MapFile, WireTokenSink, whole_file_digest};
use protocol::ProtocolError;
use protocol::filters::read_filter_list;
use protocol::flist::{FileEntry, write_file_list};
use protocol::varint::{read_int, write_int, write_longint};
use protocol::wire::{CHUNK_SIZE, read_sum_bufs, read_sum_head, write_end, write_literal, write_sum_head};
use signature::FileSignature;

use crate::connection::Connection;
use crate::error::TransferError;
use crate::options::TransferOptions;
use crate::stats::TransferStats;

/// Phase after which the sender stops answering requests. Protocol 27 has a
/// single redo phase after the first pass.
const MAX_PHASE: u32 = 1;

/// Sends local files to a receiving peer.
#[derive(Clone, Debug)]
pub struct Sender {
    options: TransferOptions,
    logger: Logger,
}

impl Sender {
    /// Creates a sender. Diagnostics are reported under [`Role::Sender`].
    pub fn new(options: TransferOptions, logger: Logger) -> Self {
        Self {
            options,
            logger: logger.with_role(Role::Sender),
        }
    }

    /// Runs the sending side of a session over `conn` for the operand paths
    /// in `sources`.
    ///
    /// A fatal error is reported to the peer over the error channel when the
    /// output is multiplexed, then returned.
    pub fn run<R, W, P>(
        &self,
        conn: &mut Connection<R, W>,
        sources: &[P],
    ) -> Result<TransferStats, TransferError>
    where
        R: Read,
        W: Write,
        P: AsRef<Path>,
    {
        let result = self.run_session(conn, sources);
        if let Err(error) = &result {
            error_log!(self.logger, "{error}");
            conn.report_error(error);
        }
        result
    }

    fn run_session<R, W, P>(
        &self,
        conn: &mut Connection<R, W>,
        sources: &[P],
    ) -> Result<TransferStats, TransferError>
    where
        R: Read,
        W: Write,
        P: AsRef<Path>,
    {
        let mut rules = self.options.filters.clone();
        if self.options.server {
            let received = read_filter_list(conn.reader())?;
            debug_log!(self.logger, Filter, 1, "received {} filter rules", received.len());
            rules.extend(received.iter().map(FilterRule::from_wire));
        }

        let built = FileListBuilder::new(self.logger.clone())
            .recursive(self.options.recursive)
            .links(self.options.links)
            .devices(self.options.devices)
            .owner(self.options.owner)
            .group(self.options.group)
            .numeric_ids(self.options.numeric_ids)
            .filters(FilterSet::from_rules(rules)?)
            .build(sources)?;
        write_file_list(conn.writer(), &built.list, self.options.list_options())?;
        conn.writer().flush()?;

        let mut stats = TransferStats {
            files_listed: built.list.len(),
            total_size: built.list.total_size(),
            io_error: built.list.io_error,
            ..TransferStats::default()
        };
        info_log!(self.logger, Flist, 1, "sent file list with {} entries", stats.files_listed);
        if built.list.is_empty() {
            info_log!(self.logger, Misc, 1, "nothing to send");
            stats.bytes_read = conn.bytes_read();
            stats.bytes_written = conn.bytes_written();
            return Ok(stats);
        }

        self.send_files(conn, &built, &mut stats)?;

        write_int(conn.writer(), -1)?;
        conn.writer().flush()?;
        stats.bytes_read = conn.bytes_read();
        stats.bytes_written = conn.bytes_written();
        if self.options.server {
            write_longint(conn.writer(), stats.bytes_read as i64)?;
            write_longint(conn.writer(), stats.bytes_written as i64)?;
            write_longint(conn.writer(), stats.total_size as i64)?;
            conn.writer().flush()?;
        }

        let goodbye = read_int(conn.reader())?;
        if goodbye != -1 {
            return Err(io::Error::from(ProtocolError::Unexpected(format!(
                "value {goodbye} in place of the final goodbye"
            )))
            .into());
        }
        stats.bytes_read = conn.bytes_read();
        stats.bytes_written = conn.bytes_written();
        Ok(stats)
    }

    /// Answers requests until the generator has closed both phases.
    fn send_files<R: Read, W: Write>(
        &self,
        conn: &mut Connection<R, W>,
        built: &BuiltFileList,
        stats: &mut TransferStats,
    ) -> Result<(), TransferError> {
        let mut phase = 0;
        loop {
            let index = read_int(conn.reader())?;
            if index == -1 {
                phase += 1;
                if phase > MAX_PHASE {
                    return Ok(());
                }
                debug_log!(self.logger, Send, 1, "send_files phase={phase}");
                write_int(conn.writer(), -1)?;
                conn.writer().flush()?;
                continue;
            }

            let (entry, source) = built
                .list
                .get(index)
                .zip(usize::try_from(index).ok().and_then(|i| built.source(i)))
                .ok_or_else(|| {
                    io::Error::from(ProtocolError::InvalidIndex {
                        index,
                        len: built.list.len(),
                    })
                })?;
            let head = read_sum_head(conn.reader())?;
            let blocks = read_sum_bufs(conn.reader(), &head)?;
            let signature = FileSignature::from_raw_parts(head, blocks);
            debug_log!(
                self.logger,
                Send,
                1,
                "send_files({index}, {}) with {} blocks",
                source.display(),
                signature.blocks().len()
            );
            self.send_file(conn, index, entry, source, &signature, stats)?;
        }
    }

    fn send_file<R: Read, W: Write>(
        &self,
        conn: &mut Connection<R, W>,
        index: i32,
        entry: &FileEntry,
        source: &Path,
        signature: &FileSignature,
        stats: &mut TransferStats,
    ) -> Result<(), TransferError> {
        let file = match File::open(source) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                warn_log!(self.logger, "file has vanished: {}", source.display());
                stats.io_error |= IOERR_VANISHED;
                stats.files_failed += 1;
                return Ok(());
            }
            Err(error) if error.kind() == io::ErrorKind::PermissionDenied => {
                error_log!(self.logger, "send_files failed to open {}: {error}", source.display());
                stats.io_error |= IOERR_GENERAL;
                stats.files_failed += 1;
                return Ok(());
            }
            Err(error) => return Err(TransferError::io("open", source, error)),
        };
        let len = file
            .metadata()
            .map_err(|error| TransferError::io("stat", source, error))?
            .len();

        let writer = conn.writer();
        write_int(writer, index)?;
        write_sum_head(writer, signature.head())?;

        let digest = if signature.is_empty() {
            let digest = send_whole_file(writer, file, source, len, self.options.seed)?;
            stats.literal_bytes += len;
            digest
        } else {
            let mut map = MapFile::new(file, len, signature.head().block_length);
            let report = HashSearch::new(signature, self.options.seed)
                .with_logger(self.logger.clone())
                .run(&mut map, &mut WireTokenSink::new(writer))?;
            stats.literal_bytes += report.literal_bytes;
            stats.matched_bytes += report.matched_bytes;
            report.digest
        };
        writer.write_all(&digest)?;
        stats.files_transferred += 1;
        info_log!(self.logger, Name, 2, "{}", entry.name());
        Ok(())
    }
}

/// Streams the first `len` bytes of `file` as literal data followed by the
/// end token, and returns the whole-file digest.
///
/// The digest is computed on a second handle in parallel with the transmit
/// loop. When the second open fails the digest is accumulated inline.
fn send_whole_file<W: Write + ?Sized>(
    writer: &mut W,
    file: File,
    source: &Path,
    len: u64,
    seed: i32,
) -> io::Result<[u8; MD4_DIGEST_LEN]> {
    let second = File::open(source).ok();
    thread::scope(|scope| {
        let digest_task = second.map(|handle| {
            scope.spawn(move || whole_file_digest(BufReader::new(handle).take(len), seed))
        });
        let mut inline = FileDigest::new(seed);

        let mut reader = file.take(len);
        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            };
            write_literal(writer, &buffer[..read])?;
            if digest_task.is_none() {
                inline.update(&buffer[..read]);
            }
        }
        write_end(writer)?;

        match digest_task {
            Some(task) => task
                .join()
                .map_err(|_| io::Error::other("digest thread panicked"))?,
            None => Ok(inline.finalize()),
        }
    })
}
