use std::path::PathBuf;

use flist::IOERR_VANISHED;
use logging::{Logger, info_log};

use crate::error::{EXIT_PARTIAL, EXIT_VANISHED};

/// Totals the sender reports at the end of a session in which it ran as the
/// server.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PeerStats {
    /// Bytes the sender read from the connection.
    pub total_read: i64,
    /// Bytes the sender wrote to the connection.
    pub total_written: i64,
    /// Sum of the sizes of all listed files.
    pub total_size: i64,
}

/// Counters collected by one side of a transfer.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransferStats {
    /// Entries in the file list.
    pub files_listed: usize,
    /// Regular files whose data crossed the connection.
    pub files_transferred: usize,
    /// Regular files left alone because size and mtime matched.
    pub files_skipped: usize,
    /// Files that could not be transferred or failed verification.
    pub files_failed: usize,
    /// File data sent or received as literal tokens.
    pub literal_bytes: u64,
    /// File data reconstructed from matched blocks.
    pub matched_bytes: u64,
    /// Bytes read from the connection.
    pub bytes_read: u64,
    /// Bytes written to the connection.
    pub bytes_written: u64,
    /// Sum of the sizes of all listed entries.
    pub total_size: u64,
    /// I/O error flags carried by the file list.
    pub io_error: i32,
    /// Statistics reported by the sending server, when received.
    pub peer: Option<PeerStats>,
    /// Attributes that could not be applied (path, error).
    pub metadata_errors: Vec<(PathBuf, String)>,
}

impl TransferStats {
    /// Returns `true` when every listed file made it across.
    pub fn is_complete(&self) -> bool {
        self.files_failed == 0 && self.io_error == 0
    }

    /// Exit status for a session that ran to the end: partial transfer when
    /// files failed or could not be listed, vanished when sources only
    /// disappeared, success otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.files_failed > 0 || self.io_error & !IOERR_VANISHED != 0 {
            EXIT_PARTIAL
        } else if self.io_error != 0 {
            EXIT_VANISHED
        } else {
            0
        }
    }

    /// Folds in the failures of the sending half of a local session, whose
    /// late open errors the receiver never hears about.
    pub fn absorb_sender_failures(&mut self, sent: &Self) {
        self.files_failed += sent.files_failed;
        self.io_error |= sent.io_error;
    }

    /// Ratio of the listed data to the bytes that crossed the wire.
    pub fn speedup(&self) -> f64 {
        let wire = self.bytes_read + self.bytes_written;
        if wire == 0 {
            return 0.0;
        }
        self.total_size as f64 / wire as f64
    }

    /// Writes the closing summary through `logger`.
    pub fn log(&self, logger: &Logger) {
        if let Some(peer) = self.peer {
            info_log!(
                logger,
                Stats,
                1,
                "sender: read {} bytes, wrote {} bytes, total size {}",
                peer.total_read,
                peer.total_written,
                peer.total_size
            );
        }
        info_log!(
            logger,
            Stats,
            1,
            "sent {} bytes  received {} bytes",
            self.bytes_written,
            self.bytes_read
        );
        info_log!(
            logger,
            Stats,
            1,
            "total size is {}  speedup is {:.2}",
            self.total_size,
            self.speedup()
        );
        info_log!(
            logger,
            Stats,
            2,
            "files: {} listed, {} transferred, {} up to date, {} failed; literal data {} bytes, matched data {} bytes",
            self.files_listed,
            self.files_transferred,
            self.files_skipped,
            self.files_failed,
            self.literal_bytes,
            self.matched_bytes
        );
    }
}
