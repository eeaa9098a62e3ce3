//! Error categorization for transfer sessions.
//!
//! Failures fall into two groups: those that end the connection (framing and
//! protocol violations, disk full, errors reported by the peer) and those
//! confined to one file (a vanished source, a permission problem, a failed
//! whole-file verification). The second group is logged and counted and the
//! session moves on to the next file.

use std::io;
use std::path::{Path, PathBuf};

use filters::FilterError;
use flist::FileListError;
use protocol::RemoteError;
use thiserror::Error;

/// Exit code for protocol incompatibilities and usage errors rejected before
/// any transfer starts.
pub const EXIT_UNSUPPORTED: i32 = 4;
/// Exit code for errors selecting input or output files.
pub const EXIT_FILE_SELECT: i32 = 3;
/// Exit code for local file I/O failures.
pub const EXIT_FILE_IO: i32 = 11;
/// Exit code for errors in the protocol data stream.
pub const EXIT_STREAM: i32 = 12;
/// Exit code when the session was interrupted.
pub const EXIT_SIGNAL: i32 = 20;
/// Exit code when some files could not be transferred.
pub const EXIT_PARTIAL: i32 = 23;
/// Exit code when some source files vanished before they were sent.
pub const EXIT_VANISHED: i32 = 24;

/// Whether an error ends the session or only the current file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorSeverity {
    /// Skip the file and continue.
    Recoverable,
    /// Abort the session.
    Fatal,
}

/// Errors produced by the sender and receiver roles.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The connection failed or the peer violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(#[source] io::Error),

    /// A reconstructed file did not match the sender's whole-file checksum.
    #[error("file corruption in {}: checksum mismatch", path.display())]
    Corruption {
        /// Destination the file was meant for.
        path: PathBuf,
    },

    /// A local filesystem operation failed.
    #[error("{operation} {} failed: {source}", path.display())]
    Io {
        /// What was being attempted, such as "open" or "rename".
        operation: &'static str,
        /// Path the operation was applied to.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The peer reported an error on the multiplexed error channel.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The other half of the session failed first.
    #[error("transfer cancelled")]
    Cancelled,

    /// A requested feature is not implemented.
    #[error("{0} is not supported")]
    Unsupported(String),

    /// The local file list could not be built.
    #[error(transparent)]
    FileList(#[from] FileListError),

    /// A filter rule was rejected.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Several entries were sent to a destination that is not a directory.
    #[error("destination {} must be a directory when copying more than one file", path.display())]
    NotADirectory {
        /// The offending destination.
        path: PathBuf,
    },
}

impl TransferError {
    /// Wraps a local filesystem error.
    pub fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    /// How far this error reaches.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Corruption { .. } => ErrorSeverity::Recoverable,
            Self::Io { source, .. } => categorize_io_error(source),
            _ => ErrorSeverity::Fatal,
        }
    }

    /// Returns `true` when the session cannot continue.
    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Process exit code following rsync's numbering.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Protocol(_) | Self::Remote(_) => EXIT_STREAM,
            Self::Corruption { .. } => EXIT_PARTIAL,
            Self::Io { .. } => EXIT_FILE_IO,
            Self::Cancelled => EXIT_SIGNAL,
            Self::Unsupported(_) => EXIT_UNSUPPORTED,
            Self::FileList(_) | Self::Filter(_) | Self::NotADirectory { .. } => EXIT_FILE_SELECT,
        }
    }
}

impl From<io::Error> for TransferError {
    /// Connection-level I/O errors. A [`RemoteError`] carried inside is
    /// unwrapped.
    fn from(error: io::Error) -> Self {
        match RemoteError::from_io(&error) {
            Some(remote) => Self::Remote(remote.clone()),
            None => Self::Protocol(error),
        }
    }
}

/// Decides whether a local I/O error ends the session.
///
/// Errors tied to a single path (missing, not permitted, wrong file type) only
/// cost that file. Anything that will affect every later file as well, such
/// as a full or read-only filesystem, is fatal.
pub fn categorize_io_error(error: &io::Error) -> ErrorSeverity {
    use io::ErrorKind::*;

    match error.kind() {
        NotFound | PermissionDenied | AlreadyExists | IsADirectory | NotADirectory
        | DirectoryNotEmpty | InvalidFilename | UnexpectedEof | Interrupted | WouldBlock => {
            ErrorSeverity::Recoverable
        }
        _ => ErrorSeverity::Fatal,
    }
}
