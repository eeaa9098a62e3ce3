//! Daemon error reporting.
//!
//! [`DaemonError`] pairs a rendered message with the exit status the front
//! end should terminate with. The numbering follows rsync's `errcode.h` so
//! that scripts written against the reference tools keep working.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use transfer::TransferError;

use crate::rsyncd_config::ConfigError;

/// Syntax or usage error.
pub const EXIT_SYNTAX: i32 = 1;
/// Protocol incompatibility.
pub const EXIT_PROTOCOL: i32 = 2;
/// Error starting the client-server protocol.
pub const EXIT_STARTUP: i32 = 5;
/// Error in socket I/O.
pub const EXIT_SOCKET_IO: i32 = 10;
/// Error in the rsync protocol data stream.
pub const EXIT_STREAM: i32 = 12;
/// Partial transfer due to error.
pub const EXIT_PARTIAL: i32 = 23;
/// Partial transfer due to vanished source files.
pub const EXIT_VANISHED: i32 = 24;

/// Error returned when daemon orchestration fails.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DaemonError {
    exit_code: i32,
    message: String,
}

impl DaemonError {
    /// Creates an error with an explicit exit status.
    pub fn new(exit_code: i32, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// A socket-level failure while talking to `peer`.
    pub(crate) fn socket(peer: Option<SocketAddr>, action: &str, error: &io::Error) -> Self {
        let message = match peer {
            Some(peer) => format!("failed to {action} ({peer}): {error}"),
            None => format!("failed to {action}: {error}"),
        };
        Self::new(EXIT_SOCKET_IO, message)
    }

    /// Exit status for the process.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Rendered diagnostic.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ConfigError> for DaemonError {
    fn from(error: ConfigError) -> Self {
        Self::new(EXIT_SYNTAX, error.to_string())
    }
}

impl From<TransferError> for DaemonError {
    fn from(error: TransferError) -> Self {
        Self::new(error.exit_code(), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn transfer_errors_keep_their_exit_code() {
        let error = DaemonError::from(TransferError::Corruption {
            path: PathBuf::from("f"),
        });
        assert_eq!(error.exit_code(), EXIT_PARTIAL);

        let error = DaemonError::from(TransferError::Protocol(io::Error::other("bad")));
        assert_eq!(error.exit_code(), EXIT_STREAM);
    }

    #[test]
    fn socket_errors_name_the_peer() {
        let peer: SocketAddr = "127.0.0.1:873".parse().expect("addr");
        let error = DaemonError::socket(
            Some(peer),
            "accept connection",
            &io::Error::from(io::ErrorKind::ConnectionReset),
        );
        assert_eq!(error.exit_code(), EXIT_SOCKET_IO);
        assert!(error.to_string().contains("127.0.0.1:873"));
    }
}
