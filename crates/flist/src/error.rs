use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a file list from being built at all.
///
/// Problems with individual entries are logged and recorded in the list's
/// I/O error flag instead.
#[derive(Debug, Error)]
pub enum FileListError {
    /// An operand has no final component to name it by, such as `..`.
    #[error("cannot derive a file list name from {}", .0.display())]
    InvalidRoot(PathBuf),
}
