use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A metadata operation that failed on a specific path.
#[derive(Debug, Error)]
#[error("failed to {context} for {}: {source}", path.display())]
pub struct MetadataError {
    context: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl MetadataError {
    /// Wraps `source` with the operation and path it concerns.
    pub fn new(context: &'static str, path: &Path, source: io::Error) -> Self {
        Self {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The operation that failed.
    pub const fn context(&self) -> &'static str {
        self.context
    }

    /// The path the operation was applied to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying I/O error.
    pub const fn source_error(&self) -> &io::Error {
        &self.source
    }
}
