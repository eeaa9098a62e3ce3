//! Temporary files the receiver reconstructs into before renaming them over
//! the destination.
//!
//! Names follow rsync's `.<name>.XXXXXX` pattern in the destination's own
//! directory, so the final rename never crosses a filesystem. The file is
//! created with `O_EXCL` and removed again by [`TempFileGuard`] unless the
//! transfer succeeds.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Bytes taken by the `.XXXXXX` suffix.
const SUFFIX_LEN: usize = 7;

/// Alphabet of the random suffix.
const SUFFIX_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const MAX_OPEN_ATTEMPTS: u32 = 100;

/// Longest file name component accepted by common filesystems.
const NAME_MAX: usize = 255;

/// Builds the `.name.XXXXXX` template beside `dest`.
fn temp_template(dest: &Path) -> PathBuf {
    let file_name = dest
        .file_name()
        .map_or_else(|| "rsync".to_owned(), |name| name.to_string_lossy().into_owned());
    let stem = file_name.strip_prefix('.').unwrap_or(&file_name);
    let name = truncate_name(&format!(".{stem}.XXXXXX"), NAME_MAX);
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    dir.join(name)
}

/// Shortens `name` to at most `max_len` bytes, keeping the `.XXXXXX` suffix
/// and never splitting a UTF-8 sequence.
fn truncate_name(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_owned();
    }
    let (prefix, suffix) = name.split_at(name.len() - SUFFIX_LEN);
    let mut end = (max_len - SUFFIX_LEN).min(prefix.len());
    while end > 0 && !prefix.is_char_boundary(end) {
        end -= 1;
    }
    let trimmed = prefix[..end].trim_end_matches('.');
    format!("{trimmed}{suffix}")
}

/// Replaces the trailing `XXXXXX` of `template` with random characters.
fn fill_random_suffix(template: &Path) -> io::Result<PathBuf> {
    let mut random = [0u8; SUFFIX_LEN - 1];
    getrandom::fill(&mut random).map_err(io::Error::other)?;

    let text = template.to_string_lossy();
    let prefix = &text[..text.len() - random.len()];
    let suffix: String = random
        .iter()
        .map(|&byte| char::from(SUFFIX_CHARS[usize::from(byte) % SUFFIX_CHARS.len()]))
        .collect();
    Ok(PathBuf::from(format!("{prefix}{suffix}")))
}

/// Creates a fresh temporary file for `dest` and returns it with its guard.
pub fn open_tmpfile(dest: &Path) -> io::Result<(File, TempFileGuard)> {
    let template = temp_template(dest);
    for _ in 0..MAX_OPEN_ATTEMPTS {
        let path = fill_random_suffix(&template)?;
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, TempFileGuard::new(path))),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {}
            Err(error) => return Err(error),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "no unused temporary name after {MAX_OPEN_ATTEMPTS} attempts: {}",
            template.display()
        ),
    ))
}

/// Removes a temporary file on drop unless [`keep`](Self::keep) was called.
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
    keep_on_drop: bool,
}

impl TempFileGuard {
    /// Guards `path`.
    pub const fn new(path: PathBuf) -> Self {
        Self {
            path,
            keep_on_drop: false,
        }
    }

    /// Leaves the file in place, typically after it was renamed away.
    pub const fn keep(&mut self) {
        self.keep_on_drop = true;
    }

    /// Path of the guarded file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if !self.keep_on_drop {
            let _ = fs::remove_file(&self.path);
        }
    }
}
