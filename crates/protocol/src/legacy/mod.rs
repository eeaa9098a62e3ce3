//! ASCII daemon handshake lines.
//!
//! Before the binary protocol starts, a daemon and its client exchange
//! newline-terminated text: `@RSYNCD: <version>` greetings, the module
//! request, `@RSYNCD: OK` / `@RSYNCD: EXIT` acknowledgements, `@ERROR:`
//! rejections and MOTD or listing lines.

use std::io::{self, Read, Write};

use crate::error::ProtocolError;

/// Protocol version spoken by this implementation.
pub const PROTOCOL_VERSION: i32 = 27;

/// Oldest protocol accepted from a peer.
pub const MIN_PROTOCOL_VERSION: i32 = 27;

/// Prefix shared by every daemon status line.
pub const LEGACY_DAEMON_PREFIX: &str = "@RSYNCD:";

/// Prefix of daemon rejections.
pub const ERROR_PREFIX: &str = "@ERROR:";

/// Longest handshake line accepted.
pub const MAX_LINE_LEN: usize = 4096;

/// A classified handshake line.
#[doc(alias = "@RSYNCD")]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LegacyDaemonMessage {
    /// `@RSYNCD: <major>[.<minor>]`.
    Version {
        /// Major protocol number.
        major: i32,
        /// Fractional part, zero when absent.
        minor: i32,
    },
    /// `@RSYNCD: OK`.
    Ok,
    /// `@RSYNCD: EXIT`.
    Exit,
    /// `@ERROR: <text>`.
    Error(String),
    /// Anything else: MOTD text or a listing line.
    Text(String),
}

impl LegacyDaemonMessage {
    /// Classifies one line with its terminator already removed.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        if let Some(rest) = line.strip_prefix(ERROR_PREFIX) {
            return Ok(Self::Error(rest.trim().to_string()));
        }
        let Some(rest) = line.strip_prefix(LEGACY_DAEMON_PREFIX) else {
            return Ok(Self::Text(line.to_string()));
        };
        match rest.trim() {
            "OK" => Ok(Self::Ok),
            "EXIT" => Ok(Self::Exit),
            version => parse_version(version)
                .map(|(major, minor)| Self::Version { major, minor })
                .ok_or_else(|| ProtocolError::MalformedGreeting(line.to_string())),
        }
    }
}

fn parse_version(text: &str) -> Option<(i32, i32)> {
    // Newer peers append a digest list after the version.
    let token = text.split_ascii_whitespace().next()?;
    let (major, minor) = match token.split_once('.') {
        Some((major, minor)) => (major, minor),
        None => (token, "0"),
    };
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Formats our greeting line, newline included.
pub fn format_greeting() -> String {
    format!("{LEGACY_DAEMON_PREFIX} {PROTOCOL_VERSION}\n")
}

/// Picks the protocol for a session given the peer's advertised major
/// version. The lower of the two wins; anything below
/// [`MIN_PROTOCOL_VERSION`] is rejected.
pub fn negotiate(peer_major: i32) -> Result<i32, ProtocolError> {
    if peer_major < MIN_PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(peer_major));
    }
    Ok(peer_major.min(PROTOCOL_VERSION))
}

/// Writes `line` followed by a newline.
pub fn write_line<W: Write + ?Sized>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Reads one newline-terminated line, stripping the terminator and an
/// optional carriage return.
///
/// The reader is consumed one byte at a time so that nothing past the newline
/// is buffered away from the binary phase that follows.
pub fn read_line<R: Read + ?Sized>(reader: &mut R) -> io::Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte)?;
        if byte[0] == b'\n' {
            break;
        }
        if line.len() == MAX_LINE_LEN {
            return Err(ProtocolError::TooLong {
                what: "handshake line",
                len: line.len() + 1,
                limit: MAX_LINE_LEN,
            }
            .into());
        }
        line.push(byte[0]);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line).map_err(|err| {
        ProtocolError::MalformedGreeting(String::from_utf8_lossy(err.as_bytes()).into_owned())
            .into()
    })
}
