//! Client side of a daemon session.
//!
//! [`DaemonClient`] connects to an `rsync://` or `host::module` operand,
//! performs the `@RSYNCD:` handshake and then acts as the receiver (pull)
//! or the sender (push) over the binary protocol.

use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::path::Path;

use logging::{Logger, Role, debug_log, info_log};
use protocol::legacy::{LegacyDaemonMessage, format_greeting, negotiate, read_line, write_line};
use protocol::varint::read_int;
use transfer::{CancelToken, Connection, Receiver, Sender, TransferOptions, TransferStats};

use crate::error::{DaemonError, EXIT_PROTOCOL, EXIT_SOCKET_IO, EXIT_STARTUP, EXIT_SYNTAX};
use crate::invocation::ServerInvocation;

/// A remote operand naming a daemon, a module and a path inside it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DaemonAddress {
    /// Host name or address, without brackets.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Module name; empty when only the host was given.
    pub module: String,
    /// Path below the module, possibly empty.
    pub path: String,
}

impl DaemonAddress {
    /// Recognises `rsync://[user@]host[:port]/module/path` and
    /// `[user@]host::module/path`. Returns `None` for anything else, such as
    /// a local path. `default_port` applies when the operand names none.
    pub fn parse(operand: &str, default_port: u16) -> Option<Self> {
        if let Some(rest) = strip_prefix_ignore_ascii_case(operand, "rsync://") {
            let (authority, location) = rest.split_once('/').unwrap_or((rest, ""));
            let (host, port) = split_host_port(strip_username(authority), default_port)?;
            return Some(Self::with_location(host, port, location));
        }

        let (authority, location) = split_double_colon(operand)?;
        let host = strip_username(authority);
        let host = host
            .strip_prefix('[')
            .and_then(|inner| inner.strip_suffix(']'))
            .unwrap_or(host);
        Some(Self::with_location(host.to_owned(), default_port, location))
    }

    fn with_location(host: String, port: u16, location: &str) -> Self {
        let (module, path) = location.split_once('/').unwrap_or((location, ""));
        Self {
            host: if host.is_empty() { "localhost".to_owned() } else { host },
            port,
            module: module.to_owned(),
            path: path.to_owned(),
        }
    }

    /// The operand as the server sees it: `module` or `module/path`.
    pub fn operand(&self) -> String {
        if self.path.is_empty() {
            self.module.clone()
        } else {
            format!("{}/{}", self.module, self.path)
        }
    }

    /// Returns `true` when no module was named.
    pub fn is_listing(&self) -> bool {
        self.module.is_empty()
    }
}

fn strip_prefix_ignore_ascii_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

fn strip_username(authority: &str) -> &str {
    authority.rsplit_once('@').map_or(authority, |(_, host)| host)
}

fn split_host_port(authority: &str, default_port: u16) -> Option<(String, u16)> {
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = match tail.strip_prefix(':') {
            Some(port) => port.parse().ok()?,
            None if tail.is_empty() => default_port,
            None => return None,
        };
        return Some((host.to_owned(), port));
    }
    match authority.split_once(':') {
        Some((host, port)) => Some((host.to_owned(), port.parse().ok()?)),
        None => Some((authority.to_owned(), default_port)),
    }
}

/// Splits `host::rest` at the first `::` outside brackets.
fn split_double_colon(operand: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let bytes = operand.as_bytes();
    for (index, byte) in bytes.iter().enumerate() {
        match byte {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(index + 1) == Some(&b':') => {
                return Some((&operand[..index], &operand[index + 2..]));
            }
            b'/' if depth == 0 => return None,
            _ => {}
        }
    }
    None
}

/// Connects to daemons on behalf of the command line.
#[derive(Clone, Debug)]
pub struct DaemonClient {
    options: TransferOptions,
    verbosity: u8,
    logger: Logger,
}

impl DaemonClient {
    /// A client that transfers with `options`. `verbosity` is forwarded to
    /// the server as `-v` flags.
    pub fn new(options: TransferOptions, verbosity: u8, logger: Logger) -> Self {
        Self {
            options,
            verbosity,
            logger: logger.with_role(Role::Client),
        }
    }

    /// Asks the daemon for its module list. Returns every text line it
    /// sent, message of the day included.
    pub fn list_modules(&self, address: &DaemonAddress) -> Result<Vec<String>, DaemonError> {
        let stream = self.connect(address)?;
        let mut lines = Vec::new();
        let accepted = self.request_module(&stream, address, "", &mut lines)?;
        if accepted {
            return Err(DaemonError::new(
                EXIT_PROTOCOL,
                "daemon accepted an empty module request",
            ));
        }
        Ok(lines)
    }

    /// Copies `address` from the daemon into `dest`.
    pub fn pull(&self, address: &DaemonAddress, dest: &Path) -> Result<TransferStats, DaemonError> {
        let stream = self.open_session(address, true)?;
        let peer = stream.peer_addr().ok();
        let reader = stream
            .try_clone()
            .map_err(|error| DaemonError::socket(peer, "clone stream to", &error))?;
        let hook = stream
            .try_clone()
            .map_err(|error| DaemonError::socket(peer, "clone stream to", &error))?;
        let cancel = CancelToken::new();
        cancel.on_cancel(move || {
            let _ = hook.shutdown(Shutdown::Both);
        });

        let (mut conn, options) = self.start_binary_phase(Connection::new(reader, stream))?;
        let stats = Receiver::new(options, self.logger.clone())
            .with_cancel(cancel)
            .run(&mut conn, dest)?;
        Ok(stats)
    }

    /// Copies the local `sources` to `address` on the daemon.
    pub fn push<P: AsRef<Path>>(
        &self,
        sources: &[P],
        address: &DaemonAddress,
    ) -> Result<TransferStats, DaemonError> {
        let stream = self.open_session(address, false)?;
        let peer = stream.peer_addr().ok();
        let reader = stream
            .try_clone()
            .map_err(|error| DaemonError::socket(peer, "clone stream to", &error))?;

        let (mut conn, options) = self.start_binary_phase(Connection::new(reader, stream))?;
        let stats = Sender::new(options, self.logger.clone()).run(&mut conn, sources)?;
        Ok(stats)
    }

    fn connect(&self, address: &DaemonAddress) -> Result<TcpStream, DaemonError> {
        debug_log!(self.logger, Connect, 1, "connecting to {}:{}", address.host, address.port);
        TcpStream::connect((address.host.as_str(), address.port)).map_err(|error| {
            DaemonError::new(
                EXIT_SOCKET_IO,
                format!("failed to connect to {}:{}: {error}", address.host, address.port),
            )
        })
    }

    /// Handshake through `@RSYNCD: OK` and the argument vector. `sender`
    /// says whether the server sends.
    fn open_session(&self, address: &DaemonAddress, sender: bool) -> Result<TcpStream, DaemonError> {
        if address.is_listing() {
            return Err(DaemonError::new(EXIT_SYNTAX, "no module named in daemon operand"));
        }
        let stream = self.connect(address)?;
        let mut motd = Vec::new();
        if !self.request_module(&stream, address, &address.module, &mut motd)? {
            return Err(DaemonError::new(
                EXIT_STARTUP,
                format!("daemon closed the session for module '{}'", address.module),
            ));
        }
        for line in &motd {
            info_log!(self.logger, Misc, 1, "{line}");
        }

        let invocation = ServerInvocation {
            sender,
            verbosity: self.verbosity,
            options: self.options.clone(),
            paths: vec![address.operand()],
        };
        let peer = stream.peer_addr().ok();
        let mut line_io = &stream;
        for arg in invocation.to_args() {
            write_line(&mut line_io, &arg)
                .map_err(|error| DaemonError::socket(peer, "send arguments to", &error))?;
        }
        write_line(&mut line_io, "")
            .map_err(|error| DaemonError::socket(peer, "send arguments to", &error))?;
        Ok(stream)
    }

    /// Exchanges greetings and names `module`. Text lines are collected
    /// into `lines`. Returns `true` on `@RSYNCD: OK` and `false` on
    /// `@RSYNCD: EXIT`.
    fn request_module(
        &self,
        stream: &TcpStream,
        address: &DaemonAddress,
        module: &str,
        lines: &mut Vec<String>,
    ) -> Result<bool, DaemonError> {
        let peer = stream.peer_addr().ok();
        let socket_error = |action: &str, error: io::Error| DaemonError::socket(peer, action, &error);
        let mut line_io = stream;

        line_io
            .write_all(format_greeting().as_bytes())
            .and_then(|()| line_io.flush())
            .map_err(|error| socket_error("send greeting to", error))?;
        let greeting = read_line(&mut line_io).map_err(|error| socket_error("read greeting from", error))?;
        let version = match LegacyDaemonMessage::parse(&greeting) {
            Ok(LegacyDaemonMessage::Version { major, .. }) => negotiate(major).ok(),
            _ => None,
        };
        let Some(version) = version else {
            return Err(DaemonError::new(
                EXIT_PROTOCOL,
                format!("{}:{}: unexpected greeting {greeting:?}", address.host, address.port),
            ));
        };
        debug_log!(self.logger, Proto, 1, "daemon speaks protocol {version}");

        write_line(&mut line_io, module).map_err(|error| socket_error("send module to", error))?;
        loop {
            let line = read_line(&mut line_io).map_err(|error| socket_error("read reply from", error))?;
            match LegacyDaemonMessage::parse(&line) {
                Ok(LegacyDaemonMessage::Ok) => return Ok(true),
                Ok(LegacyDaemonMessage::Exit) => return Ok(false),
                Ok(LegacyDaemonMessage::Error(message)) => {
                    return Err(DaemonError::new(EXIT_STARTUP, format!("@ERROR: {message}")));
                }
                Ok(LegacyDaemonMessage::Text(text)) => lines.push(text),
                Ok(LegacyDaemonMessage::Version { .. }) | Err(_) => lines.push(line),
            }
        }
    }

    /// Reads the seed, demultiplexes the input and prepares the options of
    /// the client role.
    fn start_binary_phase(
        &self,
        mut conn: Connection<TcpStream, TcpStream>,
    ) -> Result<(Connection<TcpStream, TcpStream>, TransferOptions), DaemonError> {
        let seed = read_int(conn.reader())
            .map_err(|error| DaemonError::socket(None, "read checksum seed", &error))?;
        let conn = conn
            .multiplex_input(self.logger.clone())
            .map_err(|error| DaemonError::socket(None, "start transfer", &error))?;
        let mut options = self.options.clone();
        options.server = false;
        options.seed = seed;
        Ok((conn, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rsync_urls() {
        let address = DaemonAddress::parse("rsync://backup.example:8730/data/sub/dir/", 873)
            .expect("daemon operand");
        assert_eq!(address.host, "backup.example");
        assert_eq!(address.port, 8730);
        assert_eq!(address.module, "data");
        assert_eq!(address.path, "sub/dir/");
        assert_eq!(address.operand(), "data/sub/dir/");
    }

    #[test]
    fn parses_double_colon_operands() {
        let address = DaemonAddress::parse("user@host::data", 873).expect("daemon operand");
        assert_eq!(address.host, "host");
        assert_eq!(address.port, 873);
        assert_eq!(address.module, "data");
        assert_eq!(address.operand(), "data");

        let listing = DaemonAddress::parse("host::", 1873).expect("daemon operand");
        assert!(listing.is_listing());
        assert_eq!(listing.port, 1873);
    }

    #[test]
    fn parses_bracketed_ipv6_hosts() {
        let url = DaemonAddress::parse("RSYNC://[::1]:8730/", 873).expect("url");
        assert_eq!(url.host, "::1");
        assert_eq!(url.port, 8730);
        assert!(url.is_listing());

        let legacy = DaemonAddress::parse("[fe80::2]::mod/file", 873).expect("legacy");
        assert_eq!(legacy.host, "fe80::2");
        assert_eq!(legacy.operand(), "mod/file");
    }

    #[test]
    fn local_paths_are_not_daemon_operands() {
        assert_eq!(DaemonAddress::parse("/tmp/src", 873), None);
        assert_eq!(DaemonAddress::parse("dir/with::colons", 873), None);
        assert_eq!(DaemonAddress::parse("rsync://host:notaport/m", 873), None);
    }
}
