//! Server side of a session.
//!
//! A daemon connection starts with the line-oriented `@RSYNCD:` exchange:
//! greeting, optional message of the day, module selection, access check
//! and the client's argument vector. After `@RSYNCD: OK` both ends switch
//! to the binary protocol. The server sends the checksum seed, multiplexes
//! its output and then runs either the sending or the receiving role.
//!
//! A server started over a remote shell (`--server` on the command line)
//! skips the line phase and exchanges protocol versions as binary integers.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use logging::{Logger, Role, debug_log, info_log, warn_log};
use protocol::PROTOCOL_VERSION;
use protocol::legacy::{LegacyDaemonMessage, format_greeting, negotiate, read_line, write_line};
use protocol::varint::{read_int, write_int};
use transfer::{
    CancelToken, Connection, Receiver, Sender, TransferError, TransferOptions, TransferStats,
};

use crate::error::{DaemonError, EXIT_PROTOCOL, EXIT_STARTUP, EXIT_SYNTAX};
use crate::invocation::ServerInvocation;
use crate::rsyncd_config::{ModuleConfig, RsyncdConfig};

/// What a finished daemon connection did.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The client asked for the module list.
    Listed,
    /// A transfer ran against `module`.
    Transferred {
        /// Module name.
        module: String,
        /// Counters of the server's role.
        stats: TransferStats,
    },
}

/// Serves one accepted daemon connection to completion.
pub fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: &RsyncdConfig,
    motd: &[String],
    logger: &Logger,
) -> Result<SessionOutcome, DaemonError> {
    let logger = logger.with_role(Role::Daemon);
    let socket_error = |action: &str, error: io::Error| DaemonError::socket(Some(peer), action, &error);

    let mut line_io = &stream;
    line_io
        .write_all(format_greeting().as_bytes())
        .and_then(|()| line_io.flush())
        .map_err(|error| socket_error("send greeting to", error))?;
    let hello = read_line(&mut line_io).map_err(|error| socket_error("read greeting from", error))?;
    let protocol = match LegacyDaemonMessage::parse(&hello) {
        Ok(LegacyDaemonMessage::Version { major, .. }) => negotiate(major).ok(),
        _ => None,
    };
    let Some(protocol) = protocol else {
        let _ = write_line(&mut line_io, "@ERROR: protocol version mismatch");
        return Err(DaemonError::new(
            EXIT_PROTOCOL,
            format!("{peer}: protocol version mismatch in greeting {hello:?}"),
        ));
    };
    debug_log!(logger, Proto, 1, "{peer}: negotiated protocol {protocol}");

    for line in motd {
        write_line(&mut line_io, line).map_err(|error| socket_error("send motd to", error))?;
    }

    let request = read_line(&mut line_io).map_err(|error| socket_error("read module from", error))?;
    let request = request.trim();
    if request.is_empty() || request == "#list" {
        send_listing(&mut line_io, config).map_err(|error| socket_error("send module list to", error))?;
        info_log!(logger, Misc, 1, "{peer}: module list requested");
        return Ok(SessionOutcome::Listed);
    }

    let Some(module) = config.get_module(request) else {
        let _ = write_line(&mut line_io, &format!("@ERROR: Unknown module '{request}'"));
        return Err(DaemonError::new(
            EXIT_STARTUP,
            format!("{peer}: unknown module '{request}'"),
        ));
    };
    if !module.acl().permits(peer.ip()) {
        let _ = write_line(
            &mut line_io,
            &format!("@ERROR: access denied to module '{}' from {}", module.name(), peer.ip()),
        );
        return Err(DaemonError::new(
            EXIT_STARTUP,
            format!("{peer}: access to module '{}' denied", module.name()),
        ));
    }
    write_line(&mut line_io, "@RSYNCD: OK").map_err(|error| socket_error("accept module for", error))?;

    let mut args = Vec::new();
    loop {
        let arg = read_line(&mut line_io).map_err(|error| socket_error("read arguments from", error))?;
        if arg.is_empty() {
            break;
        }
        args.push(arg);
    }
    debug_log!(logger, Connect, 1, "{peer}: arguments {args:?}");

    let prepared = ServerInvocation::parse(&args)
        .and_then(|invocation| {
            let paths = invocation.module_paths(module.name(), module.path())?;
            Ok((invocation, paths))
        })
        .map_err(|error| error.to_string())
        .and_then(|(invocation, paths)| {
            if !invocation.sender && module.read_only() {
                return Err(format!("module '{}' is read only", module.name()));
            }
            Ok((invocation, paths))
        });

    if let Some(timeout) = module.timeout() {
        stream
            .set_read_timeout(Some(timeout))
            .and_then(|()| stream.set_write_timeout(Some(timeout)))
            .map_err(|error| socket_error("set timeout on", error))?;
    }

    let reader = stream
        .try_clone()
        .map_err(|error| socket_error("clone stream of", error))?;
    let cancel = CancelToken::new();
    let hook = stream
        .try_clone()
        .map_err(|error| socket_error("clone stream of", error))?;
    cancel.on_cancel(move || {
        let _ = hook.shutdown(Shutdown::Both);
    });

    let seed = checksum_seed();
    let mut conn = start_binary_phase(Connection::new(reader, stream), seed)
        .map_err(|error| socket_error("start transfer with", error))?;

    let (invocation, paths) = match prepared {
        Ok(prepared) => prepared,
        Err(message) => {
            warn_log!(logger, "{peer}: {message}");
            refuse(&mut conn, &message);
            return Err(DaemonError::new(EXIT_SYNTAX, format!("{peer}: {message}")));
        }
    };

    let options = module_options(&invocation, module, seed);
    info_log!(
        logger,
        Misc,
        1,
        "{peer}: {} module '{}'",
        if invocation.sender { "sending from" } else { "receiving into" },
        module.name()
    );
    let stats = run_server(&mut conn, &invocation, &paths, options, &logger, cancel)?;
    stats.log(&logger);
    Ok(SessionOutcome::Transferred {
        module: module.name().to_owned(),
        stats,
    })
}

/// Serves a session over an already established byte stream, such as the
/// standard streams of a process started by a remote shell.
///
/// Protocol versions are exchanged as binary integers. Paths in
/// `invocation` are taken relative to the working directory.
pub fn serve_stdio<R, W>(
    reader: R,
    writer: W,
    invocation: &ServerInvocation,
    logger: &Logger,
) -> Result<TransferStats, DaemonError>
where
    R: Read,
    W: Write + Send,
{
    let mut conn = Connection::new(reader, writer);
    let stream_error = |action: &str, error: io::Error| DaemonError::socket(None, action, &error);

    write_int(conn.writer(), PROTOCOL_VERSION)
        .and_then(|()| conn.writer().flush())
        .map_err(|error| stream_error("send protocol version", error))?;
    let peer_version =
        read_int(conn.reader()).map_err(|error| stream_error("read protocol version", error))?;
    let protocol = negotiate(peer_version).map_err(|error| {
        DaemonError::new(EXIT_PROTOCOL, format!("protocol version mismatch: {error}"))
    })?;
    debug_log!(logger, Proto, 1, "negotiated protocol {protocol}");

    let seed = checksum_seed();
    debug_log!(logger, Proto, 2, "checksum seed {seed}");
    let mut conn =
        start_binary_phase(conn, seed).map_err(|error| stream_error("start transfer", error))?;

    let paths: Vec<PathBuf> = invocation.paths.iter().map(PathBuf::from).collect();
    let mut options = invocation.options.clone();
    options.server = true;
    options.seed = seed;
    Ok(run_server(
        &mut conn,
        invocation,
        &paths,
        options,
        logger,
        CancelToken::new(),
    )?)
}

fn send_listing<W: Write>(writer: &mut W, config: &RsyncdConfig) -> io::Result<()> {
    for module in config.modules().iter().filter(|module| module.list()) {
        let line = format!("{:<15}\t{}", module.name(), module.comment().unwrap_or_default());
        write_line(writer, &line)?;
    }
    write_line(writer, "@RSYNCD: EXIT")
}

/// Sends the seed and switches the output to multiplexed framing.
fn start_binary_phase<R: Read, W: Write>(
    mut conn: Connection<R, W>,
    seed: i32,
) -> io::Result<Connection<R, W>> {
    write_int(conn.writer(), seed)?;
    conn.writer().flush()?;
    conn.multiplex_output()
}

/// Reports `message` on the error channel and waits for the client to
/// hang up, so that the message is not lost to a reset connection.
fn refuse<R: Read, W: Write>(conn: &mut Connection<R, W>, message: &str) {
    if let Ok(true) = conn.writer().send_error(message) {
        let _ = conn.writer().flush();
    }
    let _ = io::copy(conn.reader(), &mut io::sink());
}

/// Transfer options for a daemon session: the client's flags combined with
/// the module's settings.
fn module_options(invocation: &ServerInvocation, module: &ModuleConfig, seed: i32) -> TransferOptions {
    let mut options = invocation.options.clone();
    options.server = true;
    options.seed = seed;
    options.numeric_ids |= module.numeric_ids();
    if invocation.sender {
        options.filters.extend(module.exclude_rules());
    }
    options
}

/// Runs the role the client asked for.
fn run_server<R, W>(
    conn: &mut Connection<R, W>,
    invocation: &ServerInvocation,
    paths: &[PathBuf],
    options: TransferOptions,
    logger: &Logger,
    cancel: CancelToken,
) -> Result<TransferStats, TransferError>
where
    R: Read,
    W: Write + Send,
{
    if invocation.sender {
        return Sender::new(options, logger.clone()).run(conn, paths);
    }
    let dest = paths.first().map_or(Path::new("."), PathBuf::as_path);
    Receiver::new(options, logger.clone())
        .with_cancel(cancel)
        .run(conn, dest)
}

/// Seed for the block checksums of one session.
fn checksum_seed() -> i32 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    (now as i32) ^ ((std::process::id() << 6) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AclRule;
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(config: RsyncdConfig, motd: Vec<String>) -> (SocketAddr, thread::JoinHandle<Result<SessionOutcome, DaemonError>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("local addr");
        let handle = thread::spawn(move || {
            let (stream, peer) = listener.accept().expect("accept");
            serve_connection(stream, peer, &config, &motd, &Logger::quiet(Role::Daemon))
        });
        (address, handle)
    }

    fn exchange(address: SocketAddr, module: &str) -> Vec<String> {
        let stream = TcpStream::connect(address).expect("connect");
        let mut io = &stream;
        let mut lines = vec![read_line(&mut io).expect("greeting")];
        write_line(&mut io, "@RSYNCD: 27").expect("hello");
        write_line(&mut io, module).expect("module");
        while let Ok(line) = read_line(&mut io) {
            let done = line.starts_with("@ERROR") || line.starts_with("@RSYNCD: EXIT") || line == "@RSYNCD: OK";
            lines.push(line);
            if done {
                break;
            }
        }
        lines
    }

    #[test]
    fn listing_skips_unlisted_modules() {
        let config = RsyncdConfig::with_modules(vec![
            ModuleConfig::new("public", "/srv/public").with_comment("open data"),
            ModuleConfig::new("hidden", "/srv/hidden").with_list(false),
        ]);
        let (address, handle) = serve_once(config, vec!["welcome".to_owned()]);

        let lines = exchange(address, "");
        assert_eq!(lines[0], "@RSYNCD: 27");
        assert_eq!(lines[1], "welcome");
        assert_eq!(lines[2], format!("{:<15}\topen data", "public"));
        assert_eq!(lines[3], "@RSYNCD: EXIT");
        assert_eq!(lines.len(), 4);
        assert!(matches!(handle.join().expect("join"), Ok(SessionOutcome::Listed)));
    }

    #[test]
    fn unknown_module_is_reported() {
        let config = RsyncdConfig::with_modules(vec![ModuleConfig::new("data", "/srv/data")]);
        let (address, handle) = serve_once(config, Vec::new());

        let lines = exchange(address, "nope");
        assert_eq!(lines.last().map(String::as_str), Some("@ERROR: Unknown module 'nope'"));
        let error = handle.join().expect("join").expect_err("unknown module");
        assert_eq!(error.exit_code(), EXIT_STARTUP);
    }

    #[test]
    fn acl_refuses_unlisted_hosts() {
        let module = ModuleConfig::new("data", "/srv/data")
            .with_acl_rule(AclRule::parse("allow 10.0.0.0/8").expect("rule"));
        let (address, handle) = serve_once(RsyncdConfig::with_modules(vec![module]), Vec::new());

        let lines = exchange(address, "data");
        assert_eq!(
            lines.last().map(String::as_str),
            Some("@ERROR: access denied to module 'data' from 127.0.0.1")
        );
        assert!(handle.join().expect("join").is_err());
    }

    #[test]
    fn old_clients_are_turned_away() {
        let config = RsyncdConfig::with_modules(Vec::new());
        let (address, handle) = serve_once(config, Vec::new());

        let stream = TcpStream::connect(address).expect("connect");
        let mut io = &stream;
        read_line(&mut io).expect("greeting");
        write_line(&mut io, "@RSYNCD: 24").expect("hello");
        assert_eq!(read_line(&mut io).expect("reply"), "@ERROR: protocol version mismatch");
        let error = handle.join().expect("join").expect_err("mismatch");
        assert_eq!(error.exit_code(), EXIT_PROTOCOL);
    }

    #[test]
    fn read_only_modules_refuse_uploads() {
        let config = RsyncdConfig::with_modules(vec![ModuleConfig::new("data", "/srv/data")]);
        let (address, handle) = serve_once(config, Vec::new());

        let stream = TcpStream::connect(address).expect("connect");
        let mut io = &stream;
        read_line(&mut io).expect("greeting");
        write_line(&mut io, "@RSYNCD: 27").expect("hello");
        write_line(&mut io, "data").expect("module");
        assert_eq!(read_line(&mut io).expect("ok"), "@RSYNCD: OK");
        for arg in ["--server", "-r", ".", "data/"] {
            write_line(&mut io, arg).expect("arg");
        }
        write_line(&mut io, "").expect("end of args");

        let mut seed = [0u8; 4];
        io.read_exact(&mut seed).expect("seed");
        let mut header = [0u8; 4];
        io.read_exact(&mut header).expect("frame header");
        let length = (u32::from_le_bytes(header) & 0x00ff_ffff) as usize;
        let mut payload = vec![0u8; length];
        io.read_exact(&mut payload).expect("frame payload");
        assert_eq!(payload, b"module 'data' is read only\n");

        drop(stream);
        let error = handle.join().expect("join").expect_err("read only");
        assert_eq!(error.exit_code(), EXIT_SYNTAX);
    }

    #[test]
    fn module_settings_shape_the_options() {
        let config = RsyncdConfig::parse(
            "[data]\npath = /srv/data\nnumeric ids = yes\nexclude = *.tmp\n",
            Path::new("rsyncd.conf"),
        )
        .expect("parse");
        let module = config.get_module("data").expect("module");
        let invocation =
            ServerInvocation::parse(["--server", "--sender", "-r", ".", "data/"]).expect("parse");

        let options = module_options(&invocation, module, 99);
        assert!(options.server);
        assert!(options.numeric_ids);
        assert_eq!(options.seed, 99);
        assert_eq!(options.filters, module.exclude_rules());
    }
}
