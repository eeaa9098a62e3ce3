//! Runs the mode selected on the command line.

use std::io::{self, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use daemon::{
    Daemon, DaemonClient, DaemonError, EXIT_SYNTAX, RsyncdConfig, ServerInvocation, serve_stdio,
};
use logging::{Logger, Role, debug_log};
use transfer::{
    CancelToken, Connection, Receiver, Sender, TransferError, TransferOptions, TransferStats,
};

use crate::operands::Mode;

/// Configuration read by `--daemon` when `--config` is absent.
pub(crate) const DEFAULT_CONFIG_PATH: &str = "/etc/rsyncd.conf";

/// Client modes: local copy, pull, push or module listing.
pub(crate) fn run_client<Out: io::Write>(
    mode: Mode,
    options: TransferOptions,
    verbosity: u8,
    logger: &Logger,
    stdout: &mut Out,
) -> Result<TransferStats, DaemonError> {
    match mode {
        Mode::Local { sources, dest } => Ok(local_copy(sources, &dest, &options, logger)?),
        Mode::Pull { remote, dest } => {
            DaemonClient::new(options, verbosity, logger.clone()).pull(&remote, &dest)
        }
        Mode::Push { sources, remote } => {
            DaemonClient::new(options, verbosity, logger.clone()).push(&sources, &remote)
        }
        Mode::ListModules(remote) => {
            let lines = DaemonClient::new(options, verbosity, logger.clone()).list_modules(&remote)?;
            for line in lines {
                writeln!(stdout, "{line}").map_err(|error| {
                    DaemonError::new(EXIT_SYNTAX, format!("failed to write module list: {error}"))
                })?;
            }
            Ok(TransferStats::default())
        }
    }
}

/// Copies between two local paths by running a client sender and a server
/// receiver on either end of a socket pair.
pub(crate) fn local_copy(
    sources: Vec<PathBuf>,
    dest: &Path,
    options: &TransferOptions,
    logger: &Logger,
) -> Result<TransferStats, TransferError> {
    let (near, far) = UnixStream::pair()?;
    let seed = checksum_seed();

    let sender_options = TransferOptions {
        server: false,
        seed,
        ..options.clone()
    };
    let sender_logger = logger.with_role(Role::Sender);
    let sender_stream = near.try_clone()?;
    let sending = thread::spawn(move || -> Result<TransferStats, TransferError> {
        let mut conn =
            Connection::new(sender_stream, near).multiplex_input(sender_logger.clone())?;
        Sender::new(sender_options, sender_logger).run(&mut conn, &sources)
    });

    let cancel = CancelToken::new();
    let hook = far.try_clone()?;
    cancel.on_cancel(move || {
        let _ = hook.shutdown(Shutdown::Both);
    });
    let receiver_options = TransferOptions {
        server: true,
        seed,
        ..options.clone()
    };
    let received = Connection::new(far.try_clone()?, far)
        .multiplex_output()
        .map_err(TransferError::from)
        .and_then(|mut conn| {
            Receiver::new(receiver_options, logger.clone())
                .with_cancel(cancel)
                .run(&mut conn, dest)
        });

    let sent = sending.join().unwrap_or_else(|_| {
        Err(TransferError::Protocol(io::Error::other("sender thread panicked")))
    });
    match (received, sent) {
        (Ok(mut received), Ok(sent)) => {
            debug_log!(logger, Io, 1, "sender wrote {} bytes", sent.bytes_written);
            received.absorb_sender_failures(&sent);
            Ok(received)
        }
        (_, Err(error)) | (Err(error), Ok(_)) => Err(error),
    }
}

/// `--daemon`: load the configuration and serve until killed.
pub(crate) fn run_daemon(
    config: Option<&Path>,
    address: Option<&str>,
    port: Option<u16>,
    logger: &Logger,
) -> Result<(), DaemonError> {
    let path = config.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    let config = RsyncdConfig::from_file(path)?;
    Daemon::new(config, logger.clone())?.run(address, port)
}

/// `--server`: serve one session over standard input and output.
pub(crate) fn run_server(invocation: &ServerInvocation, logger: &Logger) -> Result<TransferStats, DaemonError> {
    let stdin = io::stdin().lock();
    serve_stdio(stdin, io::stdout(), invocation, logger)
}

fn checksum_seed() -> i32 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    now as i32
}
