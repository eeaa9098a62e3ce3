#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `cli` is the command-line front end of the `rsync27` binary. It parses
//! the supported subset of rsync options with [`clap`](https://docs.rs/clap/)
//! and dispatches to one of four modes:
//!
//! - a local copy, which runs a sender and a receiver in one process joined by
//!   a socket pair;
//! - a daemon client session (`host::module` or `rsync://` operands) that
//!   pulls, pushes or lists modules;
//! - `--daemon`, which serves modules from an `rsyncd.conf` file;
//! - `--server`, which speaks the protocol over standard input and output for
//!   a remote-shell peer.
//!
//! # Design
//!
//! [`run`] accepts an argument iterator together with handles for standard
//! output and error and returns the process exit status. Argument errors exit
//! with `1`. Options that are recognised but not implemented (`-z`, `-c`) exit
//! with `4`. Transfers report the status computed from their statistics, so a
//! partial transfer exits with `23` and a vanished source with `24`.
//!
//! # Examples
//!
//! ```
//! let mut stdout = Vec::new();
//! let mut stderr = Vec::new();
//! let status = cli::run(["rsync27", "--help"], &mut stdout, &mut stderr);
//!
//! assert_eq!(status, 0);
//! assert!(String::from_utf8_lossy(&stdout).contains("--recursive"));
//! ```

use std::ffi::OsString;
use std::io::Write;

use daemon::{InvocationError, ServerInvocation};
use logging::{Logger, Role, VerbosityConfig, init_tracing};
use transfer::EXIT_UNSUPPORTED;

mod arguments;
mod execution;
mod operands;

use arguments::{ParsedArgs, parse_args, render_help};
use operands::Mode;

/// Runs the command line and returns the exit status.
///
/// In `--server` mode the protocol stream uses the process's own standard
/// input and output; `stdout` is left untouched.
pub fn run<I, S, Out, Err>(arguments: I, stdout: &mut Out, stderr: &mut Err) -> i32
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
    Out: Write,
    Err: Write,
{
    let arguments: Vec<OsString> = arguments.into_iter().map(Into::into).collect();
    if arguments.get(1).is_some_and(|arg| arg == "--server") {
        return serve(&arguments[1..], stderr);
    }

    match parse_args(arguments) {
        Ok(parsed) => execute(parsed, stdout, stderr),
        Err(error) => {
            let _ = write!(stderr, "{error}");
            1
        }
    }
}

fn serve<Err: Write>(arguments: &[OsString], stderr: &mut Err) -> i32 {
    let invocation = match ServerInvocation::parse(arguments.iter().map(|arg| arg.to_string_lossy()))
    {
        Ok(invocation) => invocation,
        Err(error) => {
            let _ = writeln!(stderr, "rsync27: {error}");
            return match error {
                InvocationError::Unsupported(_) => EXIT_UNSUPPORTED,
                _ => 1,
            };
        }
    };
    let logger = logger_for(VerbosityConfig::from_verbose_level(invocation.verbosity));
    match execution::run_server(&invocation, &logger) {
        Ok(stats) => stats.exit_code(),
        Err(error) => {
            let _ = writeln!(stderr, "rsync error: {error} (code {})", error.exit_code());
            error.exit_code()
        }
    }
}

fn execute<Out: Write, Err: Write>(parsed: ParsedArgs, stdout: &mut Out, stderr: &mut Err) -> i32 {
    if parsed.show_help {
        return match stdout.write_all(render_help().as_bytes()) {
            Ok(()) => 0,
            Err(_) => 1,
        };
    }
    if let Some(option) = parsed.unsupported_option() {
        let _ = writeln!(stderr, "rsync27: {option} is not supported");
        return EXIT_UNSUPPORTED;
    }

    let config = match parsed.verbosity_config() {
        Ok(config) => config,
        Err(message) => {
            let _ = writeln!(stderr, "rsync27: {message}");
            return 1;
        }
    };
    let logger = logger_for(config);
    if parsed.daemon {
        return match execution::run_daemon(
            parsed.config.as_deref(),
            parsed.address.as_deref(),
            parsed.port,
            &logger.with_role(Role::Daemon),
        ) {
            Ok(()) => 0,
            Err(error) => {
                let _ = writeln!(stderr, "rsync error: {error} (code {})", error.exit_code());
                error.exit_code()
            }
        };
    }

    let mode = match Mode::classify(&parsed.operands, parsed.port) {
        Ok(mode) => mode,
        Err(error) => {
            let _ = writeln!(stderr, "rsync27: {}", error.0);
            let _ = writeln!(stderr, "Try 'rsync27 --help' for more information.");
            return 1;
        }
    };

    let options = parsed.transfer_options();
    match execution::run_client(mode, options, parsed.verbosity, &logger, stdout) {
        Ok(stats) => {
            stats.log(&logger);
            stats.exit_code()
        }
        Err(error) => {
            let _ = writeln!(stderr, "rsync error: {error} (code {})", error.exit_code());
            error.exit_code()
        }
    }
}

/// Builds the client logger and installs the process subscriber on first use.
fn logger_for(config: VerbosityConfig) -> Logger {
    let _ = init_tracing(&config);
    Logger::new(config, Role::Client)
}
