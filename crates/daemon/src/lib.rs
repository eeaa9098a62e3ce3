#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `daemon` puts the transfer roles on the network. It serves modules
//! described by an `rsyncd.conf` file over TCP and speaks the matching
//! client side, so the command line can pull from and push to any protocol
//! 27 daemon.
//!
//! # Design
//!
//! - [`RsyncdConfig`] parses the global section and the `[module]`
//!   sections. Each [`ModuleConfig`] carries its root, listing and
//!   read-only flags, exclude patterns and an [`AccessList`] of host rules.
//! - [`Daemon`] binds the listener and serves every accepted connection on
//!   its own thread through [`serve_connection`].
//! - [`ServerInvocation`] decodes the `--server` argument vector a client
//!   sends after `@RSYNCD: OK`, or that a remote shell passes on the
//!   command line of [`serve_stdio`].
//! - [`DaemonClient`] performs the client half of the handshake and runs
//!   the receiver for a pull or the sender for a push.
//!
//! Errors surface as [`DaemonError`], which carries the exit status the
//! process should end with.
//!
//! # Examples
//!
//! ```no_run
//! use logging::{Logger, Role};
//! use daemon::{Daemon, ModuleConfig, RsyncdConfig};
//!
//! # fn demo() -> Result<(), daemon::DaemonError> {
//! let config = RsyncdConfig::with_modules(vec![
//!     ModuleConfig::new("pub", "/srv/pub").with_comment("public files"),
//! ]);
//! let daemon = Daemon::new(config, Logger::quiet(Role::Daemon))?;
//! daemon.run(Some("127.0.0.1"), Some(8873))
//! # }
//! ```

mod acl;
mod client;
mod error;
mod invocation;
mod listener;
mod rsyncd_config;
mod session;

pub use acl::{AccessList, AclAction, AclRule, HostPattern};
pub use client::{DaemonAddress, DaemonClient};
pub use error::{
    DaemonError, EXIT_PARTIAL, EXIT_PROTOCOL, EXIT_SOCKET_IO, EXIT_STARTUP, EXIT_STREAM,
    EXIT_SYNTAX, EXIT_VANISHED,
};
pub use invocation::{InvocationError, ServerInvocation};
pub use listener::Daemon;
pub use rsyncd_config::{ConfigError, DEFAULT_PORT, GlobalConfig, ModuleConfig, RsyncdConfig};
pub use session::{SessionOutcome, serve_connection, serve_stdio};
