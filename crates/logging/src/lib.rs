#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` carries diagnostics for every other crate in the workspace. A
//! [`Logger`] handle is constructed once by the entry point and passed into
//! each sender, receiver and daemon session; nothing in the workspace reads a
//! process-wide logger.
//!
//! # Design
//!
//! - [`VerbosityConfig`] maps `-v` counts and `--info`/`--debug` tokens onto
//!   per-category levels ([`InfoFlag`], [`DebugFlag`]).
//! - [`Logger`] gates each event against that table and forwards it to
//!   `tracing` under an `rsync::<category>` target, tagged with the emitting
//!   [`Role`].
//! - [`init_tracing`] installs the stderr subscriber used by the binary.
//!
//! # Examples
//!
//! ```
//! use logging::{DebugFlag, Logger, Role, VerbosityConfig};
//!
//! let logger = Logger::capturing(VerbosityConfig::from_verbose_level(2), Role::Receiver);
//! logger.debug(DebugFlag::Deltasum, 1, format_args!("block length {}", 700));
//! assert_eq!(logger.captured().len(), 1);
//! ```

mod config;
mod levels;
mod logger;
mod subscriber;

pub use config::VerbosityConfig;
pub use levels::{DebugFlag, DebugLevels, InfoFlag, InfoLevels};
pub use logger::{DiagnosticEvent, Logger, Role, Severity};
pub use subscriber::{default_directive, init_tracing};
