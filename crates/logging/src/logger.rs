//! crates/logging/src/logger.rs
//! Explicit logger handle carried by every transfer and session value.
//!
//! A [`Logger`] owns the verbosity table and the role it reports under. It is
//! cheap to clone; clones share the same configuration and capture buffer.
//! Events that pass the verbosity gate are forwarded to `tracing` under a
//! `rsync::<category>` target so that a subscriber installed by the binary can
//! render them.

use std::fmt;
use std::sync::{Arc, Mutex};

use super::config::VerbosityConfig;
use super::levels::{DebugFlag, InfoFlag};

/// Which side of a session emitted an event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// Sends file data.
    Sender,
    /// Applies incoming deltas.
    Receiver,
    /// Produces block signatures on the receiving side.
    Generator,
    /// Accepts connections and dispatches sessions.
    Daemon,
    /// Initiates a session.
    Client,
}

impl Role {
    /// Short lowercase label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
            Self::Generator => "generator",
            Self::Daemon => "daemon",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a recorded diagnostic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level trace output.
    Debug,
    /// Informational output.
    Info,
    /// Recoverable problem.
    Warning,
    /// Failure.
    Error,
}

/// A diagnostic captured by a [`Logger`] created with [`Logger::capturing`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticEvent {
    /// Severity of the event.
    pub severity: Severity,
    /// `tracing` target the event was forwarded under.
    pub target: &'static str,
    /// Role of the emitting logger.
    pub role: Role,
    /// Rendered message.
    pub message: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Target {
    Copy,
    Flist,
    Misc,
    Name,
    Nonreg,
    Skip,
    Stats,
    Connect,
    Deltasum,
    Filter,
    Genr,
    Io,
    Own,
    Proto,
    Recv,
    Send,
}

impl Target {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "rsync::copy",
            Self::Flist => "rsync::flist",
            Self::Misc => "rsync::misc",
            Self::Name => "rsync::name",
            Self::Nonreg => "rsync::nonreg",
            Self::Skip => "rsync::skip",
            Self::Stats => "rsync::stats",
            Self::Connect => "rsync::connect",
            Self::Deltasum => "rsync::deltasum",
            Self::Filter => "rsync::filter",
            Self::Genr => "rsync::genr",
            Self::Io => "rsync::io",
            Self::Own => "rsync::own",
            Self::Proto => "rsync::proto",
            Self::Recv => "rsync::recv",
            Self::Send => "rsync::send",
        }
    }

    const fn from_info(flag: InfoFlag) -> Self {
        match flag {
            InfoFlag::Copy => Self::Copy,
            InfoFlag::Flist => Self::Flist,
            InfoFlag::Misc => Self::Misc,
            InfoFlag::Name => Self::Name,
            InfoFlag::Nonreg => Self::Nonreg,
            InfoFlag::Skip => Self::Skip,
            InfoFlag::Stats => Self::Stats,
        }
    }

    const fn from_debug(flag: DebugFlag) -> Self {
        match flag {
            DebugFlag::Connect => Self::Connect,
            DebugFlag::Deltasum => Self::Deltasum,
            DebugFlag::Filter => Self::Filter,
            DebugFlag::Flist => Self::Flist,
            DebugFlag::Genr => Self::Genr,
            DebugFlag::Io => Self::Io,
            DebugFlag::Own => Self::Own,
            DebugFlag::Proto => Self::Proto,
            DebugFlag::Recv => Self::Recv,
            DebugFlag::Send => Self::Send,
        }
    }
}

// `tracing` needs the target as a constant at each callsite.
macro_rules! forward {
    ($level:ident, $target:expr, $role:expr, $message:expr) => {
        match $target {
            Target::Copy => tracing::$level!(target: "rsync::copy", role = $role, "{}", $message),
            Target::Flist => tracing::$level!(target: "rsync::flist", role = $role, "{}", $message),
            Target::Misc => tracing::$level!(target: "rsync::misc", role = $role, "{}", $message),
            Target::Name => tracing::$level!(target: "rsync::name", role = $role, "{}", $message),
            Target::Nonreg => tracing::$level!(target: "rsync::nonreg", role = $role, "{}", $message),
            Target::Skip => tracing::$level!(target: "rsync::skip", role = $role, "{}", $message),
            Target::Stats => tracing::$level!(target: "rsync::stats", role = $role, "{}", $message),
            Target::Connect => tracing::$level!(target: "rsync::connect", role = $role, "{}", $message),
            Target::Deltasum => tracing::$level!(target: "rsync::deltasum", role = $role, "{}", $message),
            Target::Filter => tracing::$level!(target: "rsync::filter", role = $role, "{}", $message),
            Target::Genr => tracing::$level!(target: "rsync::genr", role = $role, "{}", $message),
            Target::Io => tracing::$level!(target: "rsync::io", role = $role, "{}", $message),
            Target::Own => tracing::$level!(target: "rsync::own", role = $role, "{}", $message),
            Target::Proto => tracing::$level!(target: "rsync::proto", role = $role, "{}", $message),
            Target::Recv => tracing::$level!(target: "rsync::recv", role = $role, "{}", $message),
            Target::Send => tracing::$level!(target: "rsync::send", role = $role, "{}", $message),
        }
    };
}

/// Logger handle passed explicitly into transfers, sessions and the daemon.
#[derive(Clone, Debug)]
pub struct Logger {
    config: Arc<VerbosityConfig>,
    role: Role,
    capture: Option<Arc<Mutex<Vec<DiagnosticEvent>>>>,
}

impl Logger {
    /// Creates a logger for `role` with the given verbosity.
    pub fn new(config: VerbosityConfig, role: Role) -> Self {
        Self {
            config: Arc::new(config),
            role,
            capture: None,
        }
    }

    /// Creates a logger that also records every emitted event in memory.
    ///
    /// Used by tests to assert on diagnostics without installing a global
    /// subscriber.
    pub fn capturing(config: VerbosityConfig, role: Role) -> Self {
        Self {
            config: Arc::new(config),
            role,
            capture: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// A logger that emits nothing beyond warnings and errors.
    pub fn quiet(role: Role) -> Self {
        Self::new(VerbosityConfig::default(), role)
    }

    /// Returns a clone reporting under a different role. The capture buffer
    /// and configuration are shared.
    pub fn with_role(&self, role: Role) -> Self {
        Self {
            config: Arc::clone(&self.config),
            role,
            capture: self.capture.clone(),
        }
    }

    /// Role this logger reports under.
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Verbosity table in effect.
    pub fn config(&self) -> &VerbosityConfig {
        &self.config
    }

    /// Returns `true` when `flag` is enabled at `level`.
    pub fn info_enabled(&self, flag: InfoFlag, level: u8) -> bool {
        self.config.info_gte(flag, level)
    }

    /// Returns `true` when `flag` is enabled at `level`.
    pub fn debug_enabled(&self, flag: DebugFlag, level: u8) -> bool {
        self.config.debug_gte(flag, level)
    }

    /// Emits an info message when `flag` is enabled at `level`.
    pub fn info(&self, flag: InfoFlag, level: u8, args: fmt::Arguments<'_>) {
        if !self.info_enabled(flag, level) {
            return;
        }
        let target = Target::from_info(flag);
        let message = args.to_string();
        forward!(info, target, self.role.as_str(), message);
        self.record(Severity::Info, target, message);
    }

    /// Emits a debug message when `flag` is enabled at `level`.
    pub fn debug(&self, flag: DebugFlag, level: u8, args: fmt::Arguments<'_>) {
        if !self.debug_enabled(flag, level) {
            return;
        }
        let target = Target::from_debug(flag);
        let message = args.to_string();
        forward!(debug, target, self.role.as_str(), message);
        self.record(Severity::Debug, target, message);
    }

    /// Emits a warning. Warnings are never filtered by verbosity.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        let message = args.to_string();
        forward!(warn, Target::Misc, self.role.as_str(), message);
        self.record(Severity::Warning, Target::Misc, message);
    }

    /// Emits an error. Errors are never filtered by verbosity.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        let message = args.to_string();
        forward!(error, Target::Misc, self.role.as_str(), message);
        self.record(Severity::Error, Target::Misc, message);
    }

    /// Returns a copy of every captured event, oldest first.
    ///
    /// Always empty for loggers not created with [`Logger::capturing`].
    pub fn captured(&self) -> Vec<DiagnosticEvent> {
        self.capture
            .as_ref()
            .and_then(|events| events.lock().ok().map(|events| events.clone()))
            .unwrap_or_default()
    }

    fn record(&self, severity: Severity, target: Target, message: String) {
        let Some(capture) = &self.capture else {
            return;
        };
        if let Ok(mut events) = capture.lock() {
            events.push(DiagnosticEvent {
                severity,
                target: target.as_str(),
                role: self.role,
                message,
            });
        }
    }
}

/// Emits an info message through a [`Logger`].
///
/// ```
/// use logging::{Logger, Role, VerbosityConfig, info_log};
///
/// let logger = Logger::capturing(VerbosityConfig::from_verbose_level(1), Role::Sender);
/// info_log!(logger, Name, 1, "{}", "dir/file");
/// assert_eq!(logger.captured()[0].message, "dir/file");
/// ```
#[macro_export]
macro_rules! info_log {
    ($logger:expr, $flag:ident, $level:expr, $($arg:tt)+) => {
        $logger.info($crate::InfoFlag::$flag, $level, format_args!($($arg)+))
    };
}

/// Emits a debug message through a [`Logger`].
#[macro_export]
macro_rules! debug_log {
    ($logger:expr, $flag:ident, $level:expr, $($arg:tt)+) => {
        $logger.debug($crate::DebugFlag::$flag, $level, format_args!($($arg)+))
    };
}

/// Emits a warning through a [`Logger`].
#[macro_export]
macro_rules! warn_log {
    ($logger:expr, $($arg:tt)+) => {
        $logger.warn(format_args!($($arg)+))
    };
}

/// Emits an error through a [`Logger`].
#[macro_export]
macro_rules! error_log {
    ($logger:expr, $($arg:tt)+) => {
        $logger.error(format_args!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gated_info_is_not_recorded() {
        let logger = Logger::capturing(VerbosityConfig::from_verbose_level(0), Role::Sender);
        logger.info(InfoFlag::Name, 1, format_args!("hidden"));
        logger.info(InfoFlag::Nonreg, 1, format_args!("skipping non-regular file"));
        let events = logger.captured();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].target, "rsync::nonreg");
    }

    #[test]
    fn role_clones_share_capture() {
        let receiver = Logger::capturing(VerbosityConfig::from_verbose_level(3), Role::Receiver);
        let generator = receiver.with_role(Role::Generator);
        generator.debug(DebugFlag::Genr, 1, format_args!("requesting whole file"));
        receiver.warn(format_args!("vanished"));

        let events = receiver.captured();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].role, Role::Generator);
        assert_eq!(events[0].severity, Severity::Debug);
        assert_eq!(events[1].role, Role::Receiver);
        assert_eq!(events[1].severity, Severity::Warning);
    }

    #[test]
    fn warnings_ignore_verbosity() {
        let logger = Logger::capturing(VerbosityConfig::default(), Role::Daemon);
        logger.error(format_args!("bind failed"));
        assert_eq!(logger.captured()[0].severity, Severity::Error);
    }

    #[test]
    fn non_capturing_logger_reports_nothing() {
        let logger = Logger::quiet(Role::Client);
        logger.warn(format_args!("ignored"));
        assert!(logger.captured().is_empty());
    }
}
