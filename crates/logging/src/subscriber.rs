//! crates/logging/src/subscriber.rs
//! Process-level `tracing` subscriber installation for binaries.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use super::config::VerbosityConfig;

/// Builds the default filter directive for a verbosity table.
///
/// [`Logger`](crate::Logger) already gates each event by flag level, so the
/// filter only needs to let the `rsync::*` targets through at the most
/// detailed level in use.
pub fn default_directive(config: &VerbosityConfig) -> &'static str {
    if config.debug.any_enabled() {
        "rsync=debug"
    } else {
        "rsync=info"
    }
}

/// Installs a stderr `fmt` subscriber.
///
/// `RUST_LOG` overrides the directive derived from `config`. Returns an error
/// when a global subscriber is already installed.
pub fn init_tracing(config: &VerbosityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.debug.any_enabled())
        .without_time();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
}
