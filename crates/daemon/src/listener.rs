//! TCP listener and connection dispatch.
//!
//! The daemon binds one socket, accepts connections on a polling loop that
//! honours a shutdown flag and serves each connection on its own thread.
//! Finished workers are reaped between accepts; their failures are logged
//! and never stop the listener.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use logging::{Logger, Role, info_log, warn_log};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::{DaemonError, EXIT_SYNTAX};
use crate::rsyncd_config::RsyncdConfig;
use crate::session::{SessionOutcome, serve_connection};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const LISTEN_BACKLOG: i32 = 128;

type WorkerResult = Result<SessionOutcome, DaemonError>;

/// A configured daemon ready to listen.
#[derive(Debug)]
pub struct Daemon {
    config: Arc<RsyncdConfig>,
    motd: Arc<Vec<String>>,
    logger: Logger,
    shutdown: Arc<AtomicBool>,
}

impl Daemon {
    /// Prepares a daemon for `config`, reading the message of the day.
    pub fn new(config: RsyncdConfig, logger: Logger) -> Result<Self, DaemonError> {
        let motd = config.motd_lines()?;
        Ok(Self {
            config: Arc::new(config),
            motd: Arc::new(motd),
            logger: logger.with_role(Role::Daemon),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that stops [`serve`](Self::serve) once set. In-flight sessions
    /// are allowed to finish.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// The loaded configuration.
    pub fn config(&self) -> &RsyncdConfig {
        &self.config
    }

    /// Binds the listening socket. `address` defaults to all IPv4
    /// interfaces.
    pub fn bind(&self, address: Option<&str>, port: u16) -> Result<TcpListener, DaemonError> {
        let ip = match address {
            Some(text) => text.parse::<IpAddr>().map_err(|_| {
                DaemonError::new(EXIT_SYNTAX, format!("invalid bind address '{text}'"))
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let requested = SocketAddr::new(ip, port);
        bind_listener(requested).map_err(|error| DaemonError::socket(Some(requested), "bind", &error))
    }

    /// Accepts and serves connections until the shutdown flag is set or
    /// accepting fails.
    pub fn serve(&self, listener: TcpListener) -> Result<(), DaemonError> {
        let local = listener.local_addr().ok();
        listener
            .set_nonblocking(true)
            .map_err(|error| DaemonError::socket(local, "configure listener", &error))?;
        if let Some(local) = local {
            info_log!(self.logger, Misc, 1, "listening on {local}");
        }

        let mut workers: Vec<thread::JoinHandle<WorkerResult>> = Vec::new();
        while !self.shutdown.load(Ordering::Relaxed) {
            self.reap_finished_workers(&mut workers);
            match listener.accept() {
                Ok((stream, peer)) => workers.push(self.spawn_worker(stream, peer)),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    self.drain_workers(&mut workers);
                    return Err(DaemonError::socket(local, "accept connection on", &error));
                }
            }
        }

        self.drain_workers(&mut workers);
        info_log!(self.logger, Misc, 1, "shutting down");
        Ok(())
    }

    /// Binds according to the configuration, with optional overrides, and
    /// serves until shut down.
    pub fn run(&self, address: Option<&str>, port: Option<u16>) -> Result<(), DaemonError> {
        let address = address.or_else(|| self.config.global().address());
        let port = port.unwrap_or_else(|| self.config.global().port());
        let listener = self.bind(address, port)?;
        self.serve(listener)
    }

    fn spawn_worker(&self, stream: TcpStream, peer: SocketAddr) -> thread::JoinHandle<WorkerResult> {
        let peer = normalize_peer_address(peer);
        let config = Arc::clone(&self.config);
        let motd = Arc::clone(&self.motd);
        let logger = self.logger.clone();
        thread::spawn(move || {
            // Accepted sockets inherit non-blocking mode on some platforms.
            stream
                .set_nonblocking(false)
                .map_err(|error| DaemonError::socket(Some(peer), "configure connection", &error))?;
            serve_connection(stream, peer, &config, &motd, &logger)
        })
    }

    fn reap_finished_workers(&self, workers: &mut Vec<thread::JoinHandle<WorkerResult>>) {
        let mut index = 0;
        while index < workers.len() {
            if workers[index].is_finished() {
                let handle = workers.remove(index);
                self.join_worker(handle);
            } else {
                index += 1;
            }
        }
    }

    fn drain_workers(&self, workers: &mut Vec<thread::JoinHandle<WorkerResult>>) {
        while let Some(handle) = workers.pop() {
            self.join_worker(handle);
        }
    }

    fn join_worker(&self, handle: thread::JoinHandle<WorkerResult>) {
        match handle.join() {
            Ok(Ok(SessionOutcome::Listed)) => {}
            Ok(Ok(SessionOutcome::Transferred { module, stats })) => {
                if !stats.is_complete() {
                    warn_log!(
                        self.logger,
                        "transfer with module '{module}' finished with {} failed files",
                        stats.files_failed
                    );
                }
            }
            Ok(Err(error)) => warn_log!(self.logger, "{error}"),
            Err(panic) => {
                let description = match panic.downcast::<String>() {
                    Ok(message) => *message,
                    Err(payload) => match payload.downcast::<&str>() {
                        Ok(message) => (*message).to_string(),
                        Err(_) => "worker thread panicked".to_string(),
                    },
                };
                warn_log!(self.logger, "{description}");
            }
        }
    }
}

fn bind_listener(address: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    if address.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.bind(&SockAddr::from(address))?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

fn normalize_peer_address(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map_or(addr, |v4| SocketAddr::new(IpAddr::V4(v4), addr.port())),
        IpAddr::V4(_) => addr,
    }
}
