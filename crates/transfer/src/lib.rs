#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `transfer` runs the binary phase of an rsync protocol 27 session once a
//! transport exists and the checksum seed is known. It provides the two
//! roles a peer can take:
//!
//! - [`Sender`] builds the file list, reads the peer's block signatures and
//!   answers each request with literal data and block references.
//! - [`Receiver`] runs the generator and the receive phase concurrently. The
//!   generator decides which entries need data and sends signatures of the
//!   local basis files; the receive phase rebuilds each file in a temporary
//!   next to its destination, verifies the whole-file digest and renames it
//!   into place.
//!
//! # Design
//!
//! A [`Connection`] owns the buffered, byte-counting halves of the transport
//! and switches either half to multiplexed framing. Servers multiplex their
//! output; clients demultiplex their input. A local copy pairs a client
//! sender with a server receiver over a socket pair so that the same session
//! code runs on both ends.
//!
//! Failures that only affect one file (a vanished source, a digest mismatch,
//! a permission error on the destination) are logged and counted in
//! [`TransferStats::files_failed`]. Everything else aborts the session with
//! a [`TransferError`] whose [`exit_code`](TransferError::exit_code) maps to
//! rsync's exit statuses.
//!
//! # Examples
//!
//! ```no_run
//! use std::os::unix::net::UnixStream;
//! use std::thread;
//!
//! use logging::{Logger, Role};
//! use transfer::{CancelToken, Connection, Receiver, Sender, TransferOptions};
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let (near, far) = UnixStream::pair()?;
//! let options = TransferOptions { recursive: true, times: true, ..TransferOptions::default() };
//!
//! let sender_options = options.clone();
//! let sending = thread::spawn(move || -> Result<_, transfer::TransferError> {
//!     let logger = Logger::quiet(Role::Sender);
//!     let mut conn = Connection::new(near.try_clone()?, near).multiplex_input(logger.clone())?;
//!     Sender::new(sender_options, logger).run(&mut conn, &["src/"])
//! });
//!
//! let cancel = CancelToken::new();
//! let handle = far.try_clone()?;
//! cancel.on_cancel(move || {
//!     let _ = handle.shutdown(std::net::Shutdown::Both);
//! });
//! let mut conn = Connection::new(far.try_clone()?, far).multiplex_output()?;
//! let receiver_options = TransferOptions { server: true, ..options };
//! let stats = Receiver::new(receiver_options, Logger::quiet(Role::Receiver))
//!     .with_cancel(cancel)
//!     .run(&mut conn, "dest".as_ref())?;
//! sending.join().expect("sender thread")?;
//! println!("{} files transferred", stats.files_transferred);
//! # Ok(())
//! # }
//! ```

mod cancel;
mod connection;
mod destination;
mod error;
mod generator;
mod options;
mod receiver;
mod sender;
mod stats;
mod temp;

pub use cancel::CancelToken;
pub use connection::{
    ByteCounter, Connection, ConnectionReader, ConnectionWriter, CountingReader, CountingWriter,
};
pub use destination::Destination;
pub use error::{
    EXIT_FILE_IO, EXIT_FILE_SELECT, EXIT_PARTIAL, EXIT_SIGNAL, EXIT_STREAM, EXIT_UNSUPPORTED,
    EXIT_VANISHED, ErrorSeverity, TransferError, categorize_io_error,
};
pub use options::TransferOptions;
pub use receiver::Receiver;
pub use sender::Sender;
pub use stats::{PeerStats, TransferStats};
pub use temp::{TempFileGuard, open_tmpfile};
