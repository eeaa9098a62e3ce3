//! Multiplexed stream framing.
//!
//! Traffic from the server to the client is multiplexed: data and diagnostics
//! share one byte stream, each chunk prefixed by a
//! [`MessageHeader`](crate::MessageHeader). Traffic in the other direction is
//! plain. [`WireWriter`] and [`WireReader`] start plain and switch to
//! multiplexed framing once the session reaches the binary phase.

mod io;
mod reader;
mod wire;
mod writer;

pub use io::{recv_msg, send_msg};
pub use reader::MuxReader;
pub use wire::{WireReader, WireWriter};
pub use writer::{IO_BUFFER_SIZE, MuxWriter};
