#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! Wire format for rsync protocol version 27.
//!
//! The crate covers every byte that crosses the connection after a transport
//! has been established:
//!
//! - [`varint`]: fixed-width integers, the `longint` escape and length
//!   prefixed strings.
//! - [`legacy`]: the `@RSYNCD:` line-oriented daemon handshake.
//! - [`MessageHeader`] and the [`multiplex`] framing used from server to
//!   client once the binary phase begins.
//! - [`flist`]: file list entries, id lists and ordering.
//! - [`filters`]: the exclude list a client hands to the sender.
//! - [`wire`]: block signatures and the literal/copy token stream.
//!
//! Codec functions take `&mut impl Read` or `&mut impl Write` and return
//! [`std::io::Result`]. Malformed input surfaces as
//! [`std::io::ErrorKind::InvalidData`] carrying a [`ProtocolError`].
//!
//! # Examples
//!
//! ```
//! use protocol::varint::{read_longint, write_longint};
//!
//! let mut buf = Vec::new();
//! write_longint(&mut buf, 5_000_000_000).expect("write");
//! assert_eq!(buf.len(), 12);
//! let value = read_longint(&mut buf.as_slice()).expect("read");
//! assert_eq!(value, 5_000_000_000);
//! ```

mod envelope;
mod error;
pub mod filters;
pub mod flist;
pub mod legacy;
pub mod multiplex;
pub mod varint;
pub mod wire;

pub use envelope::{
    EnvelopeError, HEADER_LEN as MESSAGE_HEADER_LEN, MAX_PAYLOAD_LENGTH, MPLEX_BASE, MessageCode,
    MessageHeader,
};
pub use error::{ProtocolError, RemoteError};
pub use legacy::{MIN_PROTOCOL_VERSION, PROTOCOL_VERSION};
pub use multiplex::{MuxReader, MuxWriter, WireReader, WireWriter, recv_msg, send_msg};
