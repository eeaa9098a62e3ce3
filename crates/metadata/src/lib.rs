#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Applying file-list metadata to destination files.
//!
//! The receiver uses this crate after a file is in place: permissions,
//! modification times and ownership are applied according to the negotiated
//! preserve options, device nodes and fifos are created with `mknodat`, and
//! the sender's user and group names are mapped to local ids. The sender
//! uses the same name lookups to build its id lists.
//!
//! Only Unix targets are supported.

mod apply;
mod error;
mod id_lookup;
mod options;
mod ownership;
mod special;

pub use apply::{Ownership, apply_entry_metadata, set_mode};
pub use error::MetadataError;
pub use id_lookup::{IdMapper, gid_by_name, group_name, id_names, uid_by_name, user_name};
pub use options::MetadataOptions;
pub use ownership::running_as_root;
pub use special::{create_special, join_rdev, rdev_from_dev, split_rdev};
