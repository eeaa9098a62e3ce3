#![allow(unsafe_code)]

use rustix::fs::{Gid, Uid};

pub(crate) fn uid_from_raw(raw: u32) -> Uid {
    Uid::from_raw(raw)
}

pub(crate) fn gid_from_raw(raw: u32) -> Gid {
    Gid::from_raw(raw)
}

/// Whether the process may give files away to other users.
pub fn running_as_root() -> bool {
    rustix::process::geteuid().is_root()
}
