//! User and group name lookup through the system user database.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use protocol::flist::IdName;

/// Name of the local user `uid`.
pub fn user_name(uid: u32) -> Option<Vec<u8>> {
    uzers::get_user_by_uid(uid).map(|user| user.name().as_bytes().to_vec())
}

/// Name of the local group `gid`.
pub fn group_name(gid: u32) -> Option<Vec<u8>> {
    uzers::get_group_by_gid(gid).map(|group| group.name().as_bytes().to_vec())
}

/// Local uid of the user called `name`.
pub fn uid_by_name(name: &[u8]) -> Option<u32> {
    uzers::get_user_by_name(OsStr::from_bytes(name)).map(|user| user.uid())
}

/// Local gid of the group called `name`.
pub fn gid_by_name(name: &[u8]) -> Option<u32> {
    uzers::get_group_by_name(OsStr::from_bytes(name)).map(|group| group.gid())
}

/// Builds the id list sent after a file list for the given ids.
pub fn id_names<F>(ids: impl IntoIterator<Item = u32>, lookup: F) -> Vec<IdName>
where
    F: Fn(u32) -> Option<Vec<u8>>,
{
    let mut seen: Vec<u32> = ids.into_iter().filter(|&id| id != 0).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.into_iter()
        .filter_map(|id| lookup(id).map(|name| IdName::new(id, name)))
        .collect()
}

/// Translates the sender's ids into local ids.
///
/// A sender id whose name exists locally maps to the local id of that name.
/// Ids without a name, unknown names and everything under `--numeric-ids`
/// pass through unchanged. Id 0 is never remapped.
#[derive(Clone, Debug, Default)]
pub struct IdMapper {
    map: HashMap<u32, u32>,
}

impl IdMapper {
    /// A mapper that leaves every id unchanged.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Builds a mapper from the sender's list using `resolve` to find local
    /// ids by name.
    pub fn from_names<F>(names: &[IdName], resolve: F) -> Self
    where
        F: Fn(&[u8]) -> Option<u32>,
    {
        let map = names
            .iter()
            .filter(|entry| entry.id != 0)
            .filter_map(|entry| resolve(&entry.name).map(|local| (entry.id, local)))
            .collect();
        Self { map }
    }

    /// Builds a uid mapper against the local user database.
    pub fn for_users(names: &[IdName]) -> Self {
        Self::from_names(names, uid_by_name)
    }

    /// Builds a gid mapper against the local group database.
    pub fn for_groups(names: &[IdName]) -> Self {
        Self::from_names(names, gid_by_name)
    }

    /// Local id for the sender's `id`.
    pub fn map(&self, id: u32) -> u32 {
        self.map.get(&id).copied().unwrap_or(id)
    }
}
