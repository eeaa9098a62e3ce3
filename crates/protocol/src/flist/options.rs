/// Negotiated options that change which fields the file list carries.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ListOptions {
    /// Send owner uids.
    pub preserve_uid: bool,
    /// Send group gids.
    pub preserve_gid: bool,
    /// Send symlink targets.
    pub preserve_links: bool,
    /// Send device numbers.
    pub preserve_devices: bool,
    /// Suppress the uid and gid name lists.
    pub numeric_ids: bool,
}

impl ListOptions {
    /// Whether the uid name list follows the entries.
    pub const fn sends_uid_names(&self) -> bool {
        self.preserve_uid && !self.numeric_ids
    }

    /// Whether the gid name list follows the entries.
    pub const fn sends_gid_names(&self) -> bool {
        self.preserve_gid && !self.numeric_ids
    }
}
