use filters::{FilterError, FilterRule, FilterSet};
use metadata::{MetadataOptions, running_as_root};
use protocol::flist::ListOptions;

/// Options shared by both ends of a transfer.
///
/// Each field corresponds to the rsync flag named in its doc comment. The
/// sender and the receiver must agree on the fields that shape the file list
/// (`owner`, `group`, `links`, `devices`, `numeric_ids`), because they decide
/// which attributes are encoded on the wire.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransferOptions {
    /// `-r`
    pub recursive: bool,
    /// `-l`
    pub links: bool,
    /// `-p`
    pub perms: bool,
    /// `-t`
    pub times: bool,
    /// `-o`
    pub owner: bool,
    /// `-g`
    pub group: bool,
    /// `-D`
    pub devices: bool,
    /// `-I`: transfer files whose size and mtime already match.
    pub ignore_times: bool,
    /// `--numeric-ids`
    pub numeric_ids: bool,
    /// `-n`
    pub dry_run: bool,
    /// Checksum seed chosen by the server.
    pub seed: i32,
    /// Exclude and include rules, in order.
    pub filters: Vec<FilterRule>,
    /// This end was started as the server. Decides which side exchanges the
    /// filter list and the closing statistics.
    pub server: bool,
}

impl TransferOptions {
    /// Attributes the file list carries.
    pub const fn list_options(&self) -> ListOptions {
        ListOptions {
            preserve_uid: self.owner,
            preserve_gid: self.group,
            preserve_links: self.links,
            preserve_devices: self.devices,
            numeric_ids: self.numeric_ids,
        }
    }

    /// Attributes the receiver applies. Ownership of files is only changed
    /// when running as root; groups are attempted regardless.
    pub fn metadata_options(&self) -> MetadataOptions {
        MetadataOptions::new()
            .preserve_permissions(self.perms)
            .preserve_times(self.times)
            .preserve_owner(self.owner && running_as_root())
            .preserve_group(self.group)
    }

    /// Compiles [`filters`](Self::filters).
    pub fn filter_set(&self) -> Result<FilterSet, FilterError> {
        FilterSet::from_rules(self.filters.iter().cloned())
    }
}
