/// Which attributes of a file-list entry are applied to the destination.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MetadataOptions {
    preserve_permissions: bool,
    preserve_times: bool,
    preserve_owner: bool,
    preserve_group: bool,
}

impl MetadataOptions {
    /// Options that apply nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            preserve_permissions: false,
            preserve_times: false,
            preserve_owner: false,
            preserve_group: false,
        }
    }

    /// Applies permission bits (`-p`).
    #[must_use]
    #[doc(alias = "--perms")]
    pub const fn preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }

    /// Applies modification times (`-t`).
    #[must_use]
    #[doc(alias = "--times")]
    pub const fn preserve_times(mut self, preserve: bool) -> Self {
        self.preserve_times = preserve;
        self
    }

    /// Applies the owner (`-o`).
    #[must_use]
    #[doc(alias = "--owner")]
    pub const fn preserve_owner(mut self, preserve: bool) -> Self {
        self.preserve_owner = preserve;
        self
    }

    /// Applies the group (`-g`).
    #[must_use]
    #[doc(alias = "--group")]
    pub const fn preserve_group(mut self, preserve: bool) -> Self {
        self.preserve_group = preserve;
        self
    }

    /// Whether permissions are applied.
    pub const fn permissions(&self) -> bool {
        self.preserve_permissions
    }

    /// Whether times are applied.
    pub const fn times(&self) -> bool {
        self.preserve_times
    }

    /// Whether the owner is applied.
    pub const fn owner(&self) -> bool {
        self.preserve_owner
    }

    /// Whether the group is applied.
    pub const fn group(&self) -> bool {
        self.preserve_group
    }
}
