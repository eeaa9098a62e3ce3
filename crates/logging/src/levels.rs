//! crates/logging/src/levels.rs
//! Flag enums and per-flag level tables for info and debug output.

/// Info categories, mirroring rsync's `--info` flags that this workspace emits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InfoFlag {
    /// Files being updated.
    Copy,
    /// File list building and transmission.
    Flist,
    /// Miscellaneous session messages, including peer info-channel text.
    Misc,
    /// Names of transferred files.
    Name,
    /// Skipped non-regular files.
    Nonreg,
    /// Files skipped because they are already up to date.
    Skip,
    /// End-of-session transfer statistics.
    Stats,
}

impl InfoFlag {
    /// All info flags in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Copy,
        Self::Flist,
        Self::Misc,
        Self::Name,
        Self::Nonreg,
        Self::Skip,
        Self::Stats,
    ];

    /// Returns the flag name used by `--info`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Flist => "flist",
            Self::Misc => "misc",
            Self::Name => "name",
            Self::Nonreg => "nonreg",
            Self::Skip => "skip",
            Self::Stats => "stats",
        }
    }
}

/// Debug categories, mirroring rsync's `--debug` flags.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DebugFlag {
    /// Connection establishment and daemon handshakes.
    Connect,
    /// Delta computation and block matching.
    Deltasum,
    /// Filter rule evaluation.
    Filter,
    /// File list encoding and decoding.
    Flist,
    /// Generator decisions.
    Genr,
    /// Low-level I/O and multiplexing.
    Io,
    /// Ownership changes.
    Own,
    /// Protocol negotiation.
    Proto,
    /// Receiver operations.
    Recv,
    /// Sender operations.
    Send,
}

impl DebugFlag {
    /// All debug flags in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Connect,
        Self::Deltasum,
        Self::Filter,
        Self::Flist,
        Self::Genr,
        Self::Io,
        Self::Own,
        Self::Proto,
        Self::Recv,
        Self::Send,
    ];

    /// Returns the flag name used by `--debug`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Deltasum => "deltasum",
            Self::Filter => "filter",
            Self::Flist => "flist",
            Self::Genr => "genr",
            Self::Io => "io",
            Self::Own => "own",
            Self::Proto => "proto",
            Self::Recv => "recv",
            Self::Send => "send",
        }
    }
}

/// Info verbosity levels for each flag.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct InfoLevels {
    /// File update level.
    pub copy: u8,
    /// File list level.
    pub flist: u8,
    /// Miscellaneous level.
    pub misc: u8,
    /// File name level.
    pub name: u8,
    /// Non-regular file level.
    pub nonreg: u8,
    /// Skipped file level.
    pub skip: u8,
    /// Statistics level.
    pub stats: u8,
}

impl InfoLevels {
    /// Get the level for a specific flag.
    pub fn get(&self, flag: InfoFlag) -> u8 {
        match flag {
            InfoFlag::Copy => self.copy,
            InfoFlag::Flist => self.flist,
            InfoFlag::Misc => self.misc,
            InfoFlag::Name => self.name,
            InfoFlag::Nonreg => self.nonreg,
            InfoFlag::Skip => self.skip,
            InfoFlag::Stats => self.stats,
        }
    }

    /// Set the level for a specific flag.
    pub fn set(&mut self, flag: InfoFlag, level: u8) {
        let slot = match flag {
            InfoFlag::Copy => &mut self.copy,
            InfoFlag::Flist => &mut self.flist,
            InfoFlag::Misc => &mut self.misc,
            InfoFlag::Name => &mut self.name,
            InfoFlag::Nonreg => &mut self.nonreg,
            InfoFlag::Skip => &mut self.skip,
            InfoFlag::Stats => &mut self.stats,
        };
        *slot = level;
    }

    /// Set all flags to the specified level.
    pub fn set_all(&mut self, level: u8) {
        for flag in InfoFlag::ALL {
            self.set(flag, level);
        }
    }
}

/// Debug verbosity levels for each flag.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct DebugLevels {
    /// Connection level.
    pub connect: u8,
    /// Delta computation level.
    pub deltasum: u8,
    /// Filter level.
    pub filter: u8,
    /// File list level.
    pub flist: u8,
    /// Generator level.
    pub genr: u8,
    /// I/O level.
    pub io: u8,
    /// Ownership level.
    pub own: u8,
    /// Protocol level.
    pub proto: u8,
    /// Receiver level.
    pub recv: u8,
    /// Sender level.
    pub send: u8,
}

impl DebugLevels {
    /// Get the level for a specific flag.
    pub fn get(&self, flag: DebugFlag) -> u8 {
        match flag {
            DebugFlag::Connect => self.connect,
            DebugFlag::Deltasum => self.deltasum,
            DebugFlag::Filter => self.filter,
            DebugFlag::Flist => self.flist,
            DebugFlag::Genr => self.genr,
            DebugFlag::Io => self.io,
            DebugFlag::Own => self.own,
            DebugFlag::Proto => self.proto,
            DebugFlag::Recv => self.recv,
            DebugFlag::Send => self.send,
        }
    }

    /// Set the level for a specific flag.
    pub fn set(&mut self, flag: DebugFlag, level: u8) {
        let slot = match flag {
            DebugFlag::Connect => &mut self.connect,
            DebugFlag::Deltasum => &mut self.deltasum,
            DebugFlag::Filter => &mut self.filter,
            DebugFlag::Flist => &mut self.flist,
            DebugFlag::Genr => &mut self.genr,
            DebugFlag::Io => &mut self.io,
            DebugFlag::Own => &mut self.own,
            DebugFlag::Proto => &mut self.proto,
            DebugFlag::Recv => &mut self.recv,
            DebugFlag::Send => &mut self.send,
        };
        *slot = level;
    }

    /// Set all flags to the specified level.
    pub fn set_all(&mut self, level: u8) {
        for flag in DebugFlag::ALL {
            self.set(flag, level);
        }
    }

    /// Returns `true` when at least one debug flag is enabled.
    pub fn any_enabled(&self) -> bool {
        DebugFlag::ALL.iter().any(|flag| self.get(*flag) > 0)
    }
}
