/// Channels carried by the multiplexed stream.
///
/// Protocol 27 only uses three: file data, errors and informational text.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum MessageCode {
    #[doc(alias = "MSG_DATA")]
    /// Protocol data.
    Data = 0,
    #[doc(alias = "MSG_ERROR")]
    /// Error text from the peer (`FERROR`).
    Error = 1,
    #[doc(alias = "MSG_INFO")]
    /// Informational text from the peer (`FINFO`).
    Info = 2,
}

impl MessageCode {
    /// Maps a raw code to a variant.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Data),
            1 => Some(Self::Error),
            2 => Some(Self::Info),
            _ => None,
        }
    }

    /// Raw numeric code.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}
