//! Rolling weak checksum used to find candidate blocks.
//!
//! The checksum keeps two 16-bit accumulators: `s1` is the sum of the bytes
//! in the window and `s2` is the sum of the running `s1` values. Bytes are
//! sign-extended before they are summed, exactly like the reference
//! implementation's `schar` buffers; treating them as unsigned produces
//! different values for any byte at or above `0x80`.

use core::fmt;

/// Errors that can occur while rolling the checksum window.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RollingError {
    /// The checksum window is empty, so there is no byte to remove.
    EmptyWindow,
    /// The checksum window length exceeds what can be represented in 32 bits.
    WindowTooLarge {
        /// Number of bytes present in the rolling window when the error was raised.
        len: usize,
    },
}

impl fmt::Display for RollingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyWindow => write!(f, "rolling checksum requires a non-empty window"),
            Self::WindowTooLarge { len } => write!(
                f,
                "rolling checksum window of {len} bytes exceeds 32-bit limit"
            ),
        }
    }
}

impl std::error::Error for RollingError {}

#[inline(always)]
const fn signed(byte: u8) -> u32 {
    byte as i8 as i32 as u32
}

/// Rolling checksum state over a window of bytes (often called `rsum`).
#[doc(alias = "rsum")]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RollingChecksum {
    s1: u32,
    s2: u32,
    len: usize,
}

impl RollingChecksum {
    /// Creates an empty checksum.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            s1: 0,
            s2: 0,
            len: 0,
        }
    }

    /// Computes the checksum of `block` from scratch.
    ///
    /// ```
    /// use checksums::RollingChecksum;
    ///
    /// let sum = RollingChecksum::from_block(b"abc");
    /// assert_eq!(sum.sum1(), 0x126);
    /// assert_eq!(sum.sum2(), 0x61 + 0xc3 + 0x126);
    /// ```
    #[must_use]
    pub fn from_block(block: &[u8]) -> Self {
        let mut sum = Self::new();
        sum.update(block);
        sum
    }

    /// Appends `chunk` to the window.
    pub fn update(&mut self, chunk: &[u8]) {
        let mut s1 = self.s1;
        let mut s2 = self.s2;
        for &byte in chunk {
            s1 = s1.wrapping_add(signed(byte));
            s2 = s2.wrapping_add(s1);
        }
        self.s1 = s1 & 0xffff;
        self.s2 = s2 & 0xffff;
        self.len += chunk.len();
    }

    /// Slides the window by one byte: `outgoing` leaves from the front and
    /// `incoming` is appended. The window length is unchanged.
    pub fn roll(&mut self, outgoing: u8, incoming: u8) -> Result<(), RollingError> {
        let window = self.window_len_u32()?;
        let out = signed(outgoing);

        self.s1 = self.s1.wrapping_sub(out).wrapping_add(signed(incoming)) & 0xffff;
        self.s2 = self
            .s2
            .wrapping_sub(window.wrapping_mul(out))
            .wrapping_add(self.s1)
            & 0xffff;
        Ok(())
    }

    /// Removes `outgoing` from the front without appending a byte, shrinking
    /// the window. Used when the window reaches the end of the file.
    pub fn trim_front(&mut self, outgoing: u8) -> Result<(), RollingError> {
        let window = self.window_len_u32()?;
        let out = signed(outgoing);

        self.s1 = self.s1.wrapping_sub(out) & 0xffff;
        self.s2 = self.s2.wrapping_sub(window.wrapping_mul(out)) & 0xffff;
        self.len -= 1;
        Ok(())
    }

    /// Packed 32-bit value, `(s2 << 16) | s1`, as sent on the wire.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u32 {
        (self.s2 << 16) | (self.s1 & 0xffff)
    }

    /// Hash-table bucket for this checksum; see [`tag`].
    #[inline]
    #[must_use]
    pub const fn tag(&self) -> u16 {
        tag(self.value())
    }

    /// Low accumulator.
    #[must_use]
    pub const fn sum1(&self) -> u16 {
        self.s1 as u16
    }

    /// High accumulator.
    #[must_use]
    pub const fn sum2(&self) -> u16 {
        self.s2 as u16
    }

    /// Number of bytes in the window.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the window holds no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clears the state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn window_len_u32(&self) -> Result<u32, RollingError> {
        if self.len == 0 {
            return Err(RollingError::EmptyWindow);
        }
        u32::try_from(self.len).map_err(|_| RollingError::WindowTooLarge { len: self.len })
    }
}

/// Computes the weak checksum of `buf`.
#[must_use]
pub fn weak_checksum(buf: &[u8]) -> u32 {
    RollingChecksum::from_block(buf).value()
}

/// Reduces a packed weak checksum to its 16-bit hash-table tag,
/// `(s1 + s2) & 0xffff`.
#[inline]
#[must_use]
pub const fn tag(sum: u32) -> u16 {
    ((sum & 0xffff).wrapping_add(sum >> 16) & 0xffff) as u16
}
