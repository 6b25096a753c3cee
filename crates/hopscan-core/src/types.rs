use derive_more::{Add, AddAssign, Sub};

/// `TimeToLive` (ttl) newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash, Add, Sub, AddAssign)]
pub struct TimeToLive(pub u8);

/// `Sequence` number newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct Sequence(pub u16);

impl Sequence {
    /// The next sequence, wrapping past `u16::MAX` to 1.
    ///
    /// Zero is skipped as a zero `IPv4` identification may be rewritten by
    /// the kernel.
    #[must_use]
    pub const fn next_nonzero(self) -> Self {
        match self.0.wrapping_add(1) {
            0 => Self(1),
            n => Self(n),
        }
    }
}

/// `TraceId` newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct TraceId(pub u16);

/// Port newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct Port(pub u16);

impl Port {
    /// The next port, restarting from `initial` past `u16::MAX`.
    #[must_use]
    pub const fn next_or(self, initial: Self) -> Self {
        match self.0.checked_add(1) {
            Some(port) => Self(port),
            None => initial,
        }
    }
}

/// `PayloadSize` newtype, the number of bytes after the `ICMP` or `UDP` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd)]
pub struct PayloadSize(pub u16);
