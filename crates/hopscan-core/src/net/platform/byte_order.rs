use crate::error::Result;
use std::net::Ipv4Addr;

/// The byte order of the `total_length` and flags/fragment offset fields of
/// an `IPv4` header passed to a raw socket with `IP_HDRINCL`.
///
/// Linux accepts network byte order. macOS and some BSD releases expect these
/// two fields in host byte order, while every other field stays in network
/// byte order.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Ipv4ByteOrder {
    #[cfg(not(target_os = "linux"))]
    Host,
    Network,
}

impl Ipv4ByteOrder {
    /// Discover the byte order the kernel expects for datagrams sent from `addr`.
    ///
    /// Off Linux a datagram is sent to localhost with the `total_length` in
    /// network byte order, and then swapped if the kernel rejects the first
    /// with `InvalidInput`.
    pub fn for_address(addr: Ipv4Addr) -> Result<Self> {
        super::byte_order_for_address(addr)
    }

    /// Adjust a 16 bit header field written in network byte order.
    ///
    /// Applies to `total_length` and to the flags/fragment offset word.
    #[must_use]
    pub const fn adjust(self, field: u16) -> u16 {
        match self {
            #[cfg(not(target_os = "linux"))]
            Self::Host => field.swap_bytes(),
            Self::Network => field,
        }
    }
}
