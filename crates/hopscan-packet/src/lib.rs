//! Wire formats for probing over `IPv4`.
//!
//! The following headers are supported:
//! - `IPv4` (including options)
//! - `ICMPv4` (echo request, echo reply, time exceeded, destination unreachable)
//! - `UDP`
//!
//! Each header is a view over a caller supplied byte slice. A view created
//! with `new` is writable and is used to build a packet in place, a view
//! created with `new_view` is read-only and is used to decode a received
//! packet. Views never read or write outside of the slice they wrap.
//!
//! # Endianness
//!
//! Bytes are held in network byte order (big-endian) and all accessors take
//! and return values in host byte order.
//!
//! # Example
//!
//! Decode a `UDP` header:
//!
//! ```rust
//! # fn main() -> anyhow::Result<()> {
//! use hopscan_packet::udp::UdpPacket;
//!
//! let buf = hex_literal::hex!("30 39 82 9a 00 28 00 00");
//! let udp = UdpPacket::new_view(&buf)?;
//! assert_eq!(12345, udp.get_source());
//! assert_eq!(33434, udp.get_destination());
//! assert_eq!(40, udp.get_length());
//! assert!(udp.payload().is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! Build an `ICMPv4` echo request:
//!
//! ```rust
//! # fn main() -> anyhow::Result<()> {
//! use hopscan_packet::checksum::checksum;
//! use hopscan_packet::icmpv4::{IcmpCode, IcmpPacket, IcmpType};
//!
//! let mut buf = [0; IcmpPacket::minimum_packet_size()];
//! let mut icmp = IcmpPacket::new(&mut buf)?;
//! icmp.set_icmp_type(IcmpType::EchoRequest);
//! icmp.set_icmp_code(IcmpCode(0));
//! icmp.set_identifier(1234);
//! icmp.set_sequence(10);
//! icmp.set_checksum(checksum(icmp.packet()));
//! assert_eq!(icmp.packet(), &hex_literal::hex!("08 00 f3 23 04 d2 00 0a"));
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod buffer;

/// Packet errors.
pub mod error;

/// The Internet checksum.
pub mod checksum;

/// `IPv4` headers.
pub mod ipv4;

/// `ICMPv4` headers.
pub mod icmpv4;

/// `UDP` headers.
pub mod udp;

/// The protocol carried by an `IPv4` datagram.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IpProtocol {
    Icmp,
    Tcp,
    Udp,
    Other(u8),
}

impl IpProtocol {
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Icmp => 1,
            Self::Tcp => 6,
            Self::Udp => 17,
            Self::Other(id) => id,
        }
    }
}

impl From<u8> for IpProtocol {
    fn from(id: u8) -> Self {
        match id {
            1 => Self::Icmp,
            6 => Self::Tcp,
            17 => Self::Udp,
            p => Self::Other(p),
        }
    }
}

/// Format bytes as space separated hex pairs.
#[must_use]
pub fn fmt_payload(bytes: &[u8]) -> String {
    use itertools::Itertools as _;
    format!("{:02x}", bytes.iter().format(" "))
}
