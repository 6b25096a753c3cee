use crate::buffer::Buffer;
use crate::error::{ensure_len, Result};
use crate::fmt_payload;
use std::fmt::{Debug, Formatter};

/// The type of an `ICMPv4` message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IcmpType {
    EchoReply,
    DestinationUnreachable,
    EchoRequest,
    TimeExceeded,
    Other(u8),
}

impl IcmpType {
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::EchoReply => 0,
            Self::DestinationUnreachable => 3,
            Self::EchoRequest => 8,
            Self::TimeExceeded => 11,
            Self::Other(id) => id,
        }
    }

    /// Does a message of this type quote the datagram that caused it?
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::DestinationUnreachable | Self::TimeExceeded)
    }
}

impl From<u8> for IcmpType {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::EchoReply,
            3 => Self::DestinationUnreachable,
            8 => Self::EchoRequest,
            11 => Self::TimeExceeded,
            id => Self::Other(id),
        }
    }
}

/// The `ICMPv4` code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct IcmpCode(pub u8);

impl From<u8> for IcmpCode {
    fn from(val: u8) -> Self {
        Self(val)
    }
}

const TYPE_OFFSET: usize = 0;
const CODE_OFFSET: usize = 1;
const CHECKSUM_OFFSET: usize = 2;
const IDENTIFIER_OFFSET: usize = 4;
const SEQUENCE_OFFSET: usize = 6;

/// An `ICMPv4` header and the payload which follows it.
///
/// The second word of the header holds the identifier and sequence number.
/// For echo messages these correlate a reply with its request. For time
/// exceeded and destination unreachable messages the word is unused and the
/// payload quotes the `IPv4` header and first 8 bytes of the original
/// datagram, see [`IcmpPacket::quoted`].
pub struct IcmpPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> IcmpPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        ensure_len("IcmpPacket", packet.len(), Self::minimum_packet_size())?;
        Ok(Self {
            buf: Buffer::Mutable(packet),
        })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        ensure_len("IcmpPacket", packet.len(), Self::minimum_packet_size())?;
        Ok(Self {
            buf: Buffer::Immutable(packet),
        })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        8
    }

    #[must_use]
    pub fn get_icmp_type(&self) -> IcmpType {
        IcmpType::from(self.buf.read_u8(TYPE_OFFSET))
    }

    #[must_use]
    pub fn get_icmp_code(&self) -> IcmpCode {
        IcmpCode::from(self.buf.read_u8(CODE_OFFSET))
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.read_u16(CHECKSUM_OFFSET)
    }

    #[must_use]
    pub fn get_identifier(&self) -> u16 {
        self.buf.read_u16(IDENTIFIER_OFFSET)
    }

    #[must_use]
    pub fn get_sequence(&self) -> u16 {
        self.buf.read_u16(SEQUENCE_OFFSET)
    }

    pub fn set_icmp_type(&mut self, val: IcmpType) {
        self.buf.write_u8(TYPE_OFFSET, val.id());
    }

    pub fn set_icmp_code(&mut self, val: IcmpCode) {
        self.buf.write_u8(CODE_OFFSET, val.0);
    }

    pub fn set_checksum(&mut self, val: u16) {
        self.buf.write_u16(CHECKSUM_OFFSET, val);
    }

    pub fn set_identifier(&mut self, val: u16) {
        self.buf.write_u16(IDENTIFIER_OFFSET, val);
    }

    pub fn set_sequence(&mut self, val: u16) {
        self.buf.write_u16(SEQUENCE_OFFSET, val);
    }

    pub fn set_payload(&mut self, vals: &[u8]) {
        let start = Self::minimum_packet_size();
        self.buf.as_slice_mut()[start..start + vals.len()].copy_from_slice(vals);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.buf.tail(Self::minimum_packet_size())
    }

    /// The quoted datagram of an error message.
    ///
    /// Returns `None` for message types that do not quote a datagram.
    #[must_use]
    pub fn quoted(&self) -> Option<&[u8]> {
        self.get_icmp_type().is_error().then(|| self.payload())
    }
}

impl Debug for IcmpPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcmpPacket")
            .field("icmp_type", &self.get_icmp_type())
            .field("icmp_code", &self.get_icmp_code())
            .field("checksum", &self.get_checksum())
            .field("identifier", &self.get_identifier())
            .field("sequence", &self.get_sequence())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{checksum, is_valid};
    use crate::error::Error;
    use crate::ipv4::Ipv4Packet;
    use crate::IpProtocol;
    use hex_literal::hex;
    use std::net::Ipv4Addr;
    use test_case::test_case;

    #[test_case(0, IcmpType::EchoReply)]
    #[test_case(3, IcmpType::DestinationUnreachable)]
    #[test_case(8, IcmpType::EchoRequest)]
    #[test_case(11, IcmpType::TimeExceeded)]
    #[test_case(5, IcmpType::Other(5))]
    fn test_icmp_type(id: u8, expected: IcmpType) {
        assert_eq!(expected, IcmpType::from(id));
        assert_eq!(id, expected.id());
    }

    #[test]
    fn test_fields() {
        let mut buf = [0_u8; IcmpPacket::minimum_packet_size()];
        let mut packet = IcmpPacket::new(&mut buf).unwrap();
        packet.set_icmp_type(IcmpType::EchoReply);
        packet.set_icmp_code(IcmpCode(3));
        packet.set_checksum(0xBEEF);
        packet.set_identifier(42);
        packet.set_sequence(7);
        assert_eq!(&hex!("00 03 be ef 00 2a 00 07"), packet.packet());
        let view = IcmpPacket::new_view(&buf).unwrap();
        assert_eq!(IcmpType::EchoReply, view.get_icmp_type());
        assert_eq!(IcmpCode(3), view.get_icmp_code());
        assert_eq!(0xBEEF, view.get_checksum());
        assert_eq!(42, view.get_identifier());
        assert_eq!(7, view.get_sequence());
        assert!(view.payload().is_empty());
        assert!(view.quoted().is_none());
    }

    #[test]
    fn test_echo_request_with_payload() {
        let mut buf = [0_u8; 12];
        let mut packet = IcmpPacket::new(&mut buf).unwrap();
        packet.set_icmp_type(IcmpType::EchoRequest);
        packet.set_identifier(0x04d2);
        packet.set_sequence(0x000a);
        packet.set_payload(&[0xde, 0xad, 0xbe, 0xef]);
        packet.set_checksum(checksum(packet.packet()));
        assert!(is_valid(packet.packet()));
        assert_eq!(&[0xde, 0xad, 0xbe, 0xef], packet.payload());
    }

    #[test]
    fn test_time_exceeded_quotes_echo_request() {
        let buf = hex!(
            "0b 00 f4 ff 00 00 00 00
             45 00 00 1c 12 34 40 00 01 01 00 00 c0 a8 01 0a cb 00 71 01
             08 00 f7 d6 00 2a 00 07"
        );
        let packet = IcmpPacket::new_view(&buf).unwrap();
        assert_eq!(IcmpType::TimeExceeded, packet.get_icmp_type());
        assert_eq!(IcmpCode(0), packet.get_icmp_code());
        let quoted = packet.quoted().unwrap();
        let ipv4 = Ipv4Packet::new_view(quoted).unwrap();
        assert_eq!(IpProtocol::Icmp, ipv4.get_protocol());
        assert_eq!(Ipv4Addr::new(203, 0, 113, 1), ipv4.get_destination());
        let echo = IcmpPacket::new_view(ipv4.payload()).unwrap();
        assert_eq!(IcmpType::EchoRequest, echo.get_icmp_type());
        assert_eq!(42, echo.get_identifier());
        assert_eq!(7, echo.get_sequence());
    }

    #[test]
    fn test_new_view_insufficient_buffer() {
        const SIZE: usize = IcmpPacket::minimum_packet_size();
        let buf = [0_u8; SIZE - 1];
        let err = IcmpPacket::new_view(&buf).unwrap_err();
        assert_eq!(
            Error::InsufficientPacketBuffer(String::from("IcmpPacket"), SIZE, SIZE - 1),
            err
        );
    }
}
