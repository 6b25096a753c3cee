use crate::buffer::Buffer;
use crate::error::{ensure_len, Error, Result};
use crate::{fmt_payload, IpProtocol};
use std::fmt::{Debug, Formatter};
use std::net::Ipv4Addr;

const VERSION_AND_IHL_OFFSET: usize = 0;
const TOS_OFFSET: usize = 1;
const TOTAL_LENGTH_OFFSET: usize = 2;
const IDENTIFICATION_OFFSET: usize = 4;
const FLAGS_OFFSET: usize = 6;
const FRAGMENT_OFFSET_LOW_OFFSET: usize = 7;
const TIME_TO_LIVE_OFFSET: usize = 8;
const PROTOCOL_OFFSET: usize = 9;
const CHECKSUM_OFFSET: usize = 10;
const SOURCE_OFFSET: usize = 12;
const DESTINATION_OFFSET: usize = 16;

const DONT_FRAGMENT_MASK: u8 = 0x40;
const MORE_FRAGMENTS_MASK: u8 = 0x20;
const FRAGMENT_OFFSET_HIGH_MASK: u8 = 0x1f;

/// An `IPv4` header and the payload which follows it.
///
/// The header is a fixed 20 bytes followed by `header_length * 4 - 20` bytes of
/// options.
pub struct Ipv4Packet<'a> {
    buf: Buffer<'a>,
}

impl<'a> Ipv4Packet<'a> {
    /// Wrap a writable buffer to build a header in place.
    ///
    /// Only the fixed header size is checked, the fields are not validated.
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        ensure_len("Ipv4Packet", packet.len(), Self::minimum_packet_size())?;
        Ok(Self {
            buf: Buffer::Mutable(packet),
        })
    }

    /// Decode a received header.
    ///
    /// Fails if the buffer is shorter than the fixed header, the version is not
    /// 4, the options length is outside `[0, 40]` or the buffer is shorter than
    /// the declared header length.
    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        ensure_len("Ipv4Packet", packet.len(), Self::minimum_packet_size())?;
        let packet = Self {
            buf: Buffer::Immutable(packet),
        };
        let version = packet.get_version();
        if version != 4 {
            return Err(Error::InvalidVersion(version));
        }
        let header_length = packet.get_header_length();
        let options_len =
            (usize::from(header_length) * 4).checked_sub(Self::minimum_packet_size());
        if !options_len.is_some_and(|len| len <= Self::maximum_options_size()) {
            return Err(Error::InvalidHeaderLength(header_length));
        }
        ensure_len("Ipv4Packet", packet.buf.len(), packet.header_len())?;
        Ok(packet)
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        20
    }

    #[must_use]
    pub const fn maximum_options_size() -> usize {
        40
    }

    /// The length of the header in bytes, including options.
    #[must_use]
    pub fn header_len(&self) -> usize {
        Self::minimum_packet_size() + self.options_len()
    }

    #[must_use]
    pub fn get_version(&self) -> u8 {
        self.buf.read_u8(VERSION_AND_IHL_OFFSET) >> 4
    }

    /// The header length in 32-bit words.
    #[must_use]
    pub fn get_header_length(&self) -> u8 {
        self.buf.read_u8(VERSION_AND_IHL_OFFSET) & 0x0f
    }

    #[must_use]
    pub fn get_tos(&self) -> u8 {
        self.buf.read_u8(TOS_OFFSET)
    }

    #[must_use]
    pub fn get_total_length(&self) -> u16 {
        self.buf.read_u16(TOTAL_LENGTH_OFFSET)
    }

    #[must_use]
    pub fn get_identification(&self) -> u16 {
        self.buf.read_u16(IDENTIFICATION_OFFSET)
    }

    #[must_use]
    pub fn get_dont_fragment(&self) -> bool {
        self.buf.read_u8(FLAGS_OFFSET) & DONT_FRAGMENT_MASK != 0
    }

    #[must_use]
    pub fn get_more_fragments(&self) -> bool {
        self.buf.read_u8(FLAGS_OFFSET) & MORE_FRAGMENTS_MASK != 0
    }

    /// The 13-bit fragment offset.
    #[must_use]
    pub fn get_fragment_offset(&self) -> u16 {
        let high = u16::from(self.buf.read_u8(FLAGS_OFFSET) & FRAGMENT_OFFSET_HIGH_MASK);
        (high << 8) | u16::from(self.buf.read_u8(FRAGMENT_OFFSET_LOW_OFFSET))
    }

    /// The flags and fragment offset as a single 16 bit word.
    #[must_use]
    pub fn get_flags_and_fragment_offset(&self) -> u16 {
        self.buf.read_u16(FLAGS_OFFSET)
    }

    #[must_use]
    pub fn get_ttl(&self) -> u8 {
        self.buf.read_u8(TIME_TO_LIVE_OFFSET)
    }

    #[must_use]
    pub fn get_protocol(&self) -> IpProtocol {
        IpProtocol::from(self.buf.read_u8(PROTOCOL_OFFSET))
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.read_u16(CHECKSUM_OFFSET)
    }

    #[must_use]
    pub fn get_source(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.read_array::<4>(SOURCE_OFFSET))
    }

    #[must_use]
    pub fn get_destination(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.read_array::<4>(DESTINATION_OFFSET))
    }

    #[must_use]
    pub fn get_options_raw(&self) -> &[u8] {
        let start = Self::minimum_packet_size();
        let end = self.header_len().min(self.buf.len());
        &self.buf.as_slice()[start..end]
    }

    pub fn set_version(&mut self, val: u8) {
        self.buf.write_masked(VERSION_AND_IHL_OFFSET, 0xf0, val << 4);
    }

    pub fn set_header_length(&mut self, val: u8) {
        self.buf.write_masked(VERSION_AND_IHL_OFFSET, 0x0f, val);
    }

    pub fn set_tos(&mut self, val: u8) {
        self.buf.write_u8(TOS_OFFSET, val);
    }

    pub fn set_total_length(&mut self, val: u16) {
        self.buf.write_u16(TOTAL_LENGTH_OFFSET, val);
    }

    pub fn set_identification(&mut self, val: u16) {
        self.buf.write_u16(IDENTIFICATION_OFFSET, val);
    }

    pub fn set_dont_fragment(&mut self, val: bool) {
        let bits = if val { DONT_FRAGMENT_MASK } else { 0 };
        self.buf.write_masked(FLAGS_OFFSET, DONT_FRAGMENT_MASK, bits);
    }

    pub fn set_more_fragments(&mut self, val: bool) {
        let bits = if val { MORE_FRAGMENTS_MASK } else { 0 };
        self.buf.write_masked(FLAGS_OFFSET, MORE_FRAGMENTS_MASK, bits);
    }

    /// Set the 13-bit fragment offset, higher bits of `val` are ignored.
    pub fn set_fragment_offset(&mut self, val: u16) {
        let [high, low] = val.to_be_bytes();
        self.buf
            .write_masked(FLAGS_OFFSET, FRAGMENT_OFFSET_HIGH_MASK, high);
        self.buf.write_u8(FRAGMENT_OFFSET_LOW_OFFSET, low);
    }

    pub fn set_flags_and_fragment_offset(&mut self, val: u16) {
        self.buf.write_u16(FLAGS_OFFSET, val);
    }

    pub fn set_ttl(&mut self, val: u8) {
        self.buf.write_u8(TIME_TO_LIVE_OFFSET, val);
    }

    pub fn set_protocol(&mut self, val: IpProtocol) {
        self.buf.write_u8(PROTOCOL_OFFSET, val.id());
    }

    pub fn set_checksum(&mut self, val: u16) {
        self.buf.write_u16(CHECKSUM_OFFSET, val);
    }

    pub fn set_source(&mut self, val: Ipv4Addr) {
        self.buf.write_array(SOURCE_OFFSET, val.octets());
    }

    pub fn set_destination(&mut self, val: Ipv4Addr) {
        self.buf.write_array(DESTINATION_OFFSET, val.octets());
    }

    /// Copy `vals` into the options area declared by the header length.
    pub fn set_options_raw(&mut self, vals: &[u8]) {
        let start = Self::minimum_packet_size();
        self.buf.as_slice_mut()[start..start + vals.len()].copy_from_slice(vals);
    }

    pub fn set_payload(&mut self, vals: &[u8]) {
        let start = self.header_len();
        self.buf.as_slice_mut()[start..start + vals.len()].copy_from_slice(vals);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// The bytes of the header, including options.
    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.buf.as_slice()[..self.header_len().min(self.buf.len())]
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.buf.tail(self.header_len())
    }

    fn options_len(&self) -> usize {
        (usize::from(self.get_header_length()) * 4).saturating_sub(Self::minimum_packet_size())
    }
}

impl Debug for Ipv4Packet<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipv4Packet")
            .field("version", &self.get_version())
            .field("header_length", &self.get_header_length())
            .field("tos", &self.get_tos())
            .field("total_length", &self.get_total_length())
            .field("identification", &self.get_identification())
            .field("dont_fragment", &self.get_dont_fragment())
            .field("more_fragments", &self.get_more_fragments())
            .field("fragment_offset", &self.get_fragment_offset())
            .field("ttl", &self.get_ttl())
            .field("protocol", &self.get_protocol())
            .field("checksum", &self.get_checksum())
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .field("options_raw", &fmt_payload(self.get_options_raw()))
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{checksum, is_valid};
    use hex_literal::hex;
    use test_case::test_case;

    #[test]
    fn test_version_and_header_length() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_version(4);
        assert_eq!([0x40], packet.packet()[..1]);
        packet.set_header_length(5);
        assert_eq!(4, packet.get_version());
        assert_eq!(5, packet.get_header_length());
        assert_eq!([0x45], packet.packet()[..1]);
        packet.set_header_length(15);
        assert_eq!(4, packet.get_version());
        assert_eq!([0x4F], packet.packet()[..1]);
    }

    #[test]
    fn test_dont_fragment_leaves_other_bits() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_more_fragments(true);
        packet.set_fragment_offset(0x1234);
        packet.set_dont_fragment(true);
        assert!(packet.get_dont_fragment());
        assert!(packet.get_more_fragments());
        assert_eq!(0x1234, packet.get_fragment_offset());
        assert_eq!([0x72, 0x34], packet.packet()[6..=7]);
        packet.set_dont_fragment(false);
        assert!(!packet.get_dont_fragment());
        assert!(packet.get_more_fragments());
        assert_eq!(0x1234, packet.get_fragment_offset());
        assert_eq!([0x32, 0x34], packet.packet()[6..=7]);
    }

    #[test]
    fn test_fragment_offset_leaves_flags() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_dont_fragment(true);
        packet.set_fragment_offset(0x1FFF);
        assert!(packet.get_dont_fragment());
        assert!(!packet.get_more_fragments());
        assert_eq!(0x1FFF, packet.get_fragment_offset());
        assert_eq!([0x5F, 0xFF], packet.packet()[6..=7]);
        packet.set_fragment_offset(0xFFFF);
        assert_eq!(0x1FFF, packet.get_fragment_offset());
        assert!(!packet.get_more_fragments());
        packet.set_fragment_offset(0);
        assert!(packet.get_dont_fragment());
        assert_eq!([0x40, 0x00], packet.packet()[6..=7]);
    }

    #[test]
    fn test_flags_and_fragment_offset_word() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_flags_and_fragment_offset(0x4000);
        assert!(packet.get_dont_fragment());
        assert_eq!(0, packet.get_fragment_offset());
        assert_eq!([0x40, 0x00], packet.packet()[6..=7]);
        packet.set_flags_and_fragment_offset(0x0040);
        assert!(!packet.get_dont_fragment());
        assert_eq!(0x40, packet.get_fragment_offset());
        assert_eq!(0x0040, packet.get_flags_and_fragment_offset());
    }

    #[test]
    fn test_more_fragments_leaves_other_bits() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_dont_fragment(true);
        packet.set_fragment_offset(7);
        packet.set_more_fragments(true);
        assert_eq!([0x60, 0x07], packet.packet()[6..=7]);
        packet.set_more_fragments(false);
        assert!(packet.get_dont_fragment());
        assert_eq!(7, packet.get_fragment_offset());
    }

    #[test]
    fn test_build_and_decode() {
        let mut buf = [0_u8; 28];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_version(4);
        packet.set_header_length(5);
        packet.set_tos(0xE0);
        packet.set_total_length(28);
        packet.set_identification(41585);
        packet.set_dont_fragment(true);
        packet.set_ttl(21);
        packet.set_protocol(IpProtocol::Udp);
        packet.set_source(Ipv4Addr::new(192, 168, 1, 10));
        packet.set_destination(Ipv4Addr::new(203, 0, 113, 1));
        packet.set_payload(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let sum = checksum(packet.header());
        packet.set_checksum(sum);
        assert!(is_valid(packet.header()));

        let view = Ipv4Packet::new_view(&buf).unwrap();
        assert_eq!(4, view.get_version());
        assert_eq!(5, view.get_header_length());
        assert_eq!(0xE0, view.get_tos());
        assert_eq!(28, view.get_total_length());
        assert_eq!(41585, view.get_identification());
        assert!(view.get_dont_fragment());
        assert!(!view.get_more_fragments());
        assert_eq!(0, view.get_fragment_offset());
        assert_eq!(21, view.get_ttl());
        assert_eq!(IpProtocol::Udp, view.get_protocol());
        assert_eq!(sum, view.get_checksum());
        assert_eq!(Ipv4Addr::new(192, 168, 1, 10), view.get_source());
        assert_eq!(Ipv4Addr::new(203, 0, 113, 1), view.get_destination());
        assert!(view.get_options_raw().is_empty());
        assert_eq!(&[1, 2, 3, 4, 5, 6, 7, 8], view.payload());
    }

    #[test]
    fn test_view_with_options() {
        let buf = hex!(
            "46 00 00 1c 00 01 00 00 40 01 00 00 0a 00 00 01 0a 00 00 02
             94 04 00 00 08 00 f7 ff"
        );
        let packet = Ipv4Packet::new_view(&buf).unwrap();
        assert_eq!(6, packet.get_header_length());
        assert_eq!(24, packet.header_len());
        assert_eq!(&[0x94, 0x04, 0x00, 0x00], packet.get_options_raw());
        assert_eq!(&[0x08, 0x00, 0xf7, 0xff], packet.payload());
    }

    #[test]
    fn test_set_options_raw() {
        let mut buf = [0_u8; 24];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_version(4);
        packet.set_header_length(6);
        packet.set_options_raw(&[0x94, 0x04, 0x00, 0x00]);
        assert_eq!(&[0x94, 0x04, 0x00, 0x00], packet.get_options_raw());
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn test_view_insufficient_buffer() {
        const SIZE: usize = Ipv4Packet::minimum_packet_size();
        let buf = [0x45_u8; SIZE - 1];
        let err = Ipv4Packet::new_view(&buf).unwrap_err();
        assert_eq!(
            Error::InsufficientPacketBuffer(String::from("Ipv4Packet"), SIZE, SIZE - 1),
            err
        );
    }

    #[test]
    fn test_new_insufficient_buffer() {
        const SIZE: usize = Ipv4Packet::minimum_packet_size();
        let mut buf = [0_u8; SIZE - 1];
        let err = Ipv4Packet::new(&mut buf).unwrap_err();
        assert_eq!(
            Error::InsufficientPacketBuffer(String::from("Ipv4Packet"), SIZE, SIZE - 1),
            err
        );
    }

    #[test_case(0x65, Error::InvalidVersion(6); "version 6")]
    #[test_case(0x05, Error::InvalidVersion(0); "version 0")]
    #[test_case(0x44, Error::InvalidHeaderLength(4); "options length -4")]
    #[test_case(0x40, Error::InvalidHeaderLength(0); "options length -20")]
    #[test_case(0x46, Error::InsufficientPacketBuffer(String::from("Ipv4Packet"), 24, 20); "truncated options")]
    fn test_view_invalid_header(first: u8, expected: Error) {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        buf[0] = first;
        assert_eq!(expected, Ipv4Packet::new_view(&buf).unwrap_err());
    }

    #[test]
    fn test_view_max_options() {
        let mut buf = [0_u8; 60];
        buf[0] = 0x4F;
        let packet = Ipv4Packet::new_view(&buf).unwrap();
        assert_eq!(40, packet.get_options_raw().len());
        assert!(packet.payload().is_empty());
    }
}
