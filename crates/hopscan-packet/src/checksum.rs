//! The Internet checksum ([RFC 1071]).
//!
//! All functions expect the checksum field of the data they are given to be
//! zero. Callers zero the field, compute the checksum and then write it back.
//!
//! [RFC 1071]: https://www.rfc-editor.org/rfc/rfc1071

use crate::IpProtocol;
use std::net::Ipv4Addr;

/// Compute the Internet checksum of `data`.
///
/// The data is summed as big-endian 16-bit words, a trailing odd byte is the
/// high byte of a zero padded word. The 32-bit sum is folded to 16 bits and
/// complemented.
#[must_use]
pub fn checksum(data: &[u8]) -> u16 {
    finalize_checksum(sum_be_words(data))
}

/// Compute the checksum of a `UDP` datagram carried over `IPv4`.
///
/// The sum covers the `IPv4` pseudo-header (source, destination, protocol and
/// `UDP` length) followed by the `UDP` header and payload. A result of zero is
/// returned as `0xFFFF` as zero means "no checksum" for `UDP`.
#[must_use]
pub fn udp_ipv4_checksum(data: &[u8], source: Ipv4Addr, destination: Ipv4Addr) -> u16 {
    let sum = ipv4_pseudo_header_sum(source, destination, IpProtocol::Udp, data.len())
        + sum_be_words(data);
    match finalize_checksum(sum) {
        0 => 0xFFFF,
        checksum => checksum,
    }
}

/// Does `data`, including its stored checksum, sum to the all ones value?
#[must_use]
pub fn is_valid(data: &[u8]) -> bool {
    checksum(data) == 0
}

fn ipv4_pseudo_header_sum(
    source: Ipv4Addr,
    destination: Ipv4Addr,
    protocol: IpProtocol,
    length: usize,
) -> u32 {
    sum_be_words(&source.octets())
        + sum_be_words(&destination.octets())
        + u32::from(protocol.id())
        + (length as u32 & 0xFFFF)
}

fn sum_be_words(data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(2);
    let mut sum = chunks
        .by_ref()
        .map(|word| u32::from(u16::from_be_bytes([word[0], word[1]])))
        .fold(0_u32, u32::wrapping_add);
    if let [last] = chunks.remainder() {
        sum = sum.wrapping_add(u32::from(*last) << 8);
    }
    sum
}

const fn finalize_checksum(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xFFFF);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use test_case::test_case;

    #[test]
    fn test_ipv4_header_checksum() {
        let header = hex!("45 00 00 3c 1c 46 40 00 40 06 00 00 ac 10 0a 63 ac 10 0a 0c");
        assert_eq!(0xb1e6, checksum(&header));
    }

    #[test]
    fn test_ipv4_header_checksum_with_carry() {
        let header = hex!("45 00 0f fc 38 c0 00 00 40 01 00 00 0a 00 00 02 0a 00 00 01");
        assert_eq!(0x1e3f, checksum(&header));
    }

    #[test]
    fn test_icmp_echo_request_checksum() {
        let icmp = hex!("08 00 00 00 04 d2 00 0a");
        assert_eq!(0xf323, checksum(&icmp));
    }

    #[test_case(&[], 0xFFFF; "empty")]
    #[test_case(&[0x00], 0xFFFF; "single zero byte")]
    #[test_case(&[0xFF], 0x00FF; "odd byte is high byte")]
    #[test_case(&[0xFF, 0xFF, 0xFF, 0xFF], 0x0000; "folded carry")]
    #[test_case(&[0x12, 0x34, 0x56], 0x97CB; "odd length")]
    fn test_checksum_edge_cases(data: &[u8], expected: u16) {
        assert_eq!(expected, checksum(data));
    }

    #[test]
    fn test_stored_checksum_verifies() {
        let mut header = hex!("45 00 00 3c 1c 46 40 00 40 06 00 00 ac 10 0a 63 ac 10 0a 0c");
        assert!(!is_valid(&header));
        let sum = checksum(&header);
        header[10..12].copy_from_slice(&sum.to_be_bytes());
        assert!(is_valid(&header));
    }

    #[test]
    fn test_udp_ipv4_checksum() {
        let src = Ipv4Addr::new(192, 168, 1, 10);
        let dest = Ipv4Addr::new(203, 0, 113, 1);
        let mut udp = hex!("30 39 82 9a 00 0c 00 00 40 41 42 43");
        let sum = udp_ipv4_checksum(&udp, src, dest);
        udp[6..8].copy_from_slice(&sum.to_be_bytes());
        let pseudo = [
            &src.octets()[..],
            &dest.octets()[..],
            &[0x00, 17, 0x00, 0x0c][..],
            &udp[..],
        ]
        .concat();
        assert!(is_valid(&pseudo));
    }
}
