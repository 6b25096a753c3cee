//! Human readable descriptions of `ICMP` types and codes.
//!
//! See <https://www.iana.org/assignments/icmp-parameters/icmp-parameters.xhtml>

/// Describe an `ICMP` type and code, such as `Time Exceeded: Time to Live exceeded in Transit`.
pub fn describe(icmp_type: u8, code: u8) -> String {
    match (type_description(icmp_type), code_description(icmp_type, code)) {
        (Some(ty), Some(code)) => format!("{ty}: {code}"),
        (Some(ty), None) => format!("{ty}: code {code}"),
        (None, _) => format!("Unknown: type {icmp_type} code {code}"),
    }
}

/// The description of an `ICMP` type.
pub const fn type_description(icmp_type: u8) -> Option<&'static str> {
    Some(match icmp_type {
        0 => "Echo Reply",
        1 | 2 | 7 => "Unassigned",
        3 => "Destination Unreachable",
        4 => "Source Quench (Deprecated)",
        5 => "Redirect",
        6 => "Alternate Host Address (Deprecated)",
        8 => "Echo",
        9 => "Router Advertisement",
        10 => "Router Solicitation",
        11 => "Time Exceeded",
        12 => "Parameter Problem",
        13 => "Timestamp",
        14 => "Timestamp Reply",
        15 => "Information Request (Deprecated)",
        16 => "Information Reply (Deprecated)",
        17 => "Address Mask Request (Deprecated)",
        18 => "Address Mask Reply (Deprecated)",
        19..=29 => "Reserved",
        30 => "Traceroute (Deprecated)",
        31 => "Datagram Conversion Error (Deprecated)",
        32 => "Mobile Host Redirect (Deprecated)",
        33 => "IPv6 Where-Are-You (Deprecated)",
        34 => "IPv6 I-Am-Here (Deprecated)",
        35 => "Mobile Registration Request (Deprecated)",
        36 => "Mobile Registration Reply (Deprecated)",
        37 => "Domain Name Request (Deprecated)",
        38 => "Domain Name Reply (Deprecated)",
        39 => "SKIP (Deprecated)",
        40 => "Photuris",
        41 => "Experimental Mobility Protocols",
        42 => "Extended Echo Request",
        43 => "Extended Echo Reply",
        _ => return None,
    })
}

/// The description of an `ICMP` code for a given type.
pub const fn code_description(icmp_type: u8, code: u8) -> Option<&'static str> {
    Some(match (icmp_type, code) {
        (0 | 4 | 6 | 8 | 10 | 13..=18, 0) => "No Code",
        (3, 0) => "Net Unreachable",
        (3, 1) => "Host Unreachable",
        (3, 2) => "Protocol Unreachable",
        (3, 3) => "Port Unreachable",
        (3, 4) => "Fragmentation Needed and Don't Fragment was Set",
        (3, 5) => "Source Route Failed",
        (3, 6) => "Destination Network Unknown",
        (3, 7) => "Destination Host Unknown",
        (3, 8) => "Source Host Isolated",
        (3, 9) => "Communication with Destination Network is Administratively Prohibited",
        (3, 10) => "Communication with Destination Host is Administratively Prohibited",
        (3, 11) => "Destination Network Unreachable for Type of Service",
        (3, 12) => "Destination Host Unreachable for Type of Service",
        (3, 13) => "Communication Administratively Prohibited",
        (3, 14) => "Host Precedence Violation",
        (3, 15) => "Precedence cutoff in effect",
        (5, 0) => "Redirect Datagram for the Network (or subnet)",
        (5, 1) => "Redirect Datagram for the Host",
        (5, 2) => "Redirect Datagram for the Type of Service and Network",
        (5, 3) => "Redirect Datagram for the Type of Service and Host",
        (9, 0) => "Normal router advertisement",
        (9, 16) => "Does not route common traffic",
        (11, 0) => "Time to Live exceeded in Transit",
        (11, 1) => "Fragment Reassembly Time Exceeded",
        (12, 0) => "Pointer indicates the error",
        (12, 1) => "Missing a Required Option",
        (12, 2) => "Bad Length",
        (40, 0) => "Bad SPI",
        (40, 1) => "Authentication Failed",
        (40, 2) => "Decompression Failed",
        (40, 3) => "Decryption Failed",
        (40, 4) => "Need Authentication",
        (40, 5) => "Need Authorization",
        (42 | 43, 0) => "No Error",
        (43, 1) => "Malformed Query",
        (43, 2) => "No Such Interface",
        (43, 3) => "No Such Table Entry",
        (43, 4) => "Multiple Interfaces Satisfy Query",
        _ => return None,
    })
}
