use crate::types::{Port, Sequence, TimeToLive, TraceId};
use std::net::Ipv4Addr;
use tokio::time::Instant;

/// A probe sent to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// The sequence of the probe.
    ///
    /// Carried in the `ICMP` echo request or, for `UDP`, in the `IPv4`
    /// identification field.
    pub sequence: Sequence,
    /// The `ICMP` identifier.
    pub identifier: TraceId,
    /// The source port (`UDP` only)
    pub src_port: Port,
    /// The destination port (`UDP` only)
    pub dest_port: Port,
    /// The TTL of the probe.
    pub ttl: TimeToLive,
    /// Which send attempt at this TTL, starting at 1.
    pub attempt: u8,
    /// When the probe was sent.
    pub sent: Instant,
}

impl Probe {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        sequence: Sequence,
        identifier: TraceId,
        src_port: Port,
        dest_port: Port,
        ttl: TimeToLive,
        attempt: u8,
        sent: Instant,
    ) -> Self {
        Self {
            sequence,
            identifier,
            src_port,
            dest_port,
            ttl,
            attempt,
            sent,
        }
    }

    /// The fields a response must quote back to match this probe.
    #[must_use]
    pub const fn key(&self) -> ProbeKey {
        ProbeKey {
            identifier: self.identifier,
            sequence: self.sequence,
            src_port: self.src_port,
            dest_port: self.dest_port,
        }
    }
}

/// The correlation key of a probe.
///
/// Fields a protocol does not use are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeKey {
    pub identifier: TraceId,
    pub sequence: Sequence,
    pub src_port: Port,
    pub dest_port: Port,
}

/// The type of `ICMP` packet received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpPacketType {
    /// `TimeExceeded` packet.
    TimeExceeded(IcmpPacketCode),
    /// `EchoReply` packet.
    EchoReply(IcmpPacketCode),
    /// Unreachable packet.
    Unreachable(IcmpPacketCode),
}

impl IcmpPacketType {
    /// The `ICMP` type number.
    #[must_use]
    pub const fn type_id(&self) -> u8 {
        match self {
            Self::EchoReply(_) => 0,
            Self::Unreachable(_) => 3,
            Self::TimeExceeded(_) => 11,
        }
    }

    #[must_use]
    pub const fn code(&self) -> IcmpPacketCode {
        match self {
            Self::TimeExceeded(code) | Self::EchoReply(code) | Self::Unreachable(code) => *code,
        }
    }
}

/// The code of `TimeExceeded`, `EchoReply` and `Unreachable` `ICMP` packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpPacketCode(pub u8);

/// The response to a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    TimeExceeded(ResponseData, IcmpPacketCode),
    DestinationUnreachable(ResponseData, IcmpPacketCode),
    EchoReply(ResponseData, IcmpPacketCode),
}

impl Response {
    #[must_use]
    pub const fn data(&self) -> &ResponseData {
        match self {
            Self::TimeExceeded(data, _)
            | Self::DestinationUnreachable(data, _)
            | Self::EchoReply(data, _) => data,
        }
    }

    #[must_use]
    pub const fn packet_type(&self) -> IcmpPacketType {
        match self {
            Self::TimeExceeded(_, code) => IcmpPacketType::TimeExceeded(*code),
            Self::DestinationUnreachable(_, code) => IcmpPacketType::Unreachable(*code),
            Self::EchoReply(_, code) => IcmpPacketType::EchoReply(*code),
        }
    }
}

/// The data in the probe response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseData {
    /// When the response was received.
    pub recv: Instant,
    /// The address that sent the response.
    pub addr: Ipv4Addr,
    /// The probe fields the response carried or quoted.
    pub proto_resp: ProtocolResponse,
}

impl ResponseData {
    #[must_use]
    pub const fn new(recv: Instant, addr: Ipv4Addr, proto_resp: ProtocolResponse) -> Self {
        Self {
            recv,
            addr,
            proto_resp,
        }
    }

    /// The correlation key recovered from the response.
    #[must_use]
    pub const fn key(&self) -> ProbeKey {
        match self.proto_resp {
            ProtocolResponse::Icmp(IcmpProtocolResponse {
                identifier,
                sequence,
            }) => ProbeKey {
                identifier: TraceId(identifier),
                sequence: Sequence(sequence),
                src_port: Port(0),
                dest_port: Port(0),
            },
            ProtocolResponse::Udp(UdpProtocolResponse {
                identifier,
                src_port,
                dest_port,
            }) => ProbeKey {
                identifier: TraceId(0),
                sequence: Sequence(identifier),
                src_port: Port(src_port),
                dest_port: Port(dest_port),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolResponse {
    Icmp(IcmpProtocolResponse),
    Udp(UdpProtocolResponse),
}

/// The data in the response to an `ICMP` probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpProtocolResponse {
    /// The `ICMP` identifier.
    pub identifier: u16,
    /// The `ICMP` sequence number.
    pub sequence: u16,
}

impl IcmpProtocolResponse {
    #[must_use]
    pub const fn new(identifier: u16, sequence: u16) -> Self {
        Self {
            identifier,
            sequence,
        }
    }
}

/// The data in the response to a `UDP` probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpProtocolResponse {
    /// The `IPv4` identification of the quoted probe.
    ///
    /// This is the sequence number of the probe.
    pub identifier: u16,
    /// The quoted source port.
    pub src_port: u16,
    /// The quoted destination port.
    pub dest_port: u16,
}

impl UdpProtocolResponse {
    #[must_use]
    pub const fn new(identifier: u16, src_port: u16, dest_port: u16) -> Self {
        Self {
            identifier,
            src_port,
            dest_port,
        }
    }
}
