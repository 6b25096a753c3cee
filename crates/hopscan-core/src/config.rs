use crate::types::{Port, TimeToLive, TraceId};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default values for configuration.
pub mod defaults {
    use crate::Protocol;
    use std::time::Duration;

    /// The default value for `protocol`.
    pub const DEFAULT_PROTOCOL: Protocol = Protocol::Icmp;

    /// The time to wait for a reply to a probe.
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

    /// The default value for `max-attempts`, the number of sends per hop.
    pub const DEFAULT_PROBE_MAX_ATTEMPTS: u8 = 3;

    /// The default value for `first-ttl`.
    pub const DEFAULT_PROBE_FIRST_TTL: u8 = 1;

    /// The default value for `max-ttl`.
    pub const DEFAULT_PROBE_MAX_TTL: u8 = 64;

    /// The default `UDP` destination port of the first probe.
    pub const DEFAULT_UDP_DEST_PORT: u16 = 33434;

    /// The default `UDP` source port.
    pub const DEFAULT_UDP_SRC_PORT: u16 = 12345;

    /// The default `UDP` probe payload size.
    pub const DEFAULT_UDP_PAYLOAD_SIZE: u16 = 32;

    /// The default `ICMP` payload size.
    pub const DEFAULT_ICMP_PAYLOAD_SIZE: u16 = 0;

    /// The default value for `hops`.
    pub const DEFAULT_TRANSMIT_HOPS: u8 = 0;

    /// The default value for `packets`.
    pub const DEFAULT_TRANSMIT_PACKETS: u32 = 10;

    /// The default value for `interval`.
    pub const DEFAULT_TRANSMIT_INTERVAL: Duration = Duration::from_millis(1000);

    /// The default time to wait for replies after the last packet is sent.
    pub const DEFAULT_TRANSMIT_LINGER: Duration = Duration::from_secs(5);

    /// The time-to-live used when `hops` is zero.
    pub const UNSET_HOPS_TTL: u8 = 255;
}

/// The probing protocol.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Protocol {
    /// `ICMP` echo requests, correlated by identifier and sequence.
    Icmp,
    /// `UDP` datagrams, correlated by port and `IPv4` identification.
    Udp,
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Icmp => write!(f, "icmp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Hop discovery configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProbeConfig {
    pub target_addr: Ipv4Addr,
    pub protocol: Protocol,
    pub first_ttl: TimeToLive,
    pub max_ttl: TimeToLive,
    pub max_attempts: u8,
    pub timeout: Duration,
    pub src_port: Port,
    pub initial_dest_port: Port,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target_addr: Ipv4Addr::UNSPECIFIED,
            protocol: defaults::DEFAULT_PROTOCOL,
            first_ttl: TimeToLive(defaults::DEFAULT_PROBE_FIRST_TTL),
            max_ttl: TimeToLive(defaults::DEFAULT_PROBE_MAX_TTL),
            max_attempts: defaults::DEFAULT_PROBE_MAX_ATTEMPTS,
            timeout: defaults::DEFAULT_PROBE_TIMEOUT,
            src_port: Port(defaults::DEFAULT_UDP_SRC_PORT),
            initial_dest_port: Port(defaults::DEFAULT_UDP_DEST_PORT),
        }
    }
}

/// Sustained send configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransmitConfig {
    pub target_addr: Ipv4Addr,
    pub protocol: Protocol,
    pub ttl: TimeToLive,
    pub packets: u32,
    pub interval: Duration,
    pub identifier: TraceId,
    pub src_port: Port,
    pub dest_port: Port,
    pub linger: Option<Duration>,
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            target_addr: Ipv4Addr::UNSPECIFIED,
            protocol: defaults::DEFAULT_PROTOCOL,
            ttl: TimeToLive(defaults::UNSET_HOPS_TTL),
            packets: defaults::DEFAULT_TRANSMIT_PACKETS,
            interval: defaults::DEFAULT_TRANSMIT_INTERVAL,
            identifier: TraceId::default(),
            src_port: Port(defaults::DEFAULT_UDP_SRC_PORT),
            dest_port: Port(defaults::DEFAULT_UDP_DEST_PORT),
            linger: Some(defaults::DEFAULT_TRANSMIT_LINGER),
        }
    }
}

/// Raw socket channel configuration.
///
/// The payload is built once and copied into every packet the channel sends.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ChannelConfig {
    pub protocol: Protocol,
    pub source_addr: Ipv4Addr,
    pub target_addr: Ipv4Addr,
    pub payload: Vec<u8>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            protocol: defaults::DEFAULT_PROTOCOL,
            source_addr: Ipv4Addr::UNSPECIFIED,
            target_addr: Ipv4Addr::UNSPECIFIED,
            payload: Vec::new(),
        }
    }
}
