use crate::config::{defaults, ChannelConfig, ProbeConfig, Protocol, TransmitConfig};
use crate::error::{Error, Result};
use crate::net::channel::{Channel, Receiver, MAX_PACKET_SIZE};
use crate::net::source::SourceAddr;
use crate::net::SocketImpl;
use crate::session::{ProbeSession, TransmitSession};
use crate::types::{PayloadSize, Port, TimeToLive, TraceId};
use hopscan_packet::icmpv4::IcmpPacket;
use hopscan_packet::ipv4::Ipv4Packet;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The first byte of the `UDP` probe payload pattern (`@`).
const UDP_PAYLOAD_PATTERN_START: u8 = 0x40;

/// Build a hop discovery session.
///
/// # Examples
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// use hopscan_core::{ProbeBuilder, Protocol};
///
/// let addr = std::net::Ipv4Addr::new(203, 0, 113, 1);
/// let _session = ProbeBuilder::new(addr)
///     .protocol(Protocol::Udp)
///     .max_attempts(1)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ProbeBuilder {
    target_addr: Ipv4Addr,
    source_addr: Option<Ipv4Addr>,
    protocol: Protocol,
    first_ttl: TimeToLive,
    max_ttl: TimeToLive,
    max_attempts: u8,
    timeout: Duration,
    src_port: Port,
    dest_port: Port,
    payload_size: Option<PayloadSize>,
    token: CancellationToken,
}

impl ProbeBuilder {
    #[must_use]
    pub fn new(target_addr: Ipv4Addr) -> Self {
        let config = ProbeConfig::default();
        Self {
            target_addr,
            source_addr: None,
            protocol: config.protocol,
            first_ttl: config.first_ttl,
            max_ttl: config.max_ttl,
            max_attempts: config.max_attempts,
            timeout: config.timeout,
            src_port: config.src_port,
            dest_port: config.initial_dest_port,
            payload_size: None,
            token: CancellationToken::new(),
        }
    }

    /// Set the source address.
    ///
    /// If not set then the source address will be discovered based on the
    /// target address.
    #[must_use]
    pub fn source_addr(self, source_addr: Option<Ipv4Addr>) -> Self {
        Self {
            source_addr,
            ..self
        }
    }

    #[must_use]
    pub fn protocol(self, protocol: Protocol) -> Self {
        Self { protocol, ..self }
    }

    #[must_use]
    pub fn first_ttl(self, first_ttl: u8) -> Self {
        Self {
            first_ttl: TimeToLive(first_ttl),
            ..self
        }
    }

    #[must_use]
    pub fn max_ttl(self, max_ttl: u8) -> Self {
        Self {
            max_ttl: TimeToLive(max_ttl),
            ..self
        }
    }

    /// Set the number of probes sent at each time-to-live before giving up on it.
    #[must_use]
    pub fn max_attempts(self, max_attempts: u8) -> Self {
        Self {
            max_attempts,
            ..self
        }
    }

    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Set the `UDP` source port.
    #[must_use]
    pub fn src_port(self, src_port: u16) -> Self {
        Self {
            src_port: Port(src_port),
            ..self
        }
    }

    /// Set the `UDP` destination port of the first probe.
    #[must_use]
    pub fn dest_port(self, dest_port: u16) -> Self {
        Self {
            dest_port: Port(dest_port),
            ..self
        }
    }

    /// Set the payload size.
    ///
    /// Defaults to 0 bytes for `ICMP` and 32 bytes for `UDP`.
    #[must_use]
    pub fn payload_size(self, payload_size: u16) -> Self {
        Self {
            payload_size: Some(PayloadSize(payload_size)),
            ..self
        }
    }

    /// Set the token used to cancel the session.
    #[must_use]
    pub fn cancellation_token(self, token: CancellationToken) -> Self {
        Self { token, ..self }
    }

    /// Validate the configuration.
    pub fn config(&self) -> Result<ProbeConfig> {
        if self.first_ttl.0 == 0 {
            return Err(Error::BadConfig(String::from("first_ttl must be at least 1")));
        }
        if self.first_ttl > self.max_ttl {
            return Err(Error::BadConfig(format!(
                "first_ttl {} > max_ttl {}",
                self.first_ttl.0, self.max_ttl.0
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::BadConfig(String::from(
                "max_attempts must be at least 1",
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::BadConfig(String::from("timeout must be non-zero")));
        }
        validate_payload_size(self.resolved_payload_size())?;
        Ok(ProbeConfig {
            target_addr: self.target_addr,
            protocol: self.protocol,
            first_ttl: self.first_ttl,
            max_ttl: self.max_ttl,
            max_attempts: self.max_attempts,
            timeout: self.timeout,
            src_port: self.src_port,
            initial_dest_port: self.dest_port,
        })
    }

    /// Validate the configuration and open the sockets.
    ///
    /// This operation requires the `CAP_NET_RAW` capability on Linux.
    pub fn build(self) -> Result<ProbeSession> {
        let config = self.config()?;
        let channel_config = ChannelConfig {
            protocol: self.protocol,
            source_addr: source_addr(self.source_addr, self.target_addr)?,
            target_addr: self.target_addr,
            payload: probe_payload(self.protocol, self.resolved_payload_size()),
        };
        let channel = Channel::<SocketImpl>::connect(&channel_config)?;
        let receiver = Receiver::open(self.protocol)?;
        Ok(ProbeSession::new(config, channel, receiver, self.token))
    }

    fn resolved_payload_size(&self) -> PayloadSize {
        self.payload_size
            .unwrap_or_else(|| default_payload_size(self.protocol))
    }
}

/// Build a sustained send session.
///
/// # Examples
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// use std::time::Duration;
/// use hopscan_core::TransmitBuilder;
///
/// let addr = std::net::Ipv4Addr::new(203, 0, 113, 1);
/// let _session = TransmitBuilder::new(addr)
///     .hops(12)
///     .packets(100)
///     .interval(Duration::from_millis(200))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TransmitBuilder {
    target_addr: Ipv4Addr,
    source_addr: Option<Ipv4Addr>,
    protocol: Protocol,
    ttl: TimeToLive,
    packets: u32,
    interval: Duration,
    identifier: Option<TraceId>,
    src_port: Port,
    dest_port: Port,
    payload_size: Option<PayloadSize>,
    linger: Option<Duration>,
    token: CancellationToken,
}

impl TransmitBuilder {
    #[must_use]
    pub fn new(target_addr: Ipv4Addr) -> Self {
        let config = TransmitConfig::default();
        Self {
            target_addr,
            source_addr: None,
            protocol: config.protocol,
            ttl: config.ttl,
            packets: config.packets,
            interval: config.interval,
            identifier: None,
            src_port: config.src_port,
            dest_port: config.dest_port,
            payload_size: None,
            linger: config.linger,
            token: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn source_addr(self, source_addr: Option<Ipv4Addr>) -> Self {
        Self {
            source_addr,
            ..self
        }
    }

    #[must_use]
    pub fn protocol(self, protocol: Protocol) -> Self {
        Self { protocol, ..self }
    }

    /// Set the time-to-live of every packet.
    ///
    /// Zero means the maximum time-to-live of 255.
    #[must_use]
    pub fn hops(self, hops: u8) -> Self {
        let ttl = match hops {
            0 => TimeToLive(defaults::UNSET_HOPS_TTL),
            hops => TimeToLive(hops),
        };
        Self { ttl, ..self }
    }

    #[must_use]
    pub fn packets(self, packets: u32) -> Self {
        Self { packets, ..self }
    }

    #[must_use]
    pub fn interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }

    /// Set the `ICMP` identifier.
    ///
    /// If not set then a random identifier is used.
    #[must_use]
    pub fn identifier(self, identifier: u16) -> Self {
        Self {
            identifier: Some(TraceId(identifier)),
            ..self
        }
    }

    #[must_use]
    pub fn src_port(self, src_port: u16) -> Self {
        Self {
            src_port: Port(src_port),
            ..self
        }
    }

    #[must_use]
    pub fn dest_port(self, dest_port: u16) -> Self {
        Self {
            dest_port: Port(dest_port),
            ..self
        }
    }

    #[must_use]
    pub fn payload_size(self, payload_size: u16) -> Self {
        Self {
            payload_size: Some(PayloadSize(payload_size)),
            ..self
        }
    }

    /// Set how long to wait for replies after the last packet is sent.
    ///
    /// If `None` then the session waits until every packet is answered or it
    /// is cancelled.
    #[must_use]
    pub fn linger(self, linger: Option<Duration>) -> Self {
        Self { linger, ..self }
    }

    #[must_use]
    pub fn cancellation_token(self, token: CancellationToken) -> Self {
        Self { token, ..self }
    }

    /// Validate the configuration.
    pub fn config(&self) -> Result<TransmitConfig> {
        if self.packets == 0 {
            return Err(Error::BadConfig(String::from("packets must be at least 1")));
        }
        if self.interval.is_zero() {
            return Err(Error::BadConfig(String::from("interval must be non-zero")));
        }
        validate_payload_size(self.resolved_payload_size())?;
        Ok(TransmitConfig {
            target_addr: self.target_addr,
            protocol: self.protocol,
            ttl: self.ttl,
            packets: self.packets,
            interval: self.interval,
            identifier: self.identifier.unwrap_or_else(|| TraceId(rand::random())),
            src_port: self.src_port,
            dest_port: self.dest_port,
            linger: self.linger,
        })
    }

    /// Validate the configuration and open the sockets.
    ///
    /// This operation requires the `CAP_NET_RAW` capability on Linux.
    pub fn build(self) -> Result<TransmitSession> {
        let config = self.config()?;
        let channel_config = ChannelConfig {
            protocol: self.protocol,
            source_addr: source_addr(self.source_addr, self.target_addr)?,
            target_addr: self.target_addr,
            payload: vec![0; usize::from(self.resolved_payload_size().0)],
        };
        let channel = Channel::<SocketImpl>::connect(&channel_config)?;
        let receiver = Receiver::open(self.protocol)?;
        Ok(TransmitSession::new(config, channel, receiver, self.token))
    }

    fn resolved_payload_size(&self) -> PayloadSize {
        self.payload_size
            .unwrap_or_else(|| default_payload_size(self.protocol))
    }
}

fn source_addr(source_addr: Option<Ipv4Addr>, target_addr: Ipv4Addr) -> Result<Ipv4Addr> {
    match source_addr {
        Some(addr) => Ok(addr),
        None => SourceAddr::discover::<SocketImpl>(target_addr),
    }
}

const fn default_payload_size(protocol: Protocol) -> PayloadSize {
    match protocol {
        Protocol::Icmp => PayloadSize(defaults::DEFAULT_ICMP_PAYLOAD_SIZE),
        Protocol::Udp => PayloadSize(defaults::DEFAULT_UDP_PAYLOAD_SIZE),
    }
}

/// The largest payload which fits in a datagram.
///
/// The `ICMP` and `UDP` headers are both 8 bytes.
const MAX_PAYLOAD_SIZE: usize =
    MAX_PACKET_SIZE - Ipv4Packet::minimum_packet_size() - IcmpPacket::minimum_packet_size();

fn validate_payload_size(payload_size: PayloadSize) -> Result<()> {
    if usize::from(payload_size.0) > MAX_PAYLOAD_SIZE {
        return Err(Error::BadConfig(format!(
            "payload size {} > {MAX_PAYLOAD_SIZE}",
            payload_size.0
        )));
    }
    Ok(())
}

/// The payload of a hop discovery probe.
///
/// `UDP` probes carry an ascending pattern starting at `@`, `ICMP` probes are
/// zero filled.
fn probe_payload(protocol: Protocol, payload_size: PayloadSize) -> Vec<u8> {
    let len = usize::from(payload_size.0);
    match protocol {
        Protocol::Icmp => vec![0; len],
        Protocol::Udp => (0..len)
            .map(|i| UDP_PAYLOAD_PATTERN_START.wrapping_add(i as u8))
            .collect(),
    }
}
