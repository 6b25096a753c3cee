use anyhow::anyhow;
use clap::{ArgAction, Parser, ValueEnum};
use hopscan_core::{defaults, Protocol};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

/// Discover the hops to a host or send it a fixed number of packets
#[derive(Parser, Debug)]
#[command(name = "hopscan", author, version, about, long_about = None, arg_required_else_help(true))]
pub struct Args {
    /// The destination host name or IPv4 address
    #[arg(short = 'd', long)]
    pub destination: String,

    /// Discover the hops to the destination with this protocol [default: icmp]
    #[arg(value_enum, short = 'p', long, conflicts_with = "tx")]
    pub probetype: Option<ProtocolConfig>,

    /// Send a fixed number of packets to the destination with this protocol
    #[arg(value_enum, short = 't', long)]
    pub tx: Option<ProtocolConfig>,

    /// The UDP destination port, incremented for every hop discovery probe [default: 33434]
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// The UDP source port [default: 12345]
    #[arg(short = 'S', long)]
    pub source_port: Option<u16>,

    /// The time-to-live of every transmitted packet, 0 means 255 [default: 0]
    #[arg(short = 'H', long, requires = "tx")]
    pub hops: Option<u8>,

    /// The number of packets to transmit [default: 10]
    #[arg(short = 'c', long, requires = "tx")]
    pub packets: Option<u32>,

    /// The interval between transmitted packets in milliseconds [default: 1000]
    #[arg(short = 'i', long, requires = "tx")]
    pub interval: Option<u32>,

    /// How long to wait for replies after the last packet is transmitted [default: 5s]
    #[arg(short = 'l', long, value_parser = parse_duration, requires = "tx", conflicts_with = "no_linger")]
    pub linger: Option<Duration>,

    /// Wait for replies to every transmitted packet until interrupted
    #[arg(long, requires = "tx")]
    pub no_linger: bool,

    /// The payload size in bytes [default: 0 for icmp, 32 for udp]
    #[arg(short = 's', long)]
    pub payload: Option<u16>,

    /// The source IPv4 address [default: auto]
    #[arg(short = 'A', long, value_parser = parse_addr)]
    pub source_address: Option<Ipv4Addr>,

    /// The time-to-live of the first hop discovery probe [default: 1]
    #[arg(short = 'f', long, conflicts_with = "tx")]
    pub first_ttl: Option<u8>,

    /// The maximum time-to-live of hop discovery probes [default: 64]
    #[arg(short = 'm', long, conflicts_with = "tx")]
    pub max_ttl: Option<u8>,

    /// The number of probes sent to each hop before giving up on it [default: 3]
    #[arg(short = 'a', long, conflicts_with = "tx")]
    pub max_attempts: Option<u8>,

    /// The time to wait for the reply to each hop discovery probe [default: 5s]
    #[arg(short = 'T', long, value_parser = parse_duration, conflicts_with = "tx")]
    pub timeout: Option<Duration>,

    /// Enable debug output, repeat for more detail
    #[arg(short = 'D', long, action = ArgAction::Count)]
    pub debug: u8,
}

/// The protocol to probe or transmit with.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum ProtocolConfig {
    /// Internet Control Message Protocol
    Icmp,
    /// User Datagram Protocol
    Udp,
}

impl From<ProtocolConfig> for Protocol {
    fn from(value: ProtocolConfig) -> Self {
        match value {
            ProtocolConfig::Icmp => Self::Icmp,
            ProtocolConfig::Udp => Self::Udp,
        }
    }
}

/// The hopscan action to perform.
#[derive(Debug, Eq, PartialEq)]
pub enum Action {
    /// Discover the hops to the destination.
    Probe(ProbeOptions),
    /// Send a fixed number of packets to the destination.
    Transmit(TransmitOptions),
}

impl Action {
    /// The debug verbosity requested on the command line.
    pub const fn verbosity(&self) -> u8 {
        match self {
            Self::Probe(opts) => opts.verbosity,
            Self::Transmit(opts) => opts.verbosity,
        }
    }
}

impl TryFrom<Args> for Action {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> anyhow::Result<Self> {
        let destination = args.destination.trim().to_string();
        if destination.is_empty() {
            return Err(anyhow!("destination must not be empty"));
        }
        let src_port = args.source_port.unwrap_or(defaults::DEFAULT_UDP_SRC_PORT);
        let dest_port = args.port.unwrap_or(defaults::DEFAULT_UDP_DEST_PORT);
        Ok(if let Some(protocol) = args.tx {
            let interval = args
                .interval
                .map_or(defaults::DEFAULT_TRANSMIT_INTERVAL, |ms| {
                    Duration::from_millis(u64::from(ms))
                });
            let linger = if args.no_linger {
                None
            } else {
                Some(args.linger.unwrap_or(defaults::DEFAULT_TRANSMIT_LINGER))
            };
            Self::Transmit(TransmitOptions {
                destination,
                source_addr: args.source_address,
                protocol: Protocol::from(protocol),
                hops: args.hops.unwrap_or(defaults::DEFAULT_TRANSMIT_HOPS),
                packets: args.packets.unwrap_or(defaults::DEFAULT_TRANSMIT_PACKETS),
                interval,
                linger,
                src_port,
                dest_port,
                payload_size: args.payload,
                verbosity: args.debug,
            })
        } else {
            let protocol = args
                .probetype
                .map_or(defaults::DEFAULT_PROTOCOL, Protocol::from);
            Self::Probe(ProbeOptions {
                destination,
                source_addr: args.source_address,
                protocol,
                first_ttl: args.first_ttl.unwrap_or(defaults::DEFAULT_PROBE_FIRST_TTL),
                max_ttl: args.max_ttl.unwrap_or(defaults::DEFAULT_PROBE_MAX_TTL),
                max_attempts: args
                    .max_attempts
                    .unwrap_or(defaults::DEFAULT_PROBE_MAX_ATTEMPTS),
                timeout: args.timeout.unwrap_or(defaults::DEFAULT_PROBE_TIMEOUT),
                src_port,
                dest_port,
                payload_size: args.payload,
                verbosity: args.debug,
            })
        })
    }
}

/// Hop discovery options.
#[derive(Debug, Eq, PartialEq)]
pub struct ProbeOptions {
    pub destination: String,
    pub source_addr: Option<Ipv4Addr>,
    pub protocol: Protocol,
    pub first_ttl: u8,
    pub max_ttl: u8,
    pub max_attempts: u8,
    pub timeout: Duration,
    pub src_port: u16,
    pub dest_port: u16,
    pub payload_size: Option<u16>,
    pub verbosity: u8,
}

/// Sustained send options.
#[derive(Debug, Eq, PartialEq)]
pub struct TransmitOptions {
    pub destination: String,
    pub source_addr: Option<Ipv4Addr>,
    pub protocol: Protocol,
    pub hops: u8,
    pub packets: u32,
    pub interval: Duration,
    pub linger: Option<Duration>,
    pub src_port: u16,
    pub dest_port: u16,
    pub payload_size: Option<u16>,
    pub verbosity: u8,
}

fn parse_duration(value: &str) -> anyhow::Result<Duration> {
    Ok(humantime::parse_duration(value)?)
}

fn parse_addr(value: &str) -> anyhow::Result<Ipv4Addr> {
    Ok(Ipv4Addr::from_str(value)?)
}
