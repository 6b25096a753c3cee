//! Hopscan - hop discovery and sustained probing over raw `IPv4` sockets.
//!
//! Two kinds of session are provided:
//!
//! - [`ProbeSession`] discovers the hops to a target by sending probes with
//!   an increasing time-to-live and matching the `ICMP` time exceeded,
//!   destination unreachable and echo reply messages that come back.
//! - [`TransmitSession`] sends a fixed number of packets at a fixed
//!   interval with a fixed time-to-live and reports the round trip time of
//!   every reply it can match.
//!
//! Both sessions run on a single-threaded tokio runtime. Sends, timers and
//! reply matching for a session are serialized through one task, while a
//! second task reads the raw receive socket.
//!
//! # Example
//!
//! Discover the hops to a target using `ICMP` echo requests:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # use std::net::Ipv4Addr;
//! use hopscan_core::{ProbeBuilder, ProbeEvent};
//!
//! let target = Ipv4Addr::new(203, 0, 113, 1);
//! ProbeBuilder::new(target)
//!     .build()?
//!     .run_with(|event| {
//!         if let ProbeEvent::Reply(hop) = event {
//!             println!("{}: {}, time = {:?}", hop.ttl.0, hop.addr, hop.rtt);
//!         }
//!     })?;
//! # Ok(())
//! # }
//! ```
//!
//! Send 5 `UDP` packets, one per second, with a time-to-live of 8:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # use std::net::Ipv4Addr;
//! # use std::time::Duration;
//! use hopscan_core::{Protocol, TransmitBuilder};
//!
//! let target = Ipv4Addr::new(203, 0, 113, 1);
//! TransmitBuilder::new(target)
//!     .protocol(Protocol::Udp)
//!     .hops(8)
//!     .packets(5)
//!     .interval(Duration::from_secs(1))
//!     .build()?
//!     .run_with(|event| println!("{event:?}"))?;
//! # Ok(())
//! # }
//! ```
#![warn(clippy::all, clippy::pedantic, clippy::nursery, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::option_if_let_else,
    clippy::missing_const_for_fn,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc
)]
#![deny(unsafe_code)]

mod builder;
mod config;
mod error;
mod matching;
mod net;
mod probe;
mod session;
mod types;

pub use builder::{ProbeBuilder, TransmitBuilder};
pub use config::{defaults, ChannelConfig, ProbeConfig, Protocol, TransmitConfig};
pub use error::{Error, ErrorKind, IoError, IoOperation, Result};
pub use net::channel::MAX_PACKET_SIZE;
pub use probe::{
    IcmpPacketCode, IcmpPacketType, IcmpProtocolResponse, Probe, ProbeKey, ProtocolResponse,
    Response, ResponseData, UdpProtocolResponse,
};
pub use session::{
    Completion, HopReply, ProbeEvent, ProbeSession, TransmitEvent, TransmitReply, TransmitSession,
};
pub use types::{PayloadSize, Port, Sequence, TimeToLive, TraceId};
