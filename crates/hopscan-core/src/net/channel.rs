use crate::config::{ChannelConfig, Protocol};
use crate::error::{Error, Result};
use crate::net::ipv4::{self, Ipv4};
use crate::net::platform::Ipv4ByteOrder;
use crate::net::RecvSocketImpl;
use crate::net::socket::Socket;
use crate::net::Network;
use crate::probe::{Probe, Response};
use hopscan_packet::fmt_payload;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// The maximum size of `IPv4` datagram we send or receive.
pub const MAX_PACKET_SIZE: usize = 65_535;

/// A channel for sending `Probe` packets.
pub struct Channel<S: Socket> {
    protocol: Protocol,
    send_socket: S,
    ipv4: Ipv4,
}

impl<S: Socket> Channel<S> {
    /// Open the raw send socket.
    ///
    /// This operation requires the `CAP_NET_RAW` capability on Linux.
    #[instrument(skip_all, level = "trace")]
    pub fn connect(config: &ChannelConfig) -> Result<Self> {
        tracing::debug!(?config);
        let send_socket = S::new_raw_send_socket_ipv4().map_err(Error::PrivilegeRequired)?;
        let byte_order = Ipv4ByteOrder::for_address(config.source_addr)?;
        tracing::debug!(?byte_order);
        Ok(Self::new(config, send_socket, byte_order))
    }

    fn new(config: &ChannelConfig, send_socket: S, byte_order: Ipv4ByteOrder) -> Self {
        Self {
            protocol: config.protocol,
            send_socket,
            ipv4: Ipv4 {
                src_addr: config.source_addr,
                dest_addr: config.target_addr,
                payload: config.payload.clone(),
                byte_order,
            },
        }
    }
}

impl<S: Socket> Network for Channel<S> {
    #[instrument(skip(self), level = "trace")]
    fn send_probe(&mut self, probe: &Probe) -> Result<()> {
        tracing::debug!(?probe);
        match self.protocol {
            Protocol::Icmp => self.ipv4.dispatch_icmp_probe(&mut self.send_socket, probe),
            Protocol::Udp => self.ipv4.dispatch_udp_probe(&mut self.send_socket, probe),
        }
    }
}

/// Reads responses from the raw receive socket.
pub struct Receiver {
    protocol: Protocol,
    recv_socket: RecvSocketImpl,
}

impl Receiver {
    /// Open the raw receive socket.
    ///
    /// This operation requires the `CAP_NET_RAW` capability on Linux.
    #[instrument(level = "trace")]
    pub fn open(protocol: Protocol) -> Result<Self> {
        let recv_socket =
            RecvSocketImpl::new_icmp_recv_socket_ipv4().map_err(Error::PrivilegeRequired)?;
        Ok(Self {
            protocol,
            recv_socket,
        })
    }

    /// Forward every response read from the socket to `tx`.
    ///
    /// Malformed and unrelated datagrams are discarded. Returns when `token`
    /// is cancelled, when `tx` is closed or when the socket fails.
    pub async fn forward(self, tx: mpsc::Sender<Response>, token: CancellationToken) -> Result<()> {
        let socket = self.recv_socket.register()?;
        let mut buf = vec![0_u8; MAX_PACKET_SIZE];
        loop {
            let bytes_read = tokio::select! {
                () = token.cancelled() => return Ok(()),
                read = socket.recv(&mut buf) => read?,
            };
            let packet = &buf[..bytes_read];
            tracing::trace!(packet = fmt_payload(packet), bytes_read);
            match ipv4::extract_response(self.protocol, packet, Instant::now()) {
                Ok(Some(resp)) => {
                    tracing::debug!(?resp);
                    if tx.send(resp).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(None) => tracing::trace!("ignoring unrelated packet"),
                Err(err) => tracing::debug!(%err, "discarding malformed packet"),
            }
        }
    }
}
