use crate::error::{Error, Result};
use crate::net::socket::Socket;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::instrument;

/// The port used for local address discovery.
const DISCOVERY_PORT: u16 = 80;

/// Discover the source address.
pub struct SourceAddr;

impl SourceAddr {
    /// Discover a local `Ipv4Addr` which can route to the target address.
    ///
    /// Connecting a datagram socket selects a route without transmitting
    /// any packets.
    #[instrument(ret, level = "trace")]
    pub fn discover<S: Socket>(target_addr: Ipv4Addr) -> Result<Ipv4Addr> {
        let mut socket = S::new_udp_dgram_socket_ipv4()?;
        socket.connect(SocketAddr::new(IpAddr::V4(target_addr), DISCOVERY_PORT))?;
        match socket.local_addr()?.ok_or(Error::MissingAddr)?.ip() {
            IpAddr::V4(addr) => Ok(addr),
            IpAddr::V6(_) => Err(Error::MissingAddr),
        }
    }
}
