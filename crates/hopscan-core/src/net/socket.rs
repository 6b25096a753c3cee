use crate::error::IoResult as Result;
use std::net::SocketAddr;

#[cfg_attr(test, mockall::automock)]
pub trait Socket
where
    Self: Sized,
{
    /// Create a raw `IPv4` socket for sending packets with a caller built `IPv4` header.
    fn new_raw_send_socket_ipv4() -> Result<Self>;
    /// Create (non-raw) IPv4/UDP socket for local address discovery.
    fn new_udp_dgram_socket_ipv4() -> Result<Self>;
    fn connect(&mut self, address: SocketAddr) -> Result<()>;
    fn local_addr(&mut self) -> Result<Option<SocketAddr>>;
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> Result<()>;
}
