use crate::error::{IoError, IoOperation, IoResult, Result};
use crate::net::platform::Ipv4ByteOrder;
use crate::net::socket::Socket;
use hopscan_packet::fmt_payload;
use socket2::{Domain, Protocol, SockAddr, Type};
use std::io::Read;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::unix::AsyncFd;
use tracing::instrument;

/// A network socket.
pub struct SocketImpl {
    inner: socket2::Socket,
}

impl SocketImpl {
    fn new(ty: Type, protocol: Protocol) -> IoResult<Self> {
        Ok(Self {
            inner: socket2::Socket::new(Domain::IPV4, ty, Some(protocol))
                .map_err(|err| IoError::Other(err, IoOperation::NewSocket))?,
        })
    }

    fn set_nonblocking(&self, nonblocking: bool) -> IoResult<()> {
        self.inner
            .set_nonblocking(nonblocking)
            .map_err(|err| IoError::Other(err, IoOperation::SetNonBlocking))
    }

    fn set_header_included(&self, included: bool) -> IoResult<()> {
        self.inner
            .set_header_included_v4(included)
            .map_err(|err| IoError::Other(err, IoOperation::SetHeaderIncluded))
    }
}

impl Socket for SocketImpl {
    #[instrument(level = "trace")]
    fn new_raw_send_socket_ipv4() -> IoResult<Self> {
        let socket = Self::new(Type::RAW, Protocol::from(nix::libc::IPPROTO_RAW))?;
        socket.set_nonblocking(true)?;
        socket.set_header_included(true)?;
        Ok(socket)
    }
    #[instrument(level = "trace")]
    fn new_udp_dgram_socket_ipv4() -> IoResult<Self> {
        Self::new(Type::DGRAM, Protocol::UDP)
    }
    #[instrument(skip(self), level = "trace")]
    fn connect(&mut self, address: SocketAddr) -> IoResult<()> {
        tracing::trace!(?address);
        self.inner
            .connect(&SockAddr::from(address))
            .map_err(|err| IoError::Connect(err, address))
    }
    #[instrument(skip(self), ret, level = "trace")]
    fn local_addr(&mut self) -> IoResult<Option<SocketAddr>> {
        Ok(self
            .inner
            .local_addr()
            .map_err(|err| IoError::Other(err, IoOperation::LocalAddr))?
            .as_socket())
    }
    #[instrument(skip(self, buf), level = "trace")]
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> IoResult<()> {
        tracing::trace!(buf = fmt_payload(buf), ?addr);
        self.inner
            .send_to(buf, &SockAddr::from(addr))
            .map_err(|err| IoError::SendTo(err, addr))?;
        Ok(())
    }
}

/// The length of the datagram sent to discover the byte order.
#[cfg(not(target_os = "linux"))]
const TEST_PACKET_LENGTH: u16 = 256;

/// Linux accepts `total_length` in either byte order.
#[cfg(target_os = "linux")]
#[expect(clippy::unnecessary_wraps)]
pub const fn byte_order_for_address(_addr: Ipv4Addr) -> Result<Ipv4ByteOrder> {
    Ok(Ipv4ByteOrder::Network)
}

#[cfg(not(target_os = "linux"))]
#[instrument(ret, level = "trace")]
pub fn byte_order_for_address(addr: Ipv4Addr) -> Result<Ipv4ByteOrder> {
    use crate::error::{Error, ErrorKind};
    match send_local_test_packet(addr, TEST_PACKET_LENGTH) {
        Ok(()) => Ok(Ipv4ByteOrder::Network),
        Err(Error::IoError(io)) if io.kind() == ErrorKind::Std(std::io::ErrorKind::InvalidInput) => {
            send_local_test_packet(addr, TEST_PACKET_LENGTH.swap_bytes())?;
            Ok(Ipv4ByteOrder::Host)
        }
        Err(err) => Err(err),
    }
}

/// Send an `ICMP` echo request to localhost with the given `total_length`.
///
/// The datagram is always `TEST_PACKET_LENGTH` bytes long, so the kernel
/// rejects it if it reads `total_length` in the other byte order.
#[cfg(not(target_os = "linux"))]
#[instrument(ret, level = "trace")]
fn send_local_test_packet(src_addr: Ipv4Addr, total_length: u16) -> Result<()> {
    use hopscan_packet::checksum::checksum;
    use hopscan_packet::icmpv4::{IcmpCode, IcmpPacket, IcmpType};
    use hopscan_packet::ipv4::Ipv4Packet;
    use hopscan_packet::IpProtocol;
    let mut buf = [0_u8; TEST_PACKET_LENGTH as usize];
    let (header_buf, icmp_buf) = buf.split_at_mut(Ipv4Packet::minimum_packet_size());
    let mut icmp = IcmpPacket::new(icmp_buf)?;
    icmp.set_icmp_type(IcmpType::EchoRequest);
    icmp.set_icmp_code(IcmpCode(0));
    icmp.set_checksum(checksum(icmp.packet()));
    let mut ipv4 = Ipv4Packet::new(header_buf)?;
    ipv4.set_version(4);
    ipv4.set_header_length(5);
    ipv4.set_total_length(total_length);
    ipv4.set_ttl(u8::MAX);
    ipv4.set_protocol(IpProtocol::Icmp);
    ipv4.set_source(src_addr);
    ipv4.set_destination(Ipv4Addr::LOCALHOST);
    let mut socket = SocketImpl::new_raw_send_socket_ipv4()?;
    socket.send_to(&buf, SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))?;
    Ok(())
}

/// A raw `ICMPv4` socket for receiving responses.
///
/// The socket is opened eagerly, so that elevated privileges can be dropped
/// before any session runs, and is registered with the tokio reactor later
/// from within the runtime.
pub struct RecvSocketImpl {
    inner: socket2::Socket,
}

impl RecvSocketImpl {
    #[instrument(level = "trace")]
    pub fn new_icmp_recv_socket_ipv4() -> IoResult<Self> {
        let inner = socket2::Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
            .map_err(|err| IoError::Other(err, IoOperation::NewSocket))?;
        inner
            .set_nonblocking(true)
            .map_err(|err| IoError::Other(err, IoOperation::SetNonBlocking))?;
        Ok(Self { inner })
    }

    /// Register the socket with the reactor of the current runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(self) -> IoResult<AsyncRecvSocket> {
        Ok(AsyncRecvSocket {
            inner: AsyncFd::new(self.inner)
                .map_err(|err| IoError::Other(err, IoOperation::Register))?,
        })
    }
}

/// A receive socket registered with the tokio reactor.
pub struct AsyncRecvSocket {
    inner: AsyncFd<socket2::Socket>,
}

impl AsyncRecvSocket {
    /// Read the next `IPv4` datagram, including its header.
    pub async fn recv(&self, buf: &mut [u8]) -> IoResult<usize> {
        loop {
            let mut guard = self
                .inner
                .readable()
                .await
                .map_err(|err| IoError::Other(err, IoOperation::Readable))?;
            match guard.try_io(|inner| inner.get_ref().read(buf)) {
                Ok(result) => return result.map_err(|err| IoError::Other(err, IoOperation::Read)),
                Err(_would_block) => continue,
            }
        }
    }
}
