use crate::config::Protocol;
use crate::error::{Error, Result};
use crate::net::channel::MAX_PACKET_SIZE;
use crate::net::platform::Ipv4ByteOrder;
use crate::net::socket::Socket;
use crate::probe::{
    IcmpPacketCode, IcmpProtocolResponse, Probe, ProtocolResponse, Response, ResponseData,
    UdpProtocolResponse,
};
use crate::types::{Port, TimeToLive};
use hopscan_packet::checksum::{checksum, udp_ipv4_checksum};
use hopscan_packet::icmpv4::{IcmpCode, IcmpPacket, IcmpType};
use hopscan_packet::ipv4::Ipv4Packet;
use hopscan_packet::udp::UdpPacket;
use hopscan_packet::IpProtocol;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::time::Instant;
use tracing::instrument;

/// `IPv4` packet configuration.
#[derive(Debug)]
pub struct Ipv4 {
    pub src_addr: Ipv4Addr,
    pub dest_addr: Ipv4Addr,
    /// The bytes which follow the `ICMP` or `UDP` header of every packet.
    pub payload: Vec<u8>,
    pub byte_order: Ipv4ByteOrder,
}

/// The don't fragment flag with a zero fragment offset.
const DONT_FRAGMENT: u16 = 0x4000;

impl Ipv4 {
    /// Dispatch an `ICMP` echo request probe.
    #[instrument(skip(self, send_socket), level = "trace")]
    pub fn dispatch_icmp_probe<S: Socket>(&self, send_socket: &mut S, probe: &Probe) -> Result<()> {
        let packet = self.make_icmp_packet(probe)?;
        self.send(send_socket, &packet, probe.dest_port)
    }

    /// Dispatch a `UDP` probe.
    #[instrument(skip(self, send_socket), level = "trace")]
    pub fn dispatch_udp_probe<S: Socket>(&self, send_socket: &mut S, probe: &Probe) -> Result<()> {
        let packet = self.make_udp_packet(probe)?;
        self.send(send_socket, &packet, probe.dest_port)
    }

    fn send<S: Socket>(&self, send_socket: &mut S, packet: &[u8], port: Port) -> Result<()> {
        let remote_addr = SocketAddr::new(IpAddr::V4(self.dest_addr), port.0);
        send_socket
            .send_to(packet, remote_addr)
            .map_err(Error::ProbeFailed)
    }

    /// Build an `IPv4` datagram holding an `ICMP` echo request.
    fn make_icmp_packet(&self, probe: &Probe) -> Result<Vec<u8>> {
        let mut buf = self.alloc(IcmpPacket::minimum_packet_size())?;
        let total_length = buf.len() as u16;
        let (header_buf, icmp_buf) = buf.split_at_mut(Ipv4Packet::minimum_packet_size());
        let mut icmp = IcmpPacket::new(icmp_buf)?;
        icmp.set_icmp_type(IcmpType::EchoRequest);
        icmp.set_icmp_code(IcmpCode(0));
        icmp.set_identifier(probe.identifier.0);
        icmp.set_sequence(probe.sequence.0);
        icmp.set_payload(&self.payload);
        icmp.set_checksum(checksum(icmp.packet()));
        self.write_ipv4_header(header_buf, IpProtocol::Icmp, probe.ttl, 0, total_length)?;
        Ok(buf)
    }

    /// Build an `IPv4` datagram holding a `UDP` probe.
    ///
    /// The probe sequence is carried in the `IPv4` identification field.
    fn make_udp_packet(&self, probe: &Probe) -> Result<Vec<u8>> {
        let mut buf = self.alloc(UdpPacket::minimum_packet_size())?;
        let total_length = buf.len() as u16;
        let (header_buf, udp_buf) = buf.split_at_mut(Ipv4Packet::minimum_packet_size());
        let udp_len = udp_buf.len() as u16;
        let mut udp = UdpPacket::new(udp_buf)?;
        udp.set_source(probe.src_port.0);
        udp.set_destination(probe.dest_port.0);
        udp.set_length(udp_len);
        udp.set_payload(&self.payload);
        udp.set_checksum(udp_ipv4_checksum(
            udp.packet(),
            self.src_addr,
            self.dest_addr,
        ));
        self.write_ipv4_header(
            header_buf,
            IpProtocol::Udp,
            probe.ttl,
            probe.sequence.0,
            total_length,
        )?;
        Ok(buf)
    }

    fn alloc(&self, transport_header_len: usize) -> Result<Vec<u8>> {
        let len = Ipv4Packet::minimum_packet_size() + transport_header_len + self.payload.len();
        if len > MAX_PACKET_SIZE {
            return Err(Error::BadConfig(format!(
                "packet size {len} exceeds {MAX_PACKET_SIZE}"
            )));
        }
        Ok(vec![0_u8; len])
    }

    /// Write a 20 byte header, without options, with a valid checksum.
    ///
    /// `total_length` and the flags word are written in the platform byte order.
    fn write_ipv4_header(
        &self,
        header_buf: &mut [u8],
        protocol: IpProtocol,
        ttl: TimeToLive,
        identification: u16,
        total_length: u16,
    ) -> Result<()> {
        let mut ipv4 = Ipv4Packet::new(header_buf)?;
        ipv4.set_version(4);
        ipv4.set_header_length(5);
        ipv4.set_total_length(self.byte_order.adjust(total_length));
        ipv4.set_identification(identification);
        ipv4.set_flags_and_fragment_offset(self.byte_order.adjust(DONT_FRAGMENT));
        ipv4.set_ttl(ttl.0);
        ipv4.set_protocol(protocol);
        ipv4.set_source(self.src_addr);
        ipv4.set_destination(self.dest_addr);
        ipv4.set_checksum(checksum(ipv4.header()));
        Ok(())
    }
}

/// Extract a `Response` from a received `IPv4` datagram.
///
/// Returns `None` for well formed datagrams which cannot answer a probe of
/// `protocol`, and an error for malformed ones.
#[instrument(skip(buf), level = "trace")]
pub fn extract_response(
    protocol: Protocol,
    buf: &[u8],
    recv: Instant,
) -> Result<Option<Response>> {
    let ipv4 = Ipv4Packet::new_view(buf)?;
    if ipv4.get_protocol() != IpProtocol::Icmp {
        return Ok(None);
    }
    let src = ipv4.get_source();
    let icmp = IcmpPacket::new_view(ipv4.payload())?;
    let code = IcmpPacketCode(icmp.get_icmp_code().0);
    Ok(match icmp.get_icmp_type() {
        IcmpType::EchoReply => match protocol {
            Protocol::Icmp => {
                let proto_resp = ProtocolResponse::Icmp(IcmpProtocolResponse::new(
                    icmp.get_identifier(),
                    icmp.get_sequence(),
                ));
                Some(Response::EchoReply(
                    ResponseData::new(recv, src, proto_resp),
                    code,
                ))
            }
            Protocol::Udp => None,
        },
        IcmpType::TimeExceeded => extract_quoted(protocol, &icmp)?.map(|proto_resp| {
            Response::TimeExceeded(ResponseData::new(recv, src, proto_resp), code)
        }),
        IcmpType::DestinationUnreachable => extract_quoted(protocol, &icmp)?.map(|proto_resp| {
            Response::DestinationUnreachable(ResponseData::new(recv, src, proto_resp), code)
        }),
        IcmpType::EchoRequest | IcmpType::Other(_) => None,
    })
}

/// Extract the probe fields from the datagram quoted by an `ICMP` error.
fn extract_quoted(
    protocol: Protocol,
    icmp: &IcmpPacket<'_>,
) -> Result<Option<ProtocolResponse>> {
    let Some(quoted) = icmp.quoted() else {
        return Ok(None);
    };
    let nested = Ipv4Packet::new_view(quoted)?;
    Ok(match (protocol, nested.get_protocol()) {
        (Protocol::Icmp, IpProtocol::Icmp) => {
            let echo_request = IcmpPacket::new_view(nested.payload())?;
            (echo_request.get_icmp_type() == IcmpType::EchoRequest).then(|| {
                ProtocolResponse::Icmp(IcmpProtocolResponse::new(
                    echo_request.get_identifier(),
                    echo_request.get_sequence(),
                ))
            })
        }
        (Protocol::Udp, IpProtocol::Udp) => {
            let udp = UdpPacket::new_view(nested.payload())?;
            Some(ProtocolResponse::Udp(UdpProtocolResponse::new(
                nested.get_identification(),
                udp.get_source(),
                udp.get_destination(),
            )))
        }
        _ => None,
    })
}
