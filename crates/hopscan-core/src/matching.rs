//! Correlation of received responses with sent probes.
use crate::config::Protocol;
use crate::probe::{Probe, Response};

/// Does the response type answer a probe of this protocol?
///
/// An echo reply only answers an `ICMP` probe. Time exceeded and
/// destination unreachable answer both.
#[must_use]
pub fn accepts(protocol: Protocol, response: &Response) -> bool {
    match response {
        Response::EchoReply(..) => protocol == Protocol::Icmp,
        Response::TimeExceeded(..) | Response::DestinationUnreachable(..) => true,
    }
}

/// Is the response an answer to `probe`?
#[must_use]
pub fn is_match(protocol: Protocol, probe: &Probe, response: &Response) -> bool {
    accepts(protocol, response) && response.data().key() == probe.key()
}
