use crate::describe::describe;
use hopscan_core::{IcmpPacketType, ProbeEvent, TransmitEvent};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Format a hop discovery event.
///
/// The `ICMP` type and code of replies are included if `detail` is set.
pub fn probe_line(event: &ProbeEvent, detail: bool) -> String {
    match event {
        ProbeEvent::Reply(hop) => {
            reply_line(hop.ttl.0, hop.addr, hop.rtt, hop.packet_type, None, detail)
        }
        ProbeEvent::Timeout { .. } => String::from("Request timed out"),
        ProbeEvent::NoReply { ttl } => format!("{}: *", ttl.0),
    }
}

/// Format a sustained send event.
///
/// Sends are only reported if `detail` is set.
pub fn transmit_line(event: &TransmitEvent, detail: bool) -> Option<String> {
    match event {
        TransmitEvent::Sent { sequence, ttl } => {
            detail.then(|| format!("sent seq = {}, ttl = {}", sequence.0, ttl.0))
        }
        TransmitEvent::Reply(reply) => Some(reply_line(
            reply.ttl.0,
            reply.addr,
            reply.rtt,
            reply.packet_type,
            Some(reply.sequence.0),
            detail,
        )),
    }
}

fn reply_line(
    ttl: u8,
    addr: Ipv4Addr,
    rtt: Duration,
    packet_type: IcmpPacketType,
    sequence: Option<u16>,
    detail: bool,
) -> String {
    let mut line = format!("{ttl}: {addr}");
    if let Some(sequence) = sequence {
        line.push_str(&format!(", seq = {sequence}"));
    }
    line.push_str(&format!(", time = {} ms", rtt.as_millis()));
    if detail {
        let description = describe(packet_type.type_id(), packet_type.code().0);
        line.push_str(&format!(" ({description})"));
    }
    line
}

/// Aggregate statistics for a sustained send run.
#[derive(Debug, Default)]
pub struct Summary {
    sent: u32,
    received: u32,
    min: Option<Duration>,
    max: Option<Duration>,
    total: Duration,
}

impl Summary {
    pub fn record(&mut self, event: &TransmitEvent) {
        match event {
            TransmitEvent::Sent { .. } => self.sent += 1,
            TransmitEvent::Reply(reply) => {
                self.received += 1;
                self.total += reply.rtt;
                self.min = Some(self.min.map_or(reply.rtt, |min| min.min(reply.rtt)));
                self.max = Some(self.max.map_or(reply.rtt, |max| max.max(reply.rtt)));
            }
        }
    }

    /// The percentage of sent packets which were not answered.
    pub fn loss(&self) -> f64 {
        if self.sent == 0 {
            0_f64
        } else {
            f64::from(self.sent.saturating_sub(self.received)) / f64::from(self.sent) * 100_f64
        }
    }

    fn avg(&self) -> Option<Duration> {
        (self.received > 0).then(|| self.total / self.received)
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} packets transmitted, {} received, {:.1}% packet loss",
            self.sent,
            self.received,
            self.loss()
        )?;
        if let (Some(min), Some(avg), Some(max)) = (self.min, self.avg(), self.max) {
            write!(
                f,
                "\nrtt min/avg/max = {:.3}/{:.3}/{:.3} ms",
                millis(min),
                millis(avg),
                millis(max)
            )?;
        }
        Ok(())
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000_f64
}
