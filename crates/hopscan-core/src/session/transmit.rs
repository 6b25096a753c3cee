use self::state::{Action, Event, TransmitState};
use crate::config::TransmitConfig;
use crate::error::{Error, Result};
use crate::net::channel::{Channel, Receiver};
use crate::net::{Network, SocketImpl};
use crate::probe::{IcmpPacketType, Response};
use crate::session::{expiry, runtime, with_receiver, Completion, Timer};
use crate::types::{Sequence, TimeToLive};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// An event published by a `TransmitSession`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmitEvent {
    /// A packet was sent.
    Sent { sequence: Sequence, ttl: TimeToLive },
    /// A packet was answered.
    Reply(TransmitReply),
}

/// The reply to a transmitted packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitReply {
    pub sequence: Sequence,
    pub ttl: TimeToLive,
    pub addr: Ipv4Addr,
    pub rtt: Duration,
    pub packet_type: IcmpPacketType,
}

/// Send a fixed number of packets at a fixed interval and time-to-live.
pub struct TransmitSession {
    config: TransmitConfig,
    channel: Channel<SocketImpl>,
    receiver: Receiver,
    token: CancellationToken,
}

impl TransmitSession {
    pub(crate) const fn new(
        config: TransmitConfig,
        channel: Channel<SocketImpl>,
        receiver: Receiver,
        token: CancellationToken,
    ) -> Self {
        Self {
            config,
            channel,
            receiver,
            token,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TransmitConfig {
        &self.config
    }

    /// Run the session to completion on a new single threaded runtime.
    pub fn run_with<F: FnMut(&TransmitEvent)>(self, func: F) -> Result<Completion> {
        runtime()?.block_on(self.run(func))
    }

    /// Run the session to completion, calling `func` for every event.
    #[instrument(skip_all, level = "trace")]
    pub async fn run<F: FnMut(&TransmitEvent)>(self, func: F) -> Result<Completion> {
        let Self {
            config,
            mut channel,
            receiver,
            token,
        } = self;
        let (config, network, cancel) = (&config, &mut channel, &token);
        with_receiver(receiver, &token, |mut rx| async move {
            drive(config, network, &mut rx, cancel, func).await
        })
        .await
    }
}

async fn drive<N: Network, F: FnMut(&TransmitEvent)>(
    config: &TransmitConfig,
    network: &mut N,
    rx: &mut mpsc::Receiver<Response>,
    token: &CancellationToken,
    mut func: F,
) -> Result<Completion> {
    tracing::debug!(?config);
    let mut state = TransmitState::new(config);
    let mut timer: Timer = None;
    let mut event = Event::Start;
    loop {
        for action in state.handle(event, Instant::now()) {
            match action {
                Action::Send(probe) => match network.send_probe(&probe) {
                    Ok(()) => {}
                    Err(Error::ProbeFailed(err)) => {
                        tracing::warn!(%err, sequence = probe.sequence.0, "packet failed");
                    }
                    Err(err) => return Err(err),
                },
                Action::ArmTimer { epoch, deadline } => timer = Some((epoch, deadline)),
                Action::CancelTimer => timer = None,
                Action::Emit(ev) => func(&ev),
                Action::Finish(completion) => return Ok(completion),
            }
        }
        event = tokio::select! {
            biased;
            () = token.cancelled() => return Ok(Completion::Cancelled),
            resp = rx.recv() => Event::Response(resp.ok_or(Error::ChannelClosed)?),
            epoch = expiry(timer) => Event::Timeout(epoch),
        };
    }
}

mod state {
    use super::{TransmitEvent, TransmitReply};
    use crate::config::{Protocol, TransmitConfig};
    use crate::matching;
    use crate::probe::{Probe, ProbeKey, Response};
    use crate::session::{Completion, Epoch};
    use crate::types::{Port, Sequence, TraceId};
    use indexmap::IndexMap;
    use tokio::time::Instant;

    /// The maximum number of unanswered packets tracked.
    pub const MAX_OUTSTANDING: usize = 1024;

    #[derive(Debug)]
    pub enum Event {
        Start,
        Response(Response),
        Timeout(Epoch),
    }

    #[derive(Debug, PartialEq, Eq)]
    pub enum Action {
        Send(Probe),
        ArmTimer { epoch: Epoch, deadline: Instant },
        CancelTimer,
        Emit(TransmitEvent),
        Finish(Completion),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Idle,
        /// Sending, with the deadline of the next send.
        Sending { remaining: u32, deadline: Instant },
        /// Every packet has been sent.
        Draining,
        Complete,
    }

    /// Sustained send state.
    ///
    /// The timer drives the send cadence while sending and the linger
    /// deadline while draining. Replies may match any outstanding packet.
    #[derive(Debug)]
    pub struct TransmitState {
        config: TransmitConfig,
        phase: Phase,
        epoch: Epoch,
        sequence: Sequence,
        outstanding: IndexMap<ProbeKey, Probe>,
    }

    impl TransmitState {
        pub fn new(config: &TransmitConfig) -> Self {
            Self {
                config: config.clone(),
                phase: Phase::Idle,
                epoch: Epoch::default(),
                sequence: Sequence(1),
                outstanding: IndexMap::new(),
            }
        }

        pub fn handle(&mut self, event: Event, now: Instant) -> Vec<Action> {
            match event {
                Event::Start => self.on_start(now),
                Event::Response(resp) => self.on_response(&resp),
                Event::Timeout(epoch) => self.on_timeout(epoch, now),
            }
        }

        fn on_start(&mut self, now: Instant) -> Vec<Action> {
            if self.phase != Phase::Idle {
                return vec![];
            }
            let deadline = now + self.config.interval;
            self.phase = Phase::Sending {
                remaining: self.config.packets,
                deadline,
            };
            vec![self.arm(deadline)]
        }

        fn on_timeout(&mut self, epoch: Epoch, now: Instant) -> Vec<Action> {
            if epoch != self.epoch {
                tracing::trace!(?epoch, "ignoring stale timer");
                return vec![];
            }
            match self.phase {
                Phase::Sending {
                    remaining,
                    deadline,
                } => self.on_send_timer(remaining, deadline, now),
                Phase::Draining => {
                    tracing::debug!(outstanding = self.outstanding.len(), "linger elapsed");
                    vec![self.finish()]
                }
                Phase::Idle | Phase::Complete => vec![],
            }
        }

        fn on_send_timer(&mut self, remaining: u32, deadline: Instant, now: Instant) -> Vec<Action> {
            let probe = self.next_probe(now);
            let mut actions = vec![
                Action::Send(probe.clone()),
                Action::Emit(TransmitEvent::Sent {
                    sequence: probe.sequence,
                    ttl: probe.ttl,
                }),
            ];
            self.track(probe);
            let remaining = remaining.saturating_sub(1);
            if remaining > 0 {
                let deadline = deadline + self.config.interval;
                self.phase = Phase::Sending {
                    remaining,
                    deadline,
                };
                actions.push(self.arm(deadline));
            } else {
                self.phase = Phase::Draining;
                match self.config.linger {
                    Some(linger) => actions.push(self.arm(now + linger)),
                    None => {
                        self.epoch = self.epoch.next();
                        actions.push(Action::CancelTimer);
                    }
                }
            }
            actions
        }

        fn on_response(&mut self, resp: &Response) -> Vec<Action> {
            if !matches!(self.phase, Phase::Sending { .. } | Phase::Draining)
                || !matching::accepts(self.config.protocol, resp)
            {
                return vec![];
            }
            let data = resp.data();
            let Some(probe) = self.outstanding.shift_remove(&data.key()) else {
                tracing::debug!(?resp, "discarding unmatched response");
                return vec![];
            };
            let mut actions = vec![Action::Emit(TransmitEvent::Reply(TransmitReply {
                sequence: probe.sequence,
                ttl: probe.ttl,
                addr: data.addr,
                rtt: data.recv.saturating_duration_since(probe.sent),
                packet_type: resp.packet_type(),
            }))];
            if self.phase == Phase::Draining && self.outstanding.is_empty() {
                actions.push(self.finish());
            }
            actions
        }

        fn arm(&mut self, deadline: Instant) -> Action {
            self.epoch = self.epoch.next();
            Action::ArmTimer {
                epoch: self.epoch,
                deadline,
            }
        }

        fn finish(&mut self) -> Action {
            self.phase = Phase::Complete;
            Action::Finish(Completion::Finished)
        }

        /// Record a sent packet, evicting the oldest if the table is full.
        fn track(&mut self, probe: Probe) {
            if self.outstanding.len() >= MAX_OUTSTANDING {
                if let Some((_, evicted)) = self.outstanding.shift_remove_index(0) {
                    tracing::debug!(sequence = evicted.sequence.0, "evicting unanswered packet");
                }
            }
            self.outstanding.insert(probe.key(), probe);
        }

        fn next_probe(&mut self, now: Instant) -> Probe {
            let (identifier, src_port, dest_port) = match self.config.protocol {
                Protocol::Icmp => (self.config.identifier, Port(0), Port(0)),
                Protocol::Udp => (TraceId(0), self.config.src_port, self.config.dest_port),
            };
            let probe = Probe::new(
                self.sequence,
                identifier,
                src_port,
                dest_port,
                self.config.ttl,
                1,
                now,
            );
            self.sequence = self.sequence.next_nonzero();
            probe
        }
    }

}
