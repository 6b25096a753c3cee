use self::state::{Action, Event, ProbeState};
use crate::config::ProbeConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::net::channel::{Channel, Receiver};
use crate::net::{Network, SocketImpl};
use crate::probe::{IcmpPacketType, Probe, Response};
use crate::session::{expiry, runtime, with_receiver, Completion, Timer};
use crate::types::TimeToLive;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// An event published by a `ProbeSession`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    /// A probe was answered.
    Reply(HopReply),
    /// A probe was not answered within the timeout.
    Timeout { ttl: TimeToLive, attempt: u8 },
    /// Every attempt at `ttl` timed out.
    NoReply { ttl: TimeToLive },
}

/// The reply to a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopReply {
    /// The time-to-live of the probe.
    pub ttl: TimeToLive,
    /// The address which replied.
    pub addr: Ipv4Addr,
    /// The round trip time.
    pub rtt: Duration,
    /// The type of `ICMP` packet received.
    pub packet_type: IcmpPacketType,
    /// Which attempt at this `ttl` was answered.
    pub attempt: u8,
}

/// Discover the hops to a target.
///
/// Probes are sent one at a time with an increasing time-to-live. Each probe
/// is resent up to `max_attempts` times before the session moves on to the
/// next time-to-live. The session ends when the target replies, when
/// `max_ttl` has been resolved or when it is cancelled.
pub struct ProbeSession {
    config: ProbeConfig,
    channel: Channel<SocketImpl>,
    receiver: Receiver,
    token: CancellationToken,
}

impl ProbeSession {
    pub(crate) const fn new(
        config: ProbeConfig,
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
    pub const fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run the session to completion on a new single threaded runtime.
    pub fn run_with<F: FnMut(&ProbeEvent)>(self, func: F) -> Result<Completion> {
        runtime()?.block_on(self.run(func))
    }

    /// Run the session to completion, calling `func` for every event.
    #[instrument(skip_all, level = "trace")]
    pub async fn run<F: FnMut(&ProbeEvent)>(self, func: F) -> Result<Completion> {
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

/// Drive the probe state machine.
///
/// All sends happen on this task. Responses arrive on `rx` and timeouts are
/// tracked by a single timer owned by this task.
async fn drive<N: Network, F: FnMut(&ProbeEvent)>(
    config: &ProbeConfig,
    network: &mut N,
    rx: &mut mpsc::Receiver<Response>,
    token: &CancellationToken,
    mut func: F,
) -> Result<Completion> {
    tracing::debug!(?config);
    let mut state = ProbeState::new(config);
    let mut timer: Timer = None;
    let mut event = Event::Start;
    loop {
        for action in state.handle(event, Instant::now()) {
            match action {
                Action::Send(probe) => send(network, &probe)?,
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

/// Send a probe.
///
/// A failed send is not fatal, the probe will time out and be retried.
fn send<N: Network>(network: &mut N, probe: &Probe) -> Result<()> {
    match network.send_probe(probe) {
        Ok(()) => Ok(()),
        Err(Error::ProbeFailed(err)) => {
            match err.kind() {
                ErrorKind::HostUnreachable | ErrorKind::NetUnreachable => {
                    tracing::debug!(%err, ttl = probe.ttl.0, "probe unreachable");
                }
                ErrorKind::Std(_) => tracing::warn!(%err, ttl = probe.ttl.0, "probe failed"),
            }
            Ok(())
        }
        Err(err) => Err(err),
    }
}

mod state {
    use super::{HopReply, ProbeEvent};
    use crate::config::{ProbeConfig, Protocol};
    use crate::matching;
    use crate::probe::{Probe, Response};
    use crate::session::{Completion, Epoch};
    use crate::types::{Port, Sequence, TimeToLive, TraceId};
    use tokio::time::Instant;

    /// An input to the state machine.
    #[derive(Debug)]
    pub enum Event {
        Start,
        Response(Response),
        Timeout(Epoch),
    }

    /// An effect requested by the state machine.
    #[derive(Debug, PartialEq, Eq)]
    pub enum Action {
        Send(Probe),
        ArmTimer { epoch: Epoch, deadline: Instant },
        CancelTimer,
        Emit(ProbeEvent),
        Finish(Completion),
    }

    #[derive(Debug)]
    enum Phase {
        Idle,
        AwaitingReply(Probe),
        Complete,
    }

    /// Hop discovery state.
    ///
    /// At most one probe is outstanding. The epoch advances whenever the
    /// outstanding probe is sent, matched or timed out so that a timer armed
    /// for an earlier probe is ignored.
    #[derive(Debug)]
    pub struct ProbeState {
        config: ProbeConfig,
        phase: Phase,
        ttl: TimeToLive,
        attempt: u8,
        epoch: Epoch,
        /// The next `UDP` destination port.
        dest_port: Port,
        /// The next `UDP` sequence.
        sequence: Sequence,
    }

    impl ProbeState {
        pub fn new(config: &ProbeConfig) -> Self {
            Self {
                config: config.clone(),
                phase: Phase::Idle,
                ttl: config.first_ttl,
                attempt: 1,
                epoch: Epoch::default(),
                dest_port: config.initial_dest_port,
                sequence: Sequence(1),
            }
        }

        pub fn handle(&mut self, event: Event, now: Instant) -> Vec<Action> {
            match event {
                Event::Start => self.on_start(now),
                Event::Response(resp) => self.on_response(&resp, now),
                Event::Timeout(epoch) => self.on_timeout(epoch, now),
            }
        }

        fn on_start(&mut self, now: Instant) -> Vec<Action> {
            match self.phase {
                Phase::Idle => self.send(now),
                Phase::AwaitingReply(_) | Phase::Complete => vec![],
            }
        }

        fn on_response(&mut self, resp: &Response, now: Instant) -> Vec<Action> {
            let Phase::AwaitingReply(probe) = &self.phase else {
                return vec![];
            };
            if !matching::is_match(self.config.protocol, probe, resp) {
                tracing::debug!(?resp, "discarding unmatched response");
                return vec![];
            }
            let data = resp.data();
            let reply = HopReply {
                ttl: probe.ttl,
                addr: data.addr,
                rtt: data.recv.saturating_duration_since(probe.sent),
                packet_type: resp.packet_type(),
                attempt: probe.attempt,
            };
            let target_reached = data.addr == self.config.target_addr;
            self.epoch = self.epoch.next();
            self.attempt = 1;
            let mut actions = vec![Action::CancelTimer, Action::Emit(ProbeEvent::Reply(reply))];
            if target_reached {
                actions.push(self.finish(Completion::TargetReached));
            } else {
                actions.extend(self.advance(now));
            }
            actions
        }

        fn on_timeout(&mut self, epoch: Epoch, now: Instant) -> Vec<Action> {
            if epoch != self.epoch || !matches!(self.phase, Phase::AwaitingReply(_)) {
                tracing::trace!(?epoch, "ignoring stale timer");
                return vec![];
            }
            tracing::debug!(ttl = self.ttl.0, attempt = self.attempt, "probe timed out");
            self.epoch = self.epoch.next();
            let mut actions = vec![Action::Emit(ProbeEvent::Timeout {
                ttl: self.ttl,
                attempt: self.attempt,
            })];
            if self.attempt < self.config.max_attempts {
                self.attempt += 1;
                actions.extend(self.send(now));
            } else {
                self.attempt = 1;
                actions.push(Action::Emit(ProbeEvent::NoReply { ttl: self.ttl }));
                actions.extend(self.advance(now));
            }
            actions
        }

        /// Move to the next time-to-live, or finish if `max_ttl` is resolved.
        fn advance(&mut self, now: Instant) -> Vec<Action> {
            if self.ttl >= self.config.max_ttl {
                vec![self.finish(Completion::MaxTtlReached)]
            } else {
                self.ttl += TimeToLive(1);
                self.send(now)
            }
        }

        fn finish(&mut self, completion: Completion) -> Action {
            self.phase = Phase::Complete;
            Action::Finish(completion)
        }

        fn send(&mut self, now: Instant) -> Vec<Action> {
            let probe = self.next_probe(now);
            self.epoch = self.epoch.next();
            self.phase = Phase::AwaitingReply(probe.clone());
            vec![
                Action::Send(probe),
                Action::ArmTimer {
                    epoch: self.epoch,
                    deadline: now + self.config.timeout,
                },
            ]
        }

        fn next_probe(&mut self, now: Instant) -> Probe {
            match self.config.protocol {
                Protocol::Icmp => Probe::new(
                    Sequence(rand::random()),
                    TraceId(rand::random()),
                    Port(0),
                    Port(0),
                    self.ttl,
                    self.attempt,
                    now,
                ),
                Protocol::Udp => {
                    let probe = Probe::new(
                        self.sequence,
                        TraceId(0),
                        self.config.src_port,
                        self.dest_port,
                        self.ttl,
                        self.attempt,
                        now,
                    );
                    self.sequence = self.sequence.next_nonzero();
                    self.dest_port = self.dest_port.next_or(self.config.initial_dest_port);
                    probe
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::probe::{
            IcmpPacketCode, IcmpPacketType, IcmpProtocolResponse, ProtocolResponse, ResponseData,
            UdpProtocolResponse,
        };
        use std::net::Ipv4Addr;
        use std::time::Duration;

        const TARGET: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 1);
        const ROUTER: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 1);

        fn config(protocol: Protocol) -> ProbeConfig {
            ProbeConfig {
                target_addr: TARGET,
                protocol,
                ..Default::default()
            }
        }

        fn sent_probe(actions: &[Action]) -> Probe {
            actions
                .iter()
                .find_map(|action| match action {
                    Action::Send(probe) => Some(probe.clone()),
                    _ => None,
                })
                .unwrap()
        }

        fn armed_epoch(actions: &[Action]) -> Epoch {
            actions
                .iter()
                .find_map(|action| match action {
                    Action::ArmTimer { epoch, .. } => Some(*epoch),
                    _ => None,
                })
                .unwrap()
        }

        fn time_exceeded(addr: Ipv4Addr, identifier: u16, sequence: u16, recv: Instant) -> Response {
            Response::TimeExceeded(
                ResponseData::new(
                    recv,
                    addr,
                    ProtocolResponse::Icmp(IcmpProtocolResponse::new(identifier, sequence)),
                ),
                IcmpPacketCode(0),
            )
        }

        #[test]
        fn test_icmp_match_by_identifier_and_sequence() {
            let now = Instant::now();
            let mut state = ProbeState::new(&config(Protocol::Icmp));
            let actions = state.handle(Event::Start, now);
            let probe = sent_probe(&actions);
            assert_eq!(TimeToLive(1), probe.ttl);
            assert_eq!(
                Action::ArmTimer {
                    epoch: armed_epoch(&actions),
                    deadline: now + Duration::from_secs(5)
                },
                actions[1]
            );

            let wrong_sequence = time_exceeded(
                ROUTER,
                probe.identifier.0,
                probe.sequence.0.wrapping_add(1),
                now,
            );
            assert!(state.handle(Event::Response(wrong_sequence), now).is_empty());
            let wrong_identifier = time_exceeded(
                ROUTER,
                probe.identifier.0.wrapping_add(1),
                probe.sequence.0,
                now,
            );
            assert!(state.handle(Event::Response(wrong_identifier), now).is_empty());

            let recv = now + Duration::from_millis(12);
            let matching = time_exceeded(ROUTER, probe.identifier.0, probe.sequence.0, recv);
            let actions = state.handle(Event::Response(matching), recv);
            assert_eq!(Action::CancelTimer, actions[0]);
            assert_eq!(
                Action::Emit(ProbeEvent::Reply(HopReply {
                    ttl: TimeToLive(1),
                    addr: ROUTER,
                    rtt: Duration::from_millis(12),
                    packet_type: IcmpPacketType::TimeExceeded(IcmpPacketCode(0)),
                    attempt: 1,
                })),
                actions[1]
            );
            assert_eq!(TimeToLive(2), sent_probe(&actions).ttl);
        }

        #[test]
        fn test_udp_dest_port_restarts_from_initial() {
            let mut now = Instant::now();
            let mut state = ProbeState::new(&ProbeConfig {
                initial_dest_port: Port(u16::MAX - 1),
                max_attempts: 4,
                ..config(Protocol::Udp)
            });
            let mut actions = state.handle(Event::Start, now);
            let mut ports = vec![sent_probe(&actions).dest_port];
            for _ in 0..3 {
                now += Duration::from_secs(5);
                actions = state.handle(Event::Timeout(armed_epoch(&actions)), now);
                ports.push(sent_probe(&actions).dest_port);
            }
            assert_eq!(
                vec![
                    Port(u16::MAX - 1),
                    Port(u16::MAX),
                    Port(u16::MAX - 1),
                    Port(u16::MAX)
                ],
                ports
            );
        }

        #[test]
        fn test_duplicate_reply_ignored() {
            let now = Instant::now();
            let mut state = ProbeState::new(&config(Protocol::Icmp));
            let probe = sent_probe(&state.handle(Event::Start, now));
            let reply = time_exceeded(ROUTER, probe.identifier.0, probe.sequence.0, now);
            assert!(!state.handle(Event::Response(reply.clone()), now).is_empty());
            assert!(state.handle(Event::Response(reply), now).is_empty());
        }

        #[test]
        fn test_stale_timer_is_noop() {
            let now = Instant::now();
            let mut state = ProbeState::new(&config(Protocol::Icmp));
            let actions = state.handle(Event::Start, now);
            let probe = sent_probe(&actions);
            let stale = armed_epoch(&actions);
            let reply = time_exceeded(ROUTER, probe.identifier.0, probe.sequence.0, now);
            state.handle(Event::Response(reply), now);
            assert!(state.handle(Event::Timeout(stale), now).is_empty());
        }

        #[test]
        fn test_retry_at_same_ttl_then_advance() {
            let mut now = Instant::now();
            let mut state = ProbeState::new(&config(Protocol::Udp));
            let mut actions = state.handle(Event::Start, now);
            let mut probes = vec![sent_probe(&actions)];
            for attempt in 1..=3 {
                now += Duration::from_secs(5);
                actions = state.handle(Event::Timeout(armed_epoch(&actions)), now);
                assert_eq!(
                    Action::Emit(ProbeEvent::Timeout {
                        ttl: TimeToLive(1),
                        attempt
                    }),
                    actions[0]
                );
                probes.push(sent_probe(&actions));
            }
            assert_eq!(
                Action::Emit(ProbeEvent::NoReply { ttl: TimeToLive(1) }),
                actions[1]
            );
            let ttls = probes.iter().map(|p| p.ttl.0).collect::<Vec<_>>();
            assert_eq!(vec![1, 1, 1, 2], ttls);
            let attempts = probes.iter().map(|p| p.attempt).collect::<Vec<_>>();
            assert_eq!(vec![1, 2, 3, 1], attempts);
            let ports = probes.iter().map(|p| p.dest_port.0).collect::<Vec<_>>();
            assert_eq!(vec![33434, 33435, 33436, 33437], ports);
            let sequences = probes.iter().map(|p| p.sequence.0).collect::<Vec<_>>();
            assert_eq!(vec![1, 2, 3, 4], sequences);
        }

        #[test]
        fn test_udp_late_reply_from_earlier_attempt_ignored() {
            let mut now = Instant::now();
            let mut state = ProbeState::new(&config(Protocol::Udp));
            let actions = state.handle(Event::Start, now);
            let first = sent_probe(&actions);
            now += Duration::from_secs(5);
            let actions = state.handle(Event::Timeout(armed_epoch(&actions)), now);
            let second = sent_probe(&actions);
            let late = |probe: &Probe| {
                Response::TimeExceeded(
                    ResponseData::new(
                        now,
                        ROUTER,
                        ProtocolResponse::Udp(UdpProtocolResponse::new(
                            probe.sequence.0,
                            probe.src_port.0,
                            probe.dest_port.0,
                        )),
                    ),
                    IcmpPacketCode(0),
                )
            };
            assert!(state.handle(Event::Response(late(&first)), now).is_empty());
            let actions = state.handle(Event::Response(late(&second)), now);
            let Action::Emit(ProbeEvent::Reply(reply)) = &actions[1] else {
                panic!("expected reply");
            };
            assert_eq!(2, reply.attempt);
        }

        #[test]
        fn test_target_reached() {
            let now = Instant::now();
            let mut state = ProbeState::new(&config(Protocol::Icmp));
            let probe = sent_probe(&state.handle(Event::Start, now));
            let reply = Response::EchoReply(
                ResponseData::new(
                    now,
                    TARGET,
                    ProtocolResponse::Icmp(IcmpProtocolResponse::new(
                        probe.identifier.0,
                        probe.sequence.0,
                    )),
                ),
                IcmpPacketCode(0),
            );
            let actions = state.handle(Event::Response(reply), now);
            assert_eq!(
                Some(&Action::Finish(Completion::TargetReached)),
                actions.last()
            );
            assert!(state.handle(Event::Start, now).is_empty());
        }

        #[test]
        fn test_max_ttl_reached() {
            let now = Instant::now();
            let mut state = ProbeState::new(&ProbeConfig {
                first_ttl: TimeToLive(5),
                max_ttl: TimeToLive(5),
                max_attempts: 1,
                ..config(Protocol::Icmp)
            });
            let actions = state.handle(Event::Start, now);
            let actions = state.handle(Event::Timeout(armed_epoch(&actions)), now);
            assert_eq!(
                vec![
                    Action::Emit(ProbeEvent::Timeout {
                        ttl: TimeToLive(5),
                        attempt: 1
                    }),
                    Action::Emit(ProbeEvent::NoReply { ttl: TimeToLive(5) }),
                    Action::Finish(Completion::MaxTtlReached),
                ],
                actions
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use crate::error::IoError;
    use crate::net::MockNetwork;
    use crate::probe::{
        IcmpPacketCode, IcmpProtocolResponse, ProtocolResponse, ResponseData, UdpProtocolResponse,
    };
    use std::io;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    const TARGET: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 1);
    const HOPS: [Ipv4Addr; 3] = [
        Ipv4Addr::new(198, 51, 100, 1),
        Ipv4Addr::new(198, 51, 100, 2),
        TARGET,
    ];

    fn config(protocol: Protocol) -> ProbeConfig {
        ProbeConfig {
            target_addr: TARGET,
            protocol,
            ..Default::default()
        }
    }

    /// The response a hop at `addr` would send for `probe`.
    fn response_for(protocol: Protocol, probe: &Probe, addr: Ipv4Addr) -> Response {
        let recv = Instant::now();
        match protocol {
            Protocol::Icmp => {
                let proto_resp = ProtocolResponse::Icmp(IcmpProtocolResponse::new(
                    probe.identifier.0,
                    probe.sequence.0,
                ));
                let data = ResponseData::new(recv, addr, proto_resp);
                if addr == TARGET {
                    Response::EchoReply(data, IcmpPacketCode(0))
                } else {
                    Response::TimeExceeded(data, IcmpPacketCode(0))
                }
            }
            Protocol::Udp => {
                let proto_resp = ProtocolResponse::Udp(UdpProtocolResponse::new(
                    probe.sequence.0,
                    probe.src_port.0,
                    probe.dest_port.0,
                ));
                let data = ResponseData::new(recv, addr, proto_resp);
                if addr == TARGET {
                    Response::DestinationUnreachable(data, IcmpPacketCode(3))
                } else {
                    Response::TimeExceeded(data, IcmpPacketCode(0))
                }
            }
        }
    }

    /// A network where the hop at each ttl replies after `delay`.
    fn network_with_hops(
        protocol: Protocol,
        tx: mpsc::Sender<Response>,
        delay: Duration,
        sent: Arc<Mutex<Vec<Probe>>>,
    ) -> MockNetwork {
        let mut network = MockNetwork::new();
        network.expect_send_probe().returning(move |probe| {
            sent.lock().unwrap().push(probe.clone());
            if let Some(&addr) = HOPS.get(usize::from(probe.ttl.0 - 1)) {
                let probe = probe.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    tx.send(response_for(protocol, &probe, addr)).await
                });
            }
            Ok(())
        });
        network
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_hops_to_target_icmp() -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel(8);
        let sent = Arc::new(Mutex::new(vec![]));
        let delay = Duration::from_millis(10);
        let mut network = network_with_hops(Protocol::Icmp, tx, delay, sent.clone());
        let mut events = vec![];
        let completion = drive(
            &config(Protocol::Icmp),
            &mut network,
            &mut rx,
            &CancellationToken::new(),
            |ev| events.push(ev.clone()),
        )
        .await?;
        assert_eq!(Completion::TargetReached, completion);
        let replies = events
            .iter()
            .map(|ev| match ev {
                ProbeEvent::Reply(hop) => (hop.ttl.0, hop.addr, hop.rtt),
                other => panic!("unexpected {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            vec![(1, HOPS[0], delay), (2, HOPS[1], delay), (3, TARGET, delay)],
            replies
        );
        let ttls = sent.lock().unwrap().iter().map(|p| p.ttl.0).collect::<Vec<_>>();
        assert_eq!(vec![1, 2, 3], ttls);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_hops_to_target_udp() -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel(8);
        let sent = Arc::new(Mutex::new(vec![]));
        let mut network =
            network_with_hops(Protocol::Udp, tx, Duration::from_millis(3), sent.clone());
        let mut events = vec![];
        let completion = drive(
            &config(Protocol::Udp),
            &mut network,
            &mut rx,
            &CancellationToken::new(),
            |ev| events.push(ev.clone()),
        )
        .await?;
        assert_eq!(Completion::TargetReached, completion);
        let Some(ProbeEvent::Reply(last)) = events.last() else {
            panic!("expected reply");
        };
        assert_eq!(TARGET, last.addr);
        assert_eq!(
            IcmpPacketType::Unreachable(IcmpPacketCode(3)),
            last.packet_type
        );
        let ports = sent
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.dest_port.0)
            .collect::<Vec<_>>();
        assert_eq!(vec![33434, 33435, 33436], ports);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_hops_retry_then_max_ttl() -> anyhow::Result<()> {
        let (_tx, mut rx) = mpsc::channel(8);
        let sent = Arc::new(Mutex::new(vec![]));
        let recorded = sent.clone();
        let mut network = MockNetwork::new();
        network
            .expect_send_probe()
            .times(6)
            .returning(move |probe| {
                recorded.lock().unwrap().push((probe.ttl.0, Instant::now()));
                Ok(())
            });
        let config = ProbeConfig {
            max_ttl: TimeToLive(2),
            ..config(Protocol::Icmp)
        };
        let start = Instant::now();
        let mut events = vec![];
        let completion = drive(
            &config,
            &mut network,
            &mut rx,
            &CancellationToken::new(),
            |ev| events.push(ev.clone()),
        )
        .await?;
        assert_eq!(Completion::MaxTtlReached, completion);
        let sends = sent
            .lock()
            .unwrap()
            .iter()
            .map(|(ttl, at)| (*ttl, at.duration_since(start).as_secs()))
            .collect::<Vec<_>>();
        assert_eq!(
            vec![(1, 0), (1, 5), (1, 10), (2, 15), (2, 20), (2, 25)],
            sends
        );
        let no_replies = events
            .iter()
            .filter(|ev| matches!(ev, ProbeEvent::NoReply { .. }))
            .count();
        assert_eq!(2, no_replies);
        assert_eq!(
            Some(&ProbeEvent::NoReply { ttl: TimeToLive(2) }),
            events.last()
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_never_decreases() -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel(8);
        let mut network = MockNetwork::new();
        let sent = Arc::new(Mutex::new(vec![]));
        let recorded = sent.clone();
        network.expect_send_probe().returning(move |probe| {
            recorded.lock().unwrap().push(probe.ttl);
            // odd ttls are answered on their second attempt
            if probe.ttl.0 % 2 == 0 || probe.attempt == 2 {
                let tx = tx.clone();
                let resp = response_for(Protocol::Icmp, probe, HOPS[0]);
                tokio::spawn(async move { tx.send(resp).await });
            }
            Ok(())
        });
        let config = ProbeConfig {
            max_ttl: TimeToLive(6),
            ..config(Protocol::Icmp)
        };
        let completion = drive(
            &config,
            &mut network,
            &mut rx,
            &CancellationToken::new(),
            |_| {},
        )
        .await?;
        assert_eq!(Completion::MaxTtlReached, completion);
        let ttls = sent.lock().unwrap().clone();
        assert!(ttls.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(Some(&TimeToLive(6)), ttls.last());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_recovers_through_timeout() -> anyhow::Result<()> {
        let (_tx, mut rx) = mpsc::channel(8);
        let mut network = MockNetwork::new();
        network.expect_send_probe().times(2).returning(|_| {
            Err(Error::ProbeFailed(IoError::SendTo(
                io::Error::from(io::ErrorKind::PermissionDenied),
                SocketAddr::from((TARGET, 0)),
            )))
        });
        let config = ProbeConfig {
            max_ttl: TimeToLive(1),
            max_attempts: 2,
            ..config(Protocol::Icmp)
        };
        let mut events = vec![];
        let completion = drive(
            &config,
            &mut network,
            &mut rx,
            &CancellationToken::new(),
            |ev| events.push(ev.clone()),
        )
        .await?;
        assert_eq!(Completion::MaxTtlReached, completion);
        assert_eq!(3, events.len());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_send_error() {
        let (_tx, mut rx) = mpsc::channel(8);
        let mut network = MockNetwork::new();
        network
            .expect_send_probe()
            .times(1)
            .returning(|_| Err(Error::BadConfig(String::from("too big"))));
        let res = drive(
            &config(Protocol::Icmp),
            &mut network,
            &mut rx,
            &CancellationToken::new(),
            |_| {},
        )
        .await;
        assert!(matches!(res, Err(Error::BadConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled() -> anyhow::Result<()> {
        let (_tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let canceller = token.clone();
        let mut network = MockNetwork::new();
        network.expect_send_probe().returning(move |_| {
            canceller.cancel();
            Ok(())
        });
        let completion = drive(&config(Protocol::Icmp), &mut network, &mut rx, &token, |_| {}).await?;
        assert_eq!(Completion::Cancelled, completion);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_closed() {
        let (tx, mut rx) = mpsc::channel::<Response>(8);
        drop(tx);
        let mut network = MockNetwork::new();
        network.expect_send_probe().returning(|_| Ok(()));
        let res = drive(
            &config(Protocol::Icmp),
            &mut network,
            &mut rx,
            &CancellationToken::new(),
            |_| {},
        )
        .await;
        assert!(matches!(res, Err(Error::ChannelClosed)));
    }
}
