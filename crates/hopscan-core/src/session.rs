use crate::error::{Error, IoError, IoOperation, Result};
use crate::net::channel::Receiver;
use crate::probe::Response;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Hop discovery.
mod probe;

/// Sustained sending.
mod transmit;

pub use probe::{HopReply, ProbeEvent, ProbeSession};
pub use transmit::{TransmitEvent, TransmitReply, TransmitSession};

/// The number of decoded responses which may be queued for a session.
const RESPONSE_CHANNEL_SIZE: usize = 64;

/// Why a session ended.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Completion {
    /// A probe was answered by the target.
    TargetReached,
    /// The maximum time-to-live was resolved without reaching the target.
    MaxTtlReached,
    /// Every packet was sent and the session stopped waiting for replies.
    Finished,
    /// The session was cancelled.
    Cancelled,
}

/// The generation of a session timer.
///
/// A timer which fires with an epoch other than the current one is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Epoch(u64);

impl Epoch {
    #[must_use]
    pub(crate) const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// A pending session timer.
pub(crate) type Timer = Option<(Epoch, Instant)>;

/// Wait for `timer` to expire, or forever if there is no timer.
pub(crate) async fn expiry(timer: Timer) -> Epoch {
    match timer {
        Some((epoch, deadline)) => {
            tokio::time::sleep_until(deadline).await;
            epoch
        }
        None => std::future::pending().await,
    }
}

/// Build the runtime a blocking session runs on.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .map_err(|err| Error::IoError(IoError::Other(err, IoOperation::Runtime)))
}

/// Run `drive` while a separate task forwards responses from `receiver`.
///
/// If the response channel closes because the receive task failed then the
/// receive error is returned.
pub(crate) async fn with_receiver<F, Fut>(
    receiver: Receiver,
    token: &CancellationToken,
    drive: F,
) -> Result<Completion>
where
    F: FnOnce(mpsc::Receiver<Response>) -> Fut,
    Fut: Future<Output = Result<Completion>>,
{
    let (tx, rx) = mpsc::channel(RESPONSE_CHANNEL_SIZE);
    let recv_token = token.child_token();
    let recv_task = tokio::spawn(receiver.forward(tx, recv_token.clone()));
    let completion = drive(rx).await;
    recv_token.cancel();
    match (completion, recv_task.await) {
        (Err(Error::ChannelClosed), Ok(Err(err))) => Err(err),
        (completion, _) => completion,
    }
}
