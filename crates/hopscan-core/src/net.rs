use crate::error::Result;
use crate::probe::Probe;

/// `IPv4` packet building and response extraction.
mod ipv4;

/// Platform specific network code.
mod platform;

/// A network socket.
mod socket;

/// A channel for sending probes and receiving responses.
pub mod channel;

/// Determine the source address.
pub mod source;

/// The platform specific socket types.
pub use platform::{RecvSocketImpl, SocketImpl};

/// An abstraction over the send side of a raw socket.
#[cfg_attr(test, mockall::automock)]
pub trait Network {
    /// Send a `Probe`.
    ///
    /// A send which fails for a transient reason returns `Error::ProbeFailed`.
    fn send_probe(&mut self, probe: &Probe) -> Result<()>;
}
