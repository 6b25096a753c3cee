use std::fmt::{Display, Formatter};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// A session error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A session error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid packet: {0}")]
    PacketError(#[from] hopscan_packet::error::Error),
    #[error("invalid config: {0}")]
    BadConfig(String),
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
    #[error("probe failed to send: {0}")]
    ProbeFailed(IoError),
    #[error("failed to open raw socket, elevated privileges are required: {0}")]
    PrivilegeRequired(IoError),
    #[error("missing address from socket call")]
    MissingAddr,
    #[error("response channel closed")]
    ChannelClosed,
}

/// Custom IO error result.
pub type IoResult<T> = std::result::Result<T, IoError>;

/// Custom IO error.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("connect error for {1}: {0}")]
    Connect(io::Error, SocketAddr),
    #[error("sendto error for {1}: {0}")]
    SendTo(io::Error, SocketAddr),
    #[error("failed to {1}: {0}")]
    Other(io::Error, IoOperation),
}

impl IoError {
    /// Get the custom error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect(e, _) | Self::SendTo(e, _) | Self::Other(e, _) => ErrorKind::from(e),
        }
    }
}

/// Custom error kind.
///
/// Separates the network unreachable errors a send may report from other IO errors.
#[derive(Debug, Eq, PartialEq)]
pub enum ErrorKind {
    HostUnreachable,
    NetUnreachable,
    Std(io::ErrorKind),
}

impl From<&io::Error> for ErrorKind {
    fn from(value: &io::Error) -> Self {
        match value.raw_os_error() {
            #[cfg(unix)]
            Some(nix::libc::EHOSTUNREACH) => Self::HostUnreachable,
            #[cfg(unix)]
            Some(nix::libc::ENETUNREACH) => Self::NetUnreachable,
            _ => Self::Std(value.kind()),
        }
    }
}

/// Io operation.
#[derive(Debug)]
pub enum IoOperation {
    NewSocket,
    SetNonBlocking,
    SetHeaderIncluded,
    LocalAddr,
    Register,
    Readable,
    Read,
    Runtime,
}

impl Display for IoOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewSocket => write!(f, "create new socket"),
            Self::SetNonBlocking => write!(f, "set non-blocking"),
            Self::SetHeaderIncluded => write!(f, "set header included"),
            Self::LocalAddr => write!(f, "local addr"),
            Self::Register => write!(f, "register socket with the reactor"),
            Self::Readable => write!(f, "await readable"),
            Self::Read => write!(f, "read"),
            Self::Runtime => write!(f, "build runtime"),
        }
    }
}
