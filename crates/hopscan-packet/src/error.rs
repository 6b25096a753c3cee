use thiserror::Error;

/// A packet error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A packet error.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// The buffer is smaller than the header it should hold.
    #[error("insufficient buffer for {0} packet, minimum={1}, provided={2}")]
    InsufficientPacketBuffer(String, usize, usize),
    /// An `IPv4` header declared a version other than 4.
    #[error("invalid IPv4 version: {0}")]
    InvalidVersion(u8),
    /// An `IPv4` header length (in 32-bit words) implies an options length outside `[0, 40]`.
    #[error("invalid IPv4 header length: {0}")]
    InvalidHeaderLength(u8),
}

/// Check that a buffer of `provided` bytes can hold a `name` header of `minimum` bytes.
pub(crate) fn ensure_len(name: &str, provided: usize, minimum: usize) -> Result<()> {
    if provided >= minimum {
        Ok(())
    } else {
        Err(Error::InsufficientPacketBuffer(
            String::from(name),
            minimum,
            provided,
        ))
    }
}
