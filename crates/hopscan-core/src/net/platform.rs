/// Header byte order required by the platform.
mod byte_order;

#[cfg(unix)]
mod unix;

pub use byte_order::Ipv4ByteOrder;

#[cfg(unix)]
pub use unix::*;

#[cfg(not(unix))]
compile_error!("raw sockets are only supported on unix platforms");
