use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The payload (or a single send) exceeds the carried limit. Returned by
    /// the API boundary for payloads over 65535 bytes, and by transports to
    /// report the current largest datagram they accept.
    #[error("message exceeds maximum size of {0} bytes")]
    ErrMessageTooLarge(usize),
    #[error("use of closed network connection")]
    ErrClosed,
    #[error("read/write on closed pipe")]
    ErrClosedPipe,
    #[error("packet is not large enough")]
    ErrShortPacket,
    #[error("buffer too small")]
    ErrBufferTooSmall,
    #[error("unknown address type {0}")]
    ErrUnknownAddressType(u8),
    #[error("unknown command {0}")]
    ErrUnknownCommand(u8),
    #[error("unsupported protocol version {0}")]
    ErrUnsupportedVersion(u8),
    #[error("domain name longer than 255 bytes")]
    ErrDomainTooLong,
    #[error("domain name is not valid UTF-8")]
    ErrInvalidDomainName,
    #[error("session {0} already registered")]
    ErrDuplicateSession(u16),
    #[error("{0}")]
    Util(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("{0}")]
    Other(String),
}

impl From<Error> for util::Error {
    fn from(e: Error) -> Self {
        util::Error::from_std(e)
    }
}

impl From<util::Error> for Error {
    fn from(e: util::Error) -> Self {
        if let Some(down) = e.downcast_ref::<Error>() {
            down.clone()
        } else {
            Error::Util(e.to_string())
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl PartialEq<util::Error> for Error {
    fn eq(&self, other: &util::Error) -> bool {
        if let Some(down) = other.downcast_ref::<Error>() {
            self == down
        } else {
            false
        }
    }
}
