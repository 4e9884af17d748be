use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// `QuicConnection` is the adapter every session sends through; one
/// implementation wraps one QUIC connection shared by all sessions, which
/// provides its own synchronization.
#[async_trait]
pub trait QuicConnection {
    /// Sends one unreliable datagram. May fail with
    /// [`Error::ErrMessageTooLarge`](crate::Error::ErrMessageTooLarge)
    /// carrying the largest size currently accepted; callers adopt that
    /// value as the session MTU and refragment.
    async fn send_datagram(&self, data: Bytes) -> Result<()>;

    /// Opens a fresh unidirectional stream, used for stream-mode messages
    /// and for the Dissociate frame.
    async fn open_uni_stream(&self) -> Result<Box<dyn QuicSendStream + Send + Sync>>;

    /// Returns the local network address.
    fn local_addr(&self) -> Result<SocketAddr>;
}

/// Send half of a unidirectional QUIC stream.
#[async_trait]
pub trait QuicSendStream {
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Closes the stream; in-stream data ordering is preserved up to this
    /// point.
    async fn finish(&mut self) -> Result<()>;
}
