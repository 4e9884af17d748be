
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, watch, Mutex};
use util::marshal::Marshal;

use crate::error::{Error, Result};
use crate::fragment::fragment_message;
use crate::proto::addr::Address;
use crate::proto::message::{Dissociate, UdpMessage, MAX_PAYLOAD_SIZE};
use crate::transport::QuicConnection;

/// `UdpPacketConnConfig` is a set of configuration params used by
/// [`UdpPacketConn::new()`].
pub struct UdpPacketConnConfig {
    /// Session id within the shared QUIC connection; uniqueness is the
    /// creator's responsibility.
    pub session_id: u16,
    pub transport: Arc<dyn QuicConnection + Send + Sync>,
    /// Receive half of the inbound queue; the demultiplexer holds the send
    /// half.
    pub data_rx: mpsc::Receiver<UdpMessage>,
    /// Sends each message on a fresh unidirectional stream instead of a
    /// QUIC datagram.
    pub udp_stream: bool,
    /// Servers do not emit a Dissociate frame on close.
    pub is_server: bool,
}

/// `UdpPacketConn` is one session's bidirectional UDP endpoint over the
/// shared QUIC connection.
///
/// Outbound payloads are framed, fragmented against the discovered MTU, and
/// emitted as datagrams or per-message uni-streams. Inbound messages arrive
/// on the queue filled by the demultiplexer. Close is one-shot and unblocks
/// pending readers.
///
/// Read and write deadlines are not supported; readers block until a message
/// arrives or the session closes.
pub struct UdpPacketConn {
    session_id: u16,
    transport: Arc<dyn QuicConnection + Send + Sync>,
    data_rx: Mutex<mpsc::Receiver<UdpMessage>>,
    udp_stream: bool,
    is_server: bool,
    /// Best guess for the largest single message this transport accepts;
    /// 0 means unknown, try full size first.
    udp_mtu: AtomicUsize,
    packet_id: AtomicU32,
    closed: AtomicBool,
    close_reason: std::sync::Mutex<Option<Error>>,
    closed_tx: watch::Sender<bool>,
    // Pristine receiver; readers clone it so a close that already happened
    // is still observed.
    closed_rx: watch::Receiver<bool>,
}

impl UdpPacketConn {
    /// Creates a new [`UdpPacketConn`].
    pub fn new(config: UdpPacketConnConfig) -> Self {
        let (closed_tx, closed_rx) = watch::channel(false);

        UdpPacketConn {
            session_id: config.session_id,
            transport: config.transport,
            data_rx: Mutex::new(config.data_rx),
            udp_stream: config.udp_stream,
            is_server: config.is_server,
            udp_mtu: AtomicUsize::new(0),
            packet_id: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            close_reason: std::sync::Mutex::new(None),
            closed_tx,
            closed_rx,
        }
    }

    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    /// Current per-message payload budget learned from transport feedback.
    pub fn udp_mtu(&self) -> usize {
        self.udp_mtu.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The cause recorded by the first close, if any.
    pub fn close_reason(&self) -> Option<Error> {
        match self.close_reason.lock() {
            Ok(reason) => (*reason).clone(),
            Err(_) => None,
        }
    }

    /// Returns the local network address of the underlying transport.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    fn next_packet_id(&self) -> u16 {
        let packet_id = self.packet_id.fetch_add(1, Ordering::SeqCst) + 1;
        if packet_id > u16::MAX as u32 {
            self.packet_id.store(0, Ordering::SeqCst);
            0
        } else {
            packet_id as u16
        }
    }

    /// Frames `data` for `destination` and sends it, fragmenting against
    /// the known MTU. A transport rejection carrying a new limit is adopted
    /// and the send retried with fragmentation exactly once.
    pub async fn write_packet(&self, data: Bytes, destination: Address) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ErrClosed);
        }
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::ErrMessageTooLarge(MAX_PAYLOAD_SIZE));
        }

        let message = UdpMessage {
            session_id: self.session_id,
            packet_id: self.next_packet_id(),
            fragment_total: 1,
            fragment_id: 0,
            destination,
            data,
        };

        let udp_mtu = self.udp_mtu();
        let result = if udp_mtu > 0 && message.data.len() > udp_mtu {
            self.write_messages(fragment_message(message.clone(), udp_mtu))
                .await
        } else {
            self.write_message(&message).await
        };

        let limit = match result {
            Ok(()) => return Ok(()),
            Err(Error::ErrMessageTooLarge(limit)) => limit,
            Err(err) => return Err(err),
        };

        log::debug!("session {}: adopting UDP MTU {}", self.session_id, limit);
        self.udp_mtu.store(limit, Ordering::Relaxed);
        self.write_messages(fragment_message(message, limit)).await
    }

    /// Caller-buffer write variant of [`Self::write_packet()`].
    pub async fn send_to(&self, p: &[u8], addr: SocketAddr) -> Result<usize> {
        self.write_packet(Bytes::copy_from_slice(p), Address::from_socket_addr(addr))
            .await?;
        Ok(p.len())
    }

    async fn write_messages(&self, messages: Vec<UdpMessage>) -> Result<()> {
        for message in &messages {
            self.write_message(message).await?;
        }
        Ok(())
    }

    async fn write_message(&self, message: &UdpMessage) -> Result<()> {
        let raw = message.marshal()?;
        if self.udp_stream {
            let mut stream = self.transport.open_uni_stream().await?;
            let result = stream.write_all(&raw).await;
            let _ = stream.finish().await;
            result
        } else {
            self.transport.send_datagram(raw).await
        }
    }

    /// Receives the next delivered message, returning its payload and the
    /// peer address. Fails with
    /// [`Error::ErrClosedPipe`] once the session is closed.
    pub async fn read_packet(&self) -> Result<(Bytes, Address)> {
        let message = self.next_message().await?;
        Ok((message.data, message.destination))
    }

    /// Caller-buffer read variant of [`Self::read_packet()`]; a payload
    /// larger than `buf` is truncated, UDP style.
    pub async fn read_packet_into(&self, buf: &mut [u8]) -> Result<(usize, Address)> {
        let message = self.next_message().await?;
        let n = std::cmp::min(buf.len(), message.data.len());
        buf[..n].copy_from_slice(&message.data[..n]);
        Ok((n, message.destination))
    }

    async fn next_message(&self) -> Result<UdpMessage> {
        if self.is_closed() {
            return Err(Error::ErrClosedPipe);
        }

        let mut closed_rx = self.closed_rx.clone();
        let mut data_rx = self.data_rx.lock().await;
        tokio::select! {
            message = data_rx.recv() => message.ok_or(Error::ErrClosedPipe),
            _ = closed_rx.changed() => Err(Error::ErrClosedPipe),
        }
    }

    /// Closes the session. Idempotent; pending reads unblock with
    /// [`Error::ErrClosedPipe`], later writes fail with
    /// [`Error::ErrClosed`].
    pub async fn close(&self) -> Result<()> {
        self.close_with_error(Error::ErrClosed).await;
        Ok(())
    }

    /// Closes the session recording `err` as the cause. The first caller
    /// wins; a client additionally sends the Dissociate frame, best-effort.
    pub async fn close_with_error(&self, err: Error) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Ok(mut reason) = self.close_reason.lock() {
            *reason = Some(err);
        }
        let _ = self.closed_tx.send(true);

        if !self.is_server {
            let frame = Dissociate {
                session_id: self.session_id,
            };
            match self.transport.open_uni_stream().await {
                Ok(mut stream) => {
                    if let Ok(raw) = frame.marshal() {
                        let _ = stream.write_all(&raw).await;
                    }
                    let _ = stream.finish().await;
                }
                Err(open_err) => {
                    log::debug!(
                        "session {}: dissociate not sent: {}",
                        self.session_id,
                        open_err
                    );
                }
            }
        }
    }
}
