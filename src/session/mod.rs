
use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use tokio::sync::{mpsc, Mutex};
use util::marshal::Unmarshal;

use crate::conn::{UdpPacketConn, UdpPacketConnConfig};
use crate::error::{Error, Result};
use crate::fragment::Defragger;
use crate::proto::message::{Dissociate, UdpMessage};
use crate::proto::{Command, COMMAND_DISSOCIATE, COMMAND_PACKET, VERSION};
use crate::transport::QuicConnection;

/// Capacity of each session's inbound queue. Once full, newly delivered
/// messages are dropped, UDP style, so a slow reader cannot wedge the
/// shared transport.
pub(crate) const DATA_QUEUE_SIZE: usize = 64;

struct SessionEntry {
    conn: Arc<UdpPacketConn>,
    data_tx: mpsc::Sender<UdpMessage>,
    // Read-side reassembly state lives with the session it belongs to.
    defragger: Defragger,
}

/// `UdpSessionManagerConfig` is a set of configuration params used by
/// [`UdpSessionManager::new()`].
pub struct UdpSessionManagerConfig {
    pub transport: Arc<dyn QuicConnection + Send + Sync>,
    /// Applied to every session this manager creates.
    pub udp_stream: bool,
    pub is_server: bool,
}

/// `UdpSessionManager` holds the live sessions of one QUIC connection and
/// demultiplexes inbound frames onto them.
///
/// It is the producer side of each session's data queue: the owner of the
/// QUIC connection feeds every received datagram (or fully drained
/// uni-stream) into [`UdpSessionManager::feed()`].
pub struct UdpSessionManager {
    transport: Arc<dyn QuicConnection + Send + Sync>,
    sessions: Mutex<HashMap<u16, SessionEntry>>,
    udp_stream: bool,
    is_server: bool,
}

impl UdpSessionManager {
    /// Creates a new [`UdpSessionManager`].
    pub fn new(config: UdpSessionManagerConfig) -> Self {
        UdpSessionManager {
            transport: config.transport,
            sessions: Mutex::new(HashMap::new()),
            udp_stream: config.udp_stream,
            is_server: config.is_server,
        }
    }

    /// Registers a new session under `session_id` and returns its endpoint.
    /// Ids are assigned by the caller; reuse of a live id is rejected.
    pub async fn create(&self, session_id: u16) -> Result<Arc<UdpPacketConn>> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session_id) {
            return Err(Error::ErrDuplicateSession(session_id));
        }

        let (data_tx, data_rx) = mpsc::channel(DATA_QUEUE_SIZE);
        let conn = Arc::new(UdpPacketConn::new(UdpPacketConnConfig {
            session_id,
            transport: Arc::clone(&self.transport),
            data_rx,
            udp_stream: self.udp_stream,
            is_server: self.is_server,
        }));
        sessions.insert(
            session_id,
            SessionEntry {
                conn: Arc::clone(&conn),
                data_tx,
                defragger: Defragger::new(),
            },
        );

        Ok(conn)
    }

    /// Fetches the live session registered under `session_id`.
    pub async fn get(&self, session_id: u16) -> Option<Arc<UdpPacketConn>> {
        let sessions = self.sessions.lock().await;
        sessions.get(&session_id).map(|entry| Arc::clone(&entry.conn))
    }

    /// Consumes one inbound frame: `[version][command][body]`.
    ///
    /// Packet frames are decoded, run through the owning session's
    /// defragmenter, and queued for its reader; frames for unknown sessions
    /// and messages past a full queue are dropped. A Dissociate frame tears
    /// the named session down.
    pub async fn feed(&self, mut frame: Bytes) -> Result<()> {
        if frame.remaining() < 2 {
            return Err(Error::ErrShortPacket);
        }
        let version = frame.get_u8();
        if version != VERSION {
            return Err(Error::ErrUnsupportedVersion(version));
        }

        let command = Command(frame.get_u8());
        match command {
            COMMAND_PACKET => {
                let message = UdpMessage::unmarshal(&mut frame)?;
                self.deliver(message).await;
                Ok(())
            }
            COMMAND_DISSOCIATE => {
                let dissociate = Dissociate::unmarshal(&mut frame)?;
                self.close_session(dissociate.session_id).await;
                Ok(())
            }
            _ => Err(Error::ErrUnknownCommand(command.0)),
        }
    }

    async fn deliver(&self, message: UdpMessage) {
        let session_id = message.session_id;
        let mut sessions = self.sessions.lock().await;
        let entry = match sessions.get_mut(&session_id) {
            Some(entry) => entry,
            None => {
                log::debug!("dropping message for unknown session {session_id}");
                return;
            }
        };

        if let Some(message) = entry.defragger.feed(message) {
            if let Err(mpsc::error::TrySendError::Full(_)) = entry.data_tx.try_send(message) {
                log::warn!("session {session_id}: inbound queue full, dropping message");
            }
        }
    }

    /// Closes and unregisters one session. Invoked for inbound Dissociate
    /// frames and usable directly for local teardown.
    pub async fn close_session(&self, session_id: u16) {
        let entry = {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(&session_id)
        };
        if let Some(entry) = entry {
            let _ = entry.conn.close().await;
        }
    }

    /// Tears down every session with `err` as the recorded cause; used when
    /// the shared transport fails.
    pub async fn close_all(&self, err: Error) {
        let entries: Vec<SessionEntry> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            entry.conn.close_with_error(err.clone()).await;
        }
    }
}
