
use std::fmt;

use bytes::{Buf, BufMut, Bytes};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use super::addr::Address;
use super::{COMMAND_DISSOCIATE, COMMAND_PACKET, VERSION};
use crate::error::Error;

/// Largest payload a single UDP message may carry once reassembled.
pub const MAX_PAYLOAD_SIZE: usize = 0xffff;

/// Fixed frame bytes in front of the address block: version, command,
/// session id, packet id, fragment total, fragment id, data length.
const FIXED_HEADER_SIZE: usize = 10;

/// UdpMessage is one frame of the UDP relay: a full datagram when
/// `fragment_total` is 1, otherwise one fragment of it.
///
/// Only fragment 0 carries the destination; later fragments carry
/// [`Address::None`]. The wire `data length` field always holds the length
/// of this frame's own payload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UdpMessage {
    pub session_id: u16,
    pub packet_id: u16,
    pub fragment_total: u8,
    pub fragment_id: u8,
    pub destination: Address,
    pub data: Bytes,
}

impl fmt::Display for UdpMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UDP MESSAGE session={} packet={} fragment={}/{} destination={} len={}",
            self.session_id,
            self.packet_id,
            self.fragment_id,
            self.fragment_total,
            self.destination,
            self.data.len()
        )
    }
}

impl UdpMessage {
    /// On-wire budget of everything in front of the payload. The fragmenter
    /// subtracts this from the transport MTU to get the per-fragment payload
    /// size.
    pub fn header_size(&self) -> usize {
        2 + FIXED_HEADER_SIZE + self.destination.marshal_size()
    }
}

impl MarshalSize for UdpMessage {
    fn marshal_size(&self) -> usize {
        FIXED_HEADER_SIZE + self.destination.marshal_size() + self.data.len()
    }
}

impl Marshal for UdpMessage {
    /// Serializes the full frame, version and command bytes included.
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize, util::Error> {
        let required = self.marshal_size();
        if buf.remaining_mut() < required {
            return Err(Error::ErrBufferTooSmall.into());
        }

        buf.put_u8(VERSION);
        buf.put_u8(COMMAND_PACKET.0);
        buf.put_u16(self.session_id);
        buf.put_u16(self.packet_id);
        buf.put_u8(self.fragment_total);
        buf.put_u8(self.fragment_id);
        buf.put_u16(self.data.len() as u16);
        let n = self.destination.marshal_to(buf)?;
        buf = &mut buf[n..];
        buf.put(&*self.data);

        Ok(required)
    }
}

impl Unmarshal for UdpMessage {
    /// Parses a frame body. The demultiplexer consumes the version and
    /// command bytes before calling this.
    fn unmarshal<B>(raw: &mut B) -> Result<Self, util::Error>
    where
        Self: Sized,
        B: Buf,
    {
        if raw.remaining() < FIXED_HEADER_SIZE - 2 {
            return Err(Error::ErrShortPacket.into());
        }

        let session_id = raw.get_u16();
        let packet_id = raw.get_u16();
        let fragment_total = raw.get_u8();
        let fragment_id = raw.get_u8();
        let data_length = raw.get_u16() as usize;
        let destination = Address::unmarshal(raw)?;
        if raw.remaining() < data_length {
            return Err(Error::ErrShortPacket.into());
        }
        let data = raw.copy_to_bytes(data_length);

        Ok(UdpMessage {
            session_id,
            packet_id,
            fragment_total,
            fragment_id,
            destination,
            data,
        })
    }
}

/// Dissociate is the 4-byte control frame a client emits on close to tear
/// the session down on the peer.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Dissociate {
    pub session_id: u16,
}

impl MarshalSize for Dissociate {
    fn marshal_size(&self) -> usize {
        4
    }
}

impl Marshal for Dissociate {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize, util::Error> {
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::ErrBufferTooSmall.into());
        }

        buf.put_u8(VERSION);
        buf.put_u8(COMMAND_DISSOCIATE.0);
        buf.put_u16(self.session_id);

        Ok(self.marshal_size())
    }
}

impl Unmarshal for Dissociate {
    /// Parses a frame body, version and command bytes already consumed.
    fn unmarshal<B>(raw: &mut B) -> Result<Self, util::Error>
    where
        Self: Sized,
        B: Buf,
    {
        if raw.remaining() < 2 {
            return Err(Error::ErrShortPacket.into());
        }

        Ok(Dissociate {
            session_id: raw.get_u16(),
        })
    }
}
