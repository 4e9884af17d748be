#[cfg(test)]
mod fragment_test;

use bytes::BytesMut;

use crate::proto::addr::Address;
use crate::proto::message::UdpMessage;

/// Splits `message` into fragments whose marshaled size fits
/// `max_packet_size`. A message that already fits is returned unchanged.
///
/// Fragments share the session and packet id, carry `fragment_total =
/// ceil(len / budget)` and their chunk index, and only fragment 0 keeps the
/// destination. When no payload budget remains under `max_packet_size` (or
/// the split would need more than 255 fragments) the message is returned
/// unfragmented and the transport send surfaces the size error.
pub fn fragment_message(message: UdpMessage, max_packet_size: usize) -> Vec<UdpMessage> {
    if message.data.len() <= max_packet_size {
        return vec![message];
    }

    let udp_mtu = max_packet_size.saturating_sub(message.header_size());
    if udp_mtu == 0 {
        return vec![message];
    }

    let fragment_total = (message.data.len() + udp_mtu - 1) / udp_mtu;
    if fragment_total > u8::MAX as usize {
        return vec![message];
    }

    let mut fragments = Vec::with_capacity(fragment_total);
    let mut offset = 0;
    while offset < message.data.len() {
        let end = std::cmp::min(offset + udp_mtu, message.data.len());
        let fragment_id = fragments.len() as u8;
        fragments.push(UdpMessage {
            session_id: message.session_id,
            packet_id: message.packet_id,
            fragment_total: fragment_total as u8,
            fragment_id,
            destination: if fragment_id == 0 {
                message.destination.clone()
            } else {
                Address::None
            },
            data: message.data.slice(offset..end),
        });
        offset = end;
    }

    fragments
}

/// Defragger buffers the fragments of a single in-flight packet group and
/// emits the reassembled message once every slot is filled.
///
/// Only one group is retained: any fragment carrying a new packet id
/// abandons the current group (UDP semantics, no timers). Duplicates and
/// malformed fragments are dropped silently.
#[derive(Debug, Default)]
pub struct Defragger {
    packet_id: u16,
    fragments: Vec<Option<UdpMessage>>,
    count: u8,
}

impl Defragger {
    pub fn new() -> Self {
        Defragger::default()
    }

    /// Consumes one inbound message. Unfragmented messages pass straight
    /// through; fragments are buffered until their group completes.
    pub fn feed(&mut self, m: UdpMessage) -> Option<UdpMessage> {
        if m.fragment_total <= 1 {
            return Some(m);
        }
        if m.fragment_id >= m.fragment_total {
            return None;
        }

        if m.packet_id != self.packet_id || self.fragments.is_empty() {
            self.packet_id = m.packet_id;
            self.fragments = vec![None; m.fragment_total as usize];
            self.count = 1;
            let index = m.fragment_id as usize;
            self.fragments[index] = Some(m);
            return None;
        }

        let index = m.fragment_id as usize;
        if index >= self.fragments.len() || self.fragments[index].is_some() {
            // fragment_total disagrees with the group, or a duplicate slot
            return None;
        }
        self.fragments[index] = Some(m);
        self.count += 1;

        if (self.count as usize) < self.fragments.len() {
            return None;
        }

        let fragments = std::mem::take(&mut self.fragments);
        self.count = 0;

        let total_len: usize = fragments
            .iter()
            .map(|f| f.as_ref().map_or(0, |m| m.data.len()))
            .sum();
        let mut data = BytesMut::with_capacity(total_len);
        let mut assembled = UdpMessage {
            fragment_total: 1,
            ..UdpMessage::default()
        };
        for (index, fragment) in fragments.into_iter().enumerate() {
            let fragment = fragment?;
            if index == 0 {
                assembled.session_id = fragment.session_id;
                assembled.packet_id = fragment.packet_id;
                assembled.destination = fragment.destination;
            }
            data.extend_from_slice(&fragment.data);
        }
        assembled.data = data.freeze();

        Some(assembled)
    }
}
