use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use bytes::Bytes;

use super::*;
use crate::error::Result;

fn destination() -> Address {
    Address::SocketAddr(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
        53,
    ))
}

fn message(packet_id: u16, fragment_total: u8, fragment_id: u8, data: &'static [u8]) -> UdpMessage {
    UdpMessage {
        session_id: 7,
        packet_id,
        fragment_total,
        fragment_id,
        destination: if fragment_id == 0 {
            destination()
        } else {
            Address::None
        },
        data: Bytes::from_static(data),
    }
}

#[test]
fn test_fragment_small_message_unchanged() {
    let original = message(1, 1, 0, b"hello");

    let fragments = fragment_message(original.clone(), 1200);
    assert_eq!(fragments.len(), 1, "small message must not be fragmented");
    assert_eq!(fragments[0], original, "message must pass through unchanged");
}

#[test]
fn test_fragment_large_message() {
    let payload = Bytes::from(vec![b'A'; 4096]);
    let original = UdpMessage {
        session_id: 7,
        packet_id: 3,
        fragment_total: 1,
        fragment_id: 0,
        destination: destination(),
        data: payload.clone(),
    };

    // 1200 - (2 + 10 + 7) leaves 1181 bytes of payload per fragment.
    let fragments = fragment_message(original, 1200);
    assert_eq!(fragments.len(), 4, "wrong fragment count");

    let sizes: Vec<usize> = fragments.iter().map(|f| f.data.len()).collect();
    assert_eq!(sizes, vec![1181, 1181, 1181, 553], "wrong fragment sizes");

    for (index, fragment) in fragments.iter().enumerate() {
        assert_eq!(fragment.session_id, 7, "session id must be inherited");
        assert_eq!(fragment.packet_id, 3, "packet id must be inherited");
        assert_eq!(fragment.fragment_total, 4, "wrong fragment total");
        assert_eq!(fragment.fragment_id as usize, index, "wrong fragment id");
        if index == 0 {
            assert_eq!(
                fragment.destination,
                destination(),
                "fragment 0 must carry the destination"
            );
        } else {
            assert!(
                fragment.destination.is_none(),
                "later fragments must carry the sentinel"
            );
        }
    }

    let mut rejoined = Vec::new();
    for fragment in &fragments {
        rejoined.extend_from_slice(&fragment.data);
    }
    assert_eq!(rejoined, payload, "fragments must cover the payload in order");
}

#[test]
fn test_fragment_without_payload_budget() {
    let original = message(1, 1, 0, &[0u8; 64]);

    // The header alone exceeds the packet size; the message comes back
    // unfragmented and the send path surfaces the transport error.
    let fragments = fragment_message(original.clone(), 16);
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0], original);
}

#[test]
fn test_defrag_round_trip_any_order() -> Result<()> {
    let payload = Bytes::from(vec![b'A'; 4096]);
    let original = UdpMessage {
        session_id: 7,
        packet_id: 3,
        fragment_total: 1,
        fragment_id: 0,
        destination: destination(),
        data: payload.clone(),
    };
    let fragments = fragment_message(original, 1200);

    let orders: Vec<Vec<usize>> = vec![
        vec![0, 1, 2, 3],
        vec![3, 2, 1, 0],
        vec![2, 0, 3, 1],
    ];

    for order in orders {
        let mut defragger = Defragger::new();
        let mut assembled = None;
        for &index in &order {
            let result = defragger.feed(fragments[index].clone());
            if result.is_some() {
                assert!(assembled.is_none(), "({order:?}) emitted more than once");
                assembled = result;
            }
        }

        let assembled = match assembled {
            Some(m) => m,
            None => panic!("({order:?}) group never completed"),
        };
        assert_eq!(assembled.fragment_total, 1, "({order:?}) not self-contained");
        assert_eq!(assembled.fragment_id, 0);
        assert_eq!(assembled.session_id, 7);
        assert_eq!(assembled.packet_id, 3);
        assert_eq!(assembled.destination, destination());
        assert_eq!(assembled.data, payload, "({order:?}) payload mismatch");
    }

    Ok(())
}

#[test]
fn test_defrag_passes_unfragmented_through() {
    let mut defragger = Defragger::new();
    let m = message(9, 1, 0, b"hello");
    assert_eq!(defragger.feed(m.clone()), Some(m));
}

#[test]
fn test_defrag_restart_on_new_packet_id() {
    let mut defragger = Defragger::new();

    assert_eq!(defragger.feed(message(5, 2, 0, b"old-0")), None);
    // A fragment of packet 6 abandons the partial packet 5 group.
    assert_eq!(defragger.feed(message(6, 2, 0, b"new-0")), None);
    let assembled = defragger.feed(message(6, 2, 1, b"new-1"));
    let assembled = assembled.expect("packet 6 should complete");
    assert_eq!(assembled.packet_id, 6);
    assert_eq!(&assembled.data[..], b"new-0new-1");

    // The straggler of packet 5 only opens a fresh group, nothing comes out.
    assert_eq!(defragger.feed(message(5, 2, 1, b"old-1")), None);
}

#[test]
fn test_defrag_ignores_duplicates() {
    let mut defragger = Defragger::new();

    assert_eq!(defragger.feed(message(1, 2, 0, b"first")), None);
    assert_eq!(defragger.feed(message(1, 2, 0, b"again")), None);

    let assembled = defragger.feed(message(1, 2, 1, b"second"));
    let assembled = assembled.expect("group should complete");
    assert_eq!(
        &assembled.data[..],
        b"firstsecond",
        "duplicate must not replace the original slot"
    );
}

#[test]
fn test_defrag_drops_malformed_fragments() {
    let mut defragger = Defragger::new();

    // fragment id out of range for its own total
    assert_eq!(defragger.feed(message(1, 2, 2, b"bad")), None);

    // group of 2, then a fragment claiming a larger total
    assert_eq!(defragger.feed(message(2, 2, 0, b"ok")), None);
    assert_eq!(defragger.feed(message(2, 5, 4, b"liar")), None);

    let assembled = defragger.feed(message(2, 2, 1, b"fine"));
    assert!(assembled.is_some(), "well-formed group must still complete");
}
