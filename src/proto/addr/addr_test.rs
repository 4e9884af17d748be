use super::*;
use crate::error::Result;

#[test]
fn test_address_round_trip() -> Result<()> {
    let tests: Vec<(&str, Address, usize)> = vec![
        ("none", Address::None, 1),
        (
            "ipv4",
            Address::SocketAddr(SocketAddr::new(
                IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
                53,
            )),
            7,
        ),
        (
            "ipv6",
            Address::SocketAddr(SocketAddr::new(
                IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
                8443,
            )),
            19,
        ),
        (
            "domain",
            Address::Domain("example.com".to_owned(), 443),
            1 + 1 + 11 + 2,
        ),
    ];

    for (name, addr, expected_size) in tests {
        assert_eq!(
            addr.marshal_size(),
            expected_size,
            "({name}) wrong marshal size"
        );

        let raw = addr.marshal()?;
        assert_eq!(raw.len(), expected_size, "({name}) wrong encoded length");

        let decoded = Address::unmarshal(&mut &raw[..])?;
        assert_eq!(decoded, addr, "({name}) round trip mismatch");
    }

    Ok(())
}

#[test]
fn test_address_ipv4_wire_format() -> Result<()> {
    let addr = Address::SocketAddr(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
        53,
    ));

    let raw = addr.marshal()?;
    assert_eq!(
        &raw[..],
        &[ATYP_IPV4, 0x01, 0x02, 0x03, 0x04, 0x00, 0x35],
        "unexpected wire bytes"
    );

    Ok(())
}

#[test]
fn test_address_none_is_single_byte_sentinel() -> Result<()> {
    let raw = Address::None.marshal()?;
    assert_eq!(&raw[..], &[ATYP_NONE], "sentinel must be the type byte alone");
    assert!(Address::default().is_none(), "default address should be none");

    Ok(())
}

#[test]
fn test_address_socket_addr() {
    let socket = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 5353);
    let addr = Address::from_socket_addr(socket);
    assert_eq!(addr.socket_addr(), Some(socket), "ip form should round trip");

    assert_eq!(Address::None.socket_addr(), None);
    assert_eq!(
        Address::Domain("example.com".to_owned(), 443).socket_addr(),
        None,
        "domains resolve elsewhere, not here"
    );
}

#[test]
fn test_address_decode_errors() {
    let tests: Vec<(&str, Vec<u8>)> = vec![
        ("empty", vec![]),
        ("ipv4 short", vec![ATYP_IPV4, 1, 2, 3]),
        ("ipv6 short", vec![ATYP_IPV6, 0, 0, 0, 0]),
        ("domain short", vec![ATYP_FQDN, 5, b'a', b'b']),
        ("domain no length", vec![ATYP_FQDN]),
        ("unknown family", vec![0x7f, 0, 0]),
    ];

    for (name, raw) in tests {
        let result = Address::unmarshal(&mut &raw[..]);
        assert!(result.is_err(), "({name}) should have failed to decode");
    }
}

#[test]
fn test_address_domain_too_long() {
    let addr = Address::Domain("a".repeat(256), 80);
    let mut buf = vec![0u8; addr.marshal_size()];
    let result = addr.marshal_to(&mut buf);
    assert!(result.is_err(), "over-long domain must not encode");
}
