#[cfg(test)]
mod addr_test;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;

pub(crate) const ATYP_FQDN: u8 = 0x00;
pub(crate) const ATYP_IPV4: u8 = 0x01;
pub(crate) const ATYP_IPV6: u8 = 0x02;
pub(crate) const ATYP_NONE: u8 = 0xff;

pub(crate) const IPV4LEN: usize = 4;
pub(crate) const IPV6LEN: usize = 16;

/// `Address` is the socks-style destination block carried by a UDP message:
/// a one-byte address type, the address body, and a 16-bit port.
///
/// `Address::None` is the empty sentinel encoded as the type byte alone; it
/// is what fragments past index 0 carry instead of the real destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    None,
    SocketAddr(SocketAddr),
    Domain(String, u16),
}

impl Default for Address {
    fn default() -> Self {
        Address::None
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::None => write!(f, "<none>"),
            Address::SocketAddr(addr) => write!(f, "{addr}"),
            Address::Domain(domain, port) => write!(f, "{domain}:{port}"),
        }
    }
}

impl Address {
    /// Creates a new [`Address`] from `addr`.
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        Address::SocketAddr(addr)
    }

    /// Returns the socket address form, if this address carries one.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            Address::SocketAddr(addr) => Some(*addr),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Address::None)
    }
}

impl MarshalSize for Address {
    fn marshal_size(&self) -> usize {
        match self {
            Address::None => 1,
            Address::SocketAddr(SocketAddr::V4(_)) => 1 + IPV4LEN + 2,
            Address::SocketAddr(SocketAddr::V6(_)) => 1 + IPV6LEN + 2,
            Address::Domain(domain, _) => 1 + 1 + domain.len() + 2,
        }
    }
}

impl Marshal for Address {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize, util::Error> {
        let required = self.marshal_size();
        if buf.remaining_mut() < required {
            return Err(Error::ErrBufferTooSmall.into());
        }

        match self {
            Address::None => {
                buf.put_u8(ATYP_NONE);
            }
            Address::SocketAddr(SocketAddr::V4(addr)) => {
                buf.put_u8(ATYP_IPV4);
                buf.put_slice(&addr.ip().octets());
                buf.put_u16(addr.port());
            }
            Address::SocketAddr(SocketAddr::V6(addr)) => {
                buf.put_u8(ATYP_IPV6);
                buf.put_slice(&addr.ip().octets());
                buf.put_u16(addr.port());
            }
            Address::Domain(domain, port) => {
                if domain.len() > 255 {
                    return Err(Error::ErrDomainTooLong.into());
                }
                buf.put_u8(ATYP_FQDN);
                buf.put_u8(domain.len() as u8);
                buf.put_slice(domain.as_bytes());
                buf.put_u16(*port);
            }
        }

        Ok(required)
    }
}

impl Unmarshal for Address {
    fn unmarshal<B>(raw: &mut B) -> Result<Self, util::Error>
    where
        Self: Sized,
        B: Buf,
    {
        if raw.remaining() < 1 {
            return Err(Error::ErrShortPacket.into());
        }

        let atyp = raw.get_u8();
        match atyp {
            ATYP_NONE => Ok(Address::None),
            ATYP_IPV4 => {
                if raw.remaining() < IPV4LEN + 2 {
                    return Err(Error::ErrShortPacket.into());
                }
                let mut ip = [0u8; IPV4LEN];
                raw.copy_to_slice(&mut ip);
                let port = raw.get_u16();
                Ok(Address::SocketAddr(SocketAddr::new(
                    IpAddr::V4(Ipv4Addr::from(ip)),
                    port,
                )))
            }
            ATYP_IPV6 => {
                if raw.remaining() < IPV6LEN + 2 {
                    return Err(Error::ErrShortPacket.into());
                }
                let mut ip = [0u8; IPV6LEN];
                raw.copy_to_slice(&mut ip);
                let port = raw.get_u16();
                Ok(Address::SocketAddr(SocketAddr::new(
                    IpAddr::V6(Ipv6Addr::from(ip)),
                    port,
                )))
            }
            ATYP_FQDN => {
                if raw.remaining() < 1 {
                    return Err(Error::ErrShortPacket.into());
                }
                let len = raw.get_u8() as usize;
                if raw.remaining() < len + 2 {
                    return Err(Error::ErrShortPacket.into());
                }
                let mut domain = vec![0u8; len];
                raw.copy_to_slice(&mut domain);
                let domain =
                    String::from_utf8(domain).map_err(|_| Error::ErrInvalidDomainName)?;
                let port = raw.get_u16();
                Ok(Address::Domain(domain, port))
            }
            _ => Err(Error::ErrUnknownAddressType(atyp).into()),
        }
    }
}
