//! TUIC UDP relay over QUIC
//!
//! This crate multiplexes arbitrary UDP datagram flows across a single QUIC
//! connection. Each flow is a session identified by a 16-bit id; payloads
//! are framed with a socks-style destination block, fragmented against the
//! MTU the transport reports, and carried either as unreliable QUIC
//! datagrams or each on a fresh unidirectional stream. Datagram-mode
//! messages may be lost or reordered like native UDP.
//!
//! The QUIC connection itself is injected through
//! [`transport::QuicConnection`]; TLS, authentication, and the TUIC command
//! channel live outside this crate.

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod conn;
mod error;
pub mod fragment;
pub mod proto;
pub mod session;
pub mod transport;

pub use error::Error;
