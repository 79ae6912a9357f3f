//! Reliable, ordered, in-sequence byte-stream delivery over UDP.
//!
//! Three interchangeable sliding-window algorithms — stop-and-wait,
//! Go-Back-N, and Selective Repeat — plus a RENO congestion controller
//! overlaid on Go-Back-N, behind one connection-oriented `Channel`.
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//! use reliable_udp::{connect, Variant};
//!
//! let channel = connect(Ipv4Addr::LOCALHOST.into(), 9000, Variant::Gbn).unwrap();
//! channel.send_all(b"hello");
//! ```

mod channel;
mod endpoint;
mod error;
mod gbn;
mod handshake;
mod packet;
mod reno;
mod sr;
mod stopwait;
mod teardown;

#[cfg(test)]
mod testutil;


pub use channel::{Channel, Variant};
pub use error::{Error, Result};
pub use handshake::{connect, listen};
pub use packet::{decode, encode, Packet, PacketType, HEADER_LEN, MAX_PACKET, MAX_PAYLOAD};
