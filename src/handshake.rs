//! Connection setup (SYN / SYN_ACK).
//!
//! Neither side retransmits a handshake packet; a lost SYN or SYN_ACK is
//! fatal. Retry here would be a reasonable enhancement but isn't required
//! and isn't implemented.

use std::net::{IpAddr, SocketAddr};

use crate::channel::{Channel, Variant};
use crate::endpoint::DatagramEndpoint;
use crate::error::{Error, Result};
use crate::packet::PacketType;

/// Binds `port`, awaits a SYN (which pins the client's address), replies
/// with SYN_ACK, and returns a connected channel of the requested variant.
pub fn listen(port: u16, variant: Variant) -> Result<Channel> {
    let endpoint = DatagramEndpoint::bind(port).map_err(|source| Error::Bind { port, source })?;

    log::debug!("handshake: listening on port {port}, awaiting SYN");
    let packet = endpoint.recv().ok_or(Error::HandshakeNoPacket)?;
    if packet.typ != PacketType::Syn {
        return Err(Error::HandshakeFailed {
            expected: "SYN",
            got: packet_kind_name(packet.typ),
        });
    }
    log::debug!("handshake: received SYN");

    if !endpoint.send_packet(PacketType::SynAck, 0, &[]) {
        return Err(Error::HandshakeFailed {
            expected: "SYN_ACK sent",
            got: "send failed",
        });
    }
    log::debug!("handshake: sent SYN_ACK, connection established");

    Ok(Channel::new(endpoint, variant))
}

/// Connects to `(ip, port)`, sends SYN, awaits SYN_ACK, and returns a
/// connected channel of the requested variant.
pub fn connect(ip: IpAddr, port: u16, variant: Variant) -> Result<Channel> {
    let remote = SocketAddr::new(ip, port);
    let endpoint = DatagramEndpoint::connect(remote).map_err(|source| Error::Connect { addr: remote, source })?;

    log::debug!("handshake: sending SYN to {remote}");
    if !endpoint.send_packet(PacketType::Syn, 0, &[]) {
        return Err(Error::HandshakeFailed {
            expected: "SYN sent",
            got: "send failed",
        });
    }

    let packet = endpoint.recv().ok_or(Error::HandshakeNoPacket)?;
    if packet.typ != PacketType::SynAck {
        return Err(Error::HandshakeFailed {
            expected: "SYN_ACK",
            got: packet_kind_name(packet.typ),
        });
    }
    log::debug!("handshake: received SYN_ACK, connection established");

    Ok(Channel::new(endpoint, variant))
}

fn packet_kind_name(typ: PacketType) -> &'static str {
    match typ {
        PacketType::Data => "DATA",
        PacketType::Ack => "ACK",
        PacketType::Syn => "SYN",
        PacketType::SynAck => "SYN_ACK",
        PacketType::Fin => "FIN",
        PacketType::FinAck => "FIN_ACK",
    }
}
