//! A thin, per-connection wrapper over a UDP socket.
//!
//! The endpoint pins the remote address on the first datagram it receives
//! (server side) or is handed a remote up front (client side), and rejects
//! any datagram whose source doesn't match once pinned.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Mutex;

use crate::packet::{self, Packet, MAX_PACKET};

/// Move-only; owns the socket exclusively. `send_packet`/`recv` are safe
/// to call concurrently from different threads — the socket's own
/// send/receive calls only need `&self`, and the single mutable piece of
/// state (the pinned remote) sits behind a `Mutex` rather than requiring
/// callers to serialize through `&mut self`.
#[derive(Debug)]
pub struct DatagramEndpoint {
    socket: UdpSocket,
    remote: Mutex<Option<SocketAddr>>,
}

impl DatagramEndpoint {
    /// Binds `0.0.0.0:port` with no remote pinned yet; the first `recv`
    /// pins it to whoever sent that datagram.
    pub fn bind(port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        Ok(DatagramEndpoint {
            socket,
            remote: Mutex::new(None),
        })
    }

    /// Binds an ephemeral local port and pins `remote` up front.
    pub fn connect(remote: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        Ok(DatagramEndpoint {
            socket,
            remote: Mutex::new(Some(remote)),
        })
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        *self.remote.lock().unwrap()
    }

    #[cfg(test)]
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    /// Transmits one datagram to the pinned remote. Returns `false` if the
    /// remote isn't pinned yet or the OS call fails.
    pub fn send_packet(&self, typ: crate::packet::PacketType, num: u32, payload: &[u8]) -> bool {
        let bytes = packet::encode(typ, num, payload);
        self.send_raw(&bytes)
    }

    /// Transmits an already-encoded packet, for retransmission paths that
    /// keep the original encoded bytes around instead of re-encoding.
    pub fn send_raw(&self, bytes: &[u8]) -> bool {
        let Some(remote) = self.remote() else {
            return false;
        };
        self.socket.send_to(bytes, remote).is_ok()
    }

    /// Blocks until a datagram arrives. Pins `remote` on first receipt;
    /// rejects datagrams from a different source once pinned; decodes and
    /// validates the payload. Any failure (OS error, source mismatch,
    /// decode failure) yields `None` — transient and never surfaced.
    pub fn recv(&self) -> Option<Packet> {
        let mut buf = [0u8; MAX_PACKET];
        let (n, src) = self.socket.recv_from(&mut buf).ok()?;

        {
            let mut remote = self.remote.lock().unwrap();
            match *remote {
                None => {
                    log::debug!("endpoint: pinning remote to {src}");
                    *remote = Some(src);
                }
                Some(r) if r != src => {
                    log::trace!("endpoint: dropping datagram from unexpected source {src}");
                    return None;
                }
                Some(_) => {}
            }
        }

        packet::decode(&buf[..n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;

    #[test]
    fn first_recv_pins_remote() {
        let server = DatagramEndpoint::bind(0).unwrap();
        let server_addr = server.socket.local_addr().unwrap();

        let client = DatagramEndpoint::connect(server_addr).unwrap();
        assert!(client.send_packet(PacketType::Syn, 0, &[]));

        let pkt = server.recv().unwrap();
        assert_eq!(pkt.typ, PacketType::Syn);
        assert!(server.remote().is_some());
    }

    #[test]
    fn mismatched_source_is_rejected() {
        let server = DatagramEndpoint::bind(0).unwrap();
        let server_addr = server.socket.local_addr().unwrap();

        let client_a = DatagramEndpoint::connect(server_addr).unwrap();
        let client_b = DatagramEndpoint::connect(server_addr).unwrap();

        assert!(client_a.send_packet(PacketType::Syn, 1, &[]));
        assert!(server.recv().is_some());

        assert!(client_b.send_packet(PacketType::Syn, 2, &[]));
        assert!(server.recv().is_none());
    }
}
