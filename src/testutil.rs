//! In-process lossy/duplicating relay used only by the test suite (spec
//! §8: loss-tolerance and duplicate-tolerance properties). Not compiled
//! into the library proper.

use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread;

use rand::Rng;

/// Sits between a client and the real server, forwarding datagrams in
/// both directions while independently dropping each one with
/// probability `loss_rate` and duplicating with probability `dup_rate`.
/// Connect to `relay.addr` instead of the server's real address to run a
/// transfer through it. SYN/SYN_ACK/FIN/FIN_ACK always pass through
/// untouched; only DATA/ACK traffic is subject to `loss_rate`/`dup_rate`
/// (see `forward` below).
pub struct LossyRelay {
    pub addr: SocketAddr,
}

impl LossyRelay {
    pub fn spawn(upstream: SocketAddr, loss_rate: f64, dup_rate: f64) -> LossyRelay {
        let client_side = UdpSocket::bind("127.0.0.1:0").unwrap();
        let server_side = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = client_side.local_addr().unwrap();

        let client_peer: Arc<Mutex<Option<SocketAddr>>> = Arc::new(Mutex::new(None));

        {
            let client_side = client_side.try_clone().unwrap();
            let server_side = server_side.try_clone().unwrap();
            let client_peer = Arc::clone(&client_peer);
            thread::spawn(move || {
                let mut buf = [0u8; crate::packet::MAX_PACKET];
                loop {
                    let Ok((n, src)) = client_side.recv_from(&mut buf) else {
                        break;
                    };
                    *client_peer.lock().unwrap() = Some(src);
                    forward(&server_side, upstream, &buf[..n], loss_rate, dup_rate);
                }
            });
        }

        {
            let client_side = client_side.try_clone().unwrap();
            let client_peer = Arc::clone(&client_peer);
            thread::spawn(move || {
                let mut buf = [0u8; crate::packet::MAX_PACKET];
                loop {
                    let Ok((n, _src)) = server_side.recv_from(&mut buf) else {
                        break;
                    };
                    let Some(peer) = *client_peer.lock().unwrap() else {
                        continue;
                    };
                    forward(&client_side, peer, &buf[..n], loss_rate, dup_rate);
                }
            });
        }

        LossyRelay { addr }
    }
}

/// Handshake and teardown packets are never retransmitted by either peer
/// (§4.3) and `recv` has no timeout, so dropping one would hang the
/// transfer forever rather than exercise loss tolerance. The relay only
/// subjects DATA/ACK traffic — the packets the loss-tolerance and
/// duplicate-tolerance properties (§8) are actually about — to loss and
/// duplication, and always forwards SYN/SYN_ACK/FIN/FIN_ACK untouched.
fn forward(socket: &UdpSocket, to: SocketAddr, bytes: &[u8], loss_rate: f64, dup_rate: f64) {
    use crate::packet::PacketType;

    let is_control = matches!(
        crate::packet::decode(bytes).map(|p| p.typ),
        Some(PacketType::Syn | PacketType::SynAck | PacketType::Fin | PacketType::FinAck)
    );

    let mut rng = rand::thread_rng();

    if !is_control && rng.gen_bool(loss_rate) {
        return;
    }

    let _ = socket.send_to(bytes, to);
    if !is_control && rng.gen_bool(dup_rate) {
        let _ = socket.send_to(bytes, to);
    }
}

/// A pair of already-pinned loopback endpoints, for module-level tests
/// that exercise one side's window/sender logic directly without going
/// through the full `listen`/`connect` handshake.
pub fn endpoint_pair() -> (crate::endpoint::DatagramEndpoint, crate::endpoint::DatagramEndpoint) {
    use crate::endpoint::DatagramEndpoint;
    use crate::packet::PacketType;

    let a = DatagramEndpoint::bind(0).unwrap();
    let a_addr = a.local_addr();

    let b = DatagramEndpoint::connect(a_addr).unwrap();

    assert!(b.send_packet(PacketType::Syn, 0, &[]));
    let _ = a.recv().unwrap(); // pins a's remote to b

    (a, b)
}
