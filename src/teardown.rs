//! Sender-initiated teardown shared by all four variants. No
//! retransmission: FIN is sent exactly once. The read side, however,
//! must drain past any stale datagrams still sitting in the socket's
//! receive queue (a duplicated or late ACK from the data phase) rather
//! than mistake one of those for the FIN_ACK.

use crate::endpoint::DatagramEndpoint;
use crate::packet::PacketType;

pub fn send_fin_and_await_ack(endpoint: &DatagramEndpoint) -> bool {
    log::debug!("teardown: sending FIN");
    if !endpoint.send_packet(PacketType::Fin, 0, &[]) {
        log::debug!("teardown: failed to send FIN");
        return false;
    }

    loop {
        match endpoint.recv() {
            Some(packet) if packet.typ == PacketType::FinAck => {
                log::debug!("teardown: received FIN_ACK");
                return true;
            }
            Some(packet) => {
                log::trace!("teardown: discarding stale {:?} while awaiting FIN_ACK", packet.typ);
            }
            None => {
                log::debug!("teardown: did not receive FIN_ACK");
                return false;
            }
        }
    }
}
