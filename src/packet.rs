//! Wire format: a fixed header followed by a variable-length payload,
//! protected by a one's-complement checksum.

/// Maximum size of an encoded packet, header included.
pub const MAX_PACKET: usize = 10240;

/// `type` (2) + `checksum` (2) + `num` (4) + `len` (4).
pub const HEADER_LEN: usize = 12;

/// Largest payload that still fits under `MAX_PACKET`.
pub const MAX_PAYLOAD: usize = MAX_PACKET - HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Data,
    Ack,
    Syn,
    SynAck,
    Fin,
    FinAck,
}

impl PacketType {
    fn to_wire(self) -> u16 {
        match self {
            PacketType::Data => 0,
            PacketType::Ack => 1,
            PacketType::Syn => 2,
            PacketType::SynAck => 3,
            PacketType::Fin => 4,
            PacketType::FinAck => 5,
        }
    }

    fn from_wire(v: u16) -> Option<PacketType> {
        match v {
            0 => Some(PacketType::Data),
            1 => Some(PacketType::Ack),
            2 => Some(PacketType::Syn),
            3 => Some(PacketType::SynAck),
            4 => Some(PacketType::Fin),
            5 => Some(PacketType::FinAck),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub typ: PacketType,
    /// Sequence number (DATA), ack number (ACK), or zero (control packets).
    pub num: u32,
    pub payload: Vec<u8>,
}

fn round_up_2(n: usize) -> usize {
    (n + 1) & !1
}

/// One's-complement 16-bit sum over `buf`, which must have even length.
fn checksum(buf: &[u8]) -> u16 {
    debug_assert_eq!(buf.len() % 2, 0);

    let mut sum: u32 = 0;
    for chunk in buf.chunks_exact(2) {
        sum += u16::from_le_bytes([chunk[0], chunk[1]]) as u32;
        if sum & 0xFFFF_0000 != 0 {
            sum &= 0xFFFF;
            sum += 1;
        }
    }
    !(sum as u16)
}

/// Encode `(type, num, payload)` into a checksummed, 2-byte-aligned buffer.
///
/// The on-wire `len` field records the *unaligned* header+payload size; the
/// buffer itself is padded to an even length so the checksum is well
/// defined, matching `original_source/packet.cpp`.
pub fn encode(typ: PacketType, num: u32, payload: &[u8]) -> Vec<u8> {
    let unaligned_len = HEADER_LEN + payload.len();
    let aligned_len = round_up_2(unaligned_len);

    let mut buf = vec![0u8; aligned_len];
    buf[0..2].copy_from_slice(&typ.to_wire().to_le_bytes());
    // checksum field (buf[2..4]) stays zero for the checksum pass below.
    buf[4..8].copy_from_slice(&num.to_le_bytes());
    buf[8..12].copy_from_slice(&(unaligned_len as u32).to_le_bytes());
    buf[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);

    let sum = checksum(&buf);
    buf[2..4].copy_from_slice(&sum.to_le_bytes());

    buf
}

/// Decode and validate a packet. Returns `None` on any malformed or
/// corrupted input — never an error, since a bad datagram is an expected,
/// silently-dropped occurrence.
pub fn decode(bytes: &[u8]) -> Option<Packet> {
    if bytes.len() < HEADER_LEN {
        return None;
    }

    let typ = PacketType::from_wire(u16::from_le_bytes([bytes[0], bytes[1]]))?;
    let num = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;

    if len == 0 || len < HEADER_LEN || len > bytes.len() {
        return None;
    }

    let aligned_len = round_up_2(len);
    if aligned_len > bytes.len() {
        return None;
    }

    if checksum(&bytes[..aligned_len]) != 0 {
        return None;
    }

    let payload = bytes[HEADER_LEN..len].to_vec();
    Some(Packet { typ, num, payload })
}
