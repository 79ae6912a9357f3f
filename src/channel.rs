//! The public contract shared by all four variants. `Channel` is a sum
//! type, not a trait object with virtual retransmit hooks — the variants
//! differ in thread structure, not just policy, so there is nothing
//! meaningful to share behind a common base beyond the two operations
//! below.

use std::sync::Arc;

use crate::endpoint::DatagramEndpoint;
use crate::error::Result;
use crate::gbn::Gbn;
use crate::reno::Reno;
use crate::sr::Sr;
use crate::stopwait::StopWait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    StopWait,
    Gbn,
    Sr,
    Reno,
}

#[derive(Debug)]
pub enum Channel {
    StopWait(StopWait),
    Gbn(Gbn),
    Sr(Sr),
    Reno(Reno),
}

impl Channel {
    pub(crate) fn new(endpoint: DatagramEndpoint, variant: Variant) -> Channel {
        let endpoint = Arc::new(endpoint);
        match variant {
            Variant::StopWait => Channel::StopWait(StopWait::new(endpoint)),
            Variant::Gbn => Channel::Gbn(Gbn::new(endpoint)),
            Variant::Sr => Channel::Sr(Sr::new(endpoint)),
            Variant::Reno => Channel::Reno(Reno::new(endpoint)),
        }
    }

    /// Blocks until `buf` has been fully delivered and acknowledged, then
    /// tears down the connection. Returns `false` only on teardown failure
    /// (a missing FIN_ACK) — every other failure in the data phase is
    /// retried internally and never surfaces.
    pub fn send_all(&self, buf: &[u8]) -> bool {
        match self {
            Channel::StopWait(c) => c.send_all(buf),
            Channel::Gbn(c) => c.send_all(buf),
            Channel::Sr(c) => c.send_all(buf),
            Channel::Reno(c) => c.send_all(buf),
        }
    }

    /// Blocks until FIN; returns the number of bytes written into `buf`.
    /// Fails only if delivery would overflow `buf`.
    pub fn recv_all(&self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Channel::StopWait(c) => c.recv_all(buf),
            Channel::Gbn(c) => c.recv_all(buf),
            Channel::Sr(c) => c.recv_all(buf),
            Channel::Reno(c) => c.recv_all(buf),
        }
    }
}
