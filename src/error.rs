//! Caller-visible failures: only setup failure, receiver buffer overflow,
//! and teardown failure ever reach the caller. Transient datagram errors
//! and in-flight timeouts are handled internally and never constructed as
//! an `Error`.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("socket error binding to port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("socket error connecting to {addr}: {source}")]
    Connect {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("handshake failed: expected {expected}, got {got}")]
    HandshakeFailed {
        expected: &'static str,
        got: &'static str,
    },

    #[error("handshake failed: no valid packet received")]
    HandshakeNoPacket,

    #[error("receiver buffer overflow: wrote past {capacity} bytes")]
    BufferOverflow { capacity: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
