//! Error types for the inner-network protocol layer.

/// Errors raised while encoding or decoding a [`crate::Packet`].
///
/// Decode errors never panic the connection task; the owning connection
/// logs the error, treats the stream as corrupted and closes it.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// A sequential read ran past the end of the packet body.
    #[error("packet truncated: needed {needed} byte(s) at offset {offset}, {remaining} left")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    /// A string field did not contain valid UTF-8.
    #[error("invalid utf-8 in string field at offset {offset}")]
    InvalidString { offset: usize },
    /// A received frame body was too short to carry the two opcode bytes.
    #[error("frame body of {len} byte(s) is too short for the opcode prefix")]
    MissingOpcodes { len: usize },
    /// A packet grew past what the 16-bit length prefix can describe.
    #[error("packet of {len} bytes exceeds the {max} byte frame limit")]
    Oversize { len: usize, max: usize },
    /// An enum discriminant on the wire had no known mapping.
    #[error("unknown discriminant 0x{value:02x} for {field}")]
    UnknownDiscriminant { field: &'static str, value: u8 },
}

/// Errors surfaced by connections, links and the listener.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A send was attempted on a connection that is no longer active.
    /// The connection never retries; reconnect policy belongs to the owner.
    #[error("connection is not active")]
    NotConnected,
}
