//! Failure taxonomy for the transport layer. Anything reaching a handler
//! from a remote peer is treated as hostile input: malformed frames and
//! protocol violations disconnect that peer and never panic the task.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("frame exceeds maximum payload size ({0} bytes)")]
    FrameTooLarge(usize),

    #[error("frame magic {got:#010x} does not match network magic {expected:#010x}")]
    MagicMismatch { expected: u32, got: u32 },

    #[error("checksum mismatch on {command} payload")]
    ChecksumMismatch { command: String },

    #[error("unknown command byte {0:#04x}")]
    UnknownCommand(u8),

    #[error("handshake violation: {0}")]
    Handshake(String),

    #[error("peer {0} is already connected or connecting")]
    DuplicatePeer(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("chain state error: {0}")]
    State(#[from] node_state::StateError),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("send queue closed")]
    QueueClosed,
}
