//! Failure taxonomy for consensus message handling. A malformed or
//! unverifiable message from a peer never stalls the round; it's logged
//! and dropped, since a faulty or malicious validator is exactly what the
//! 2f+1 threshold is supposed to tolerate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("blockchain error: {0}")]
    Blockchain(#[from] node_blockchain::BlockchainError),

    #[error("state error: {0}")]
    State(#[from] node_state::StateError),

    #[error("validator index {0} out of range for a committee of size {1}")]
    UnknownValidator(u8, usize),

    #[error("signature does not verify against validator {0}'s key")]
    BadSignature(u8),

    #[error("message for height {got} does not match the active round's height {expected}")]
    StaleHeight { expected: u32, got: u32 },

    #[error("node holds no validator key, cannot participate in consensus")]
    NotAValidator,
}
