//! Failure taxonomy for notary request handling. Like consensus messages,
//! a bad request or signature from a peer is logged and dropped rather
//! than treated as fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotaryError {
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("state error: {0}")]
    State(#[from] node_state::StateError),

    #[error("mempool error: {0}")]
    Mempool(#[from] node_mempool::MempoolError),

    #[error("main transaction does not name the designated notary committee as a signer")]
    WrongNotaryAccount,

    #[error("fallback transaction's valid-until-block must be lower than the main transaction's")]
    FallbackNotEarlier,

    #[error("signer index {0} is not a designated notary")]
    UnknownNotary(u8),

    #[error("signature does not verify against notary {0}'s key")]
    BadSignature(u8),
}
