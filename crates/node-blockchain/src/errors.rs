//! Failure taxonomy for `add_block`. Rejections (steps before persistence
//! begins) leave the chain untouched and are reported to the caller as
//! ordinary validation failures; anything that fails once persistence is
//! underway is a programming bug; the chain must not be left half-applied,
//! so these are surfaced as fatal.

use node_types::{ClassifiedError, ErrorKind, UInt256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("structural check failed: {0}")]
    Structural(String),

    #[error("header does not chain onto the current tip: {0}")]
    HeaderChain(String),

    #[error("transaction {hash} rejected: {reason}")]
    TransactionRejected { hash: UInt256, reason: String },

    #[error("transaction {0} appears more than once in this block")]
    DuplicateTransaction(UInt256),

    #[error("transaction {0} already recorded on chain")]
    AlreadyOnChain(UInt256),

    #[error("storage error: {0}")]
    Storage(#[from] node_storage::StorageError),

    #[error("state error: {0}")]
    State(#[from] node_state::StateError),

    #[error("native contract error: {0}")]
    Native(#[from] node_native::NativeError),

    #[error("trie error: {0}")]
    Mpt(#[from] node_mpt::MptError),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl BlockchainError {
    /// True for the checks that run before any storage mutation and simply
    /// reject the block: the caller can drop it and move on.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            BlockchainError::Structural(_)
                | BlockchainError::HeaderChain(_)
                | BlockchainError::TransactionRejected { .. }
                | BlockchainError::DuplicateTransaction(_)
                | BlockchainError::AlreadyOnChain(_)
        )
    }
}

impl From<BlockchainError> for ClassifiedError {
    fn from(e: BlockchainError) -> Self {
        let kind = if e.is_rejection() {
            ErrorKind::Validation
        } else {
            ErrorKind::Programming
        };
        ClassifiedError::new(kind, "add_block_fault", e.to_string())
    }
}
