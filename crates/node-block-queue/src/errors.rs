//! Failures a caller can see from `put`: both are the queue protecting its
//! own bounded window, not a statement about the item's validity. Anything
//! the consumer hits while applying a drained block is surfaced through
//! `node_blockchain::BlockchainError` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockQueueError {
    #[error("index {index} already applied (current tip is {tip})")]
    AlreadyApplied { index: u32, tip: u32 },

    #[error("index {index} is beyond the queue's window (capacity {capacity}, next {next})")]
    TooFarAhead { index: u32, capacity: usize, next: u32 },

    #[error(transparent)]
    Blockchain(#[from] node_blockchain::BlockchainError),
}
