//! Reorders out-of-order arrivals from the network layer into the strictly
//! sequential stream `Blockchain::add_block` requires, and the equivalent
//! staging step for header-first sync.

pub mod block_queue;
pub mod errors;
pub mod header_queue;
pub mod sparse;

pub use block_queue::{BlockQueue, DEFAULT_CAPACITY};
pub use errors::BlockQueueError;
pub use header_queue::HeaderQueue;
