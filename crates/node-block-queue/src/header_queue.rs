//! Same sparse-window structure as `BlockQueue`, applied to headers instead
//! of full blocks: header-first sync receives batches of up to 2000
//! headers per response and they can arrive from more than one peer, so
//! this reorders them before the sync driver stores them and starts
//! requesting the matching block bodies.

use node_types::BlockHeader;

use crate::errors::BlockQueueError;
use crate::sparse::{Indexed, SparseQueue};

impl Indexed for BlockHeader {
    fn queue_index(&self) -> u32 {
        self.index
    }
}

pub struct HeaderQueue {
    window: SparseQueue<BlockHeader>,
}

impl HeaderQueue {
    pub fn new(capacity: usize, next_index: u32) -> Self {
        Self { window: SparseQueue::new(capacity, next_index) }
    }

    pub fn watermark(&self) -> u32 {
        self.window.watermark()
    }

    pub fn queued_len(&self) -> usize {
        self.window.len()
    }

    pub fn put(&self, header: BlockHeader) -> Result<(), BlockQueueError> {
        self.window.put(header)
    }

    /// Returns the contiguous run of headers starting at the watermark, in
    /// order, for the caller to validate and store. Empty if the next
    /// expected header hasn't arrived yet.
    pub fn drain_contiguous(&self) -> Vec<BlockHeader> {
        self.window.drain_contiguous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_types::{UInt160, UInt256, Witness};

    fn header(index: u32) -> BlockHeader {
        BlockHeader {
            version: 0,
            prev_hash: UInt256::ZERO,
            merkle_root: UInt256::ZERO,
            timestamp: index as u64,
            nonce: 0,
            index,
            primary_index: 0,
            next_consensus: UInt160::ZERO,
            witness: Witness::default(),
            state_root: None,
        }
    }

    #[test]
    fn headers_drain_in_order_once_contiguous() {
        let q = HeaderQueue::new(16, 0);
        q.put(header(1)).unwrap();
        q.put(header(0)).unwrap();
        q.put(header(2)).unwrap();
        let drained = q.drain_contiguous();
        let indices: Vec<u32> = drained.iter().map(|h| h.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(q.watermark(), 3);
    }
}
