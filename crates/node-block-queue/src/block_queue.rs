//! Staging area between the P2P layer and `Blockchain::add_block`: blocks
//! can arrive out of order (parallel fetch from multiple peers, or racing
//! against header sync) but the chain only ever advances one index at a
//! time, so this is where the reordering happens.

use std::sync::Arc;

use node_blockchain::Blockchain;
use node_mempool::Mempool;
use node_types::Block;

use crate::errors::BlockQueueError;
use crate::sparse::{Indexed, SparseQueue};

pub const DEFAULT_CAPACITY: usize = 2000;

impl Indexed for Block {
    fn queue_index(&self) -> u32 {
        self.index()
    }
}

pub struct BlockQueue {
    chain: Arc<Blockchain>,
    mempool: Option<Arc<Mempool>>,
    window: SparseQueue<Block>,
}

impl BlockQueue {
    pub fn new(chain: Arc<Blockchain>, mempool: Option<Arc<Mempool>>, capacity: usize) -> Result<Self, BlockQueueError> {
        let next_index = chain.tip_height()?.map(|h| h + 1).unwrap_or(0);
        Ok(Self {
            chain,
            mempool,
            window: SparseQueue::new(capacity, next_index),
        })
    }

    /// The index the queue still needs next; everything below it is already
    /// on chain.
    pub fn watermark(&self) -> u32 {
        self.window.watermark()
    }

    pub fn queued_len(&self) -> usize {
        self.window.len()
    }

    /// True once the window holds as many blocks as it can without the
    /// next contiguous one — callers (the P2P sync driver) should stop
    /// requesting further blocks until `drain_ready` makes room.
    pub fn is_saturated(&self) -> bool {
        self.window.len() >= self.window.capacity().saturating_sub(1)
    }

    pub fn put(&self, block: Block) -> Result<(), BlockQueueError> {
        self.window.put(block)
    }

    /// Applies every block the window can deliver contiguously right now,
    /// advancing the chain tip one block per call to `add_block`. Returns
    /// the number of blocks applied. Stops at (and returns) the first
    /// `add_block` failure; blocks already drained before the failure stay
    /// applied, and the failing block is dropped rather than re-queued,
    /// since a rejected block won't become valid on retry.
    pub fn drain_ready(&self) -> Result<usize, BlockQueueError> {
        let ready = self.window.drain_contiguous();
        let mut applied = 0;
        for block in ready {
            self.chain.add_block(block, self.mempool.as_deref())?;
            applied += 1;
        }
        Ok(applied)
    }
}

/// Runs `drain_ready` each time `wake` fires, logging and continuing past
/// rejected blocks rather than stopping the task. Intended to be spawned
/// once per node alongside the P2P listener; `wake` is signalled by the
/// `Block` message handler and by `drain_ready` callers that want another
/// pass after a fetch completes.
pub async fn run(queue: Arc<BlockQueue>, mut wake: tokio::sync::mpsc::Receiver<()>) {
    while wake.recv().await.is_some() {
        loop {
            match queue.drain_ready() {
                Ok(0) => break,
                Ok(n) => {
                    tracing::debug!(applied = n, watermark = queue.watermark(), "drained queued blocks");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "block queue drain stopped on error");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_bus::EventBus;
    use node_storage::{MemoryStorage, Storage};
    use node_types::{BlockHeader, UInt256, Witness};

    fn committee_script() -> Vec<u8> {
        vec![0x0c, b'c', b'o', b'm', b'm', b'i', b't', b't', b'e', b'e']
    }

    fn committee_witness() -> Witness {
        Witness { invocation_script: vec![0x01], verification_script: committee_script() }
    }

    fn header(index: u32, prev_hash: UInt256) -> BlockHeader {
        BlockHeader {
            version: 0,
            prev_hash,
            merkle_root: node_crypto::merkle_root(&[]),
            timestamp: index as u64 + 1,
            nonce: 0,
            index,
            primary_index: 0,
            next_consensus: node_crypto::hash160(&committee_script()),
            witness: if index == 0 { Witness::default() } else { committee_witness() },
            state_root: None,
        }
    }

    fn chained_block(index: u32, prev: &BlockHeader) -> Block {
        let prev_hash = node_crypto::hash256(&bincode::serialize(prev).unwrap());
        Block { header: header(index, prev_hash), transactions: vec![] }
    }

    #[test]
    fn out_of_order_blocks_drain_and_apply_once_contiguous() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let bus = EventBus::new();
        let chain = Arc::new(Blockchain::new(storage, bus));
        let queue = BlockQueue::new(chain.clone(), None, 8).unwrap();

        let genesis = header(0, UInt256::ZERO);
        let block1 = chained_block(1, &genesis);
        let block2 = chained_block(2, &block1.header);

        queue.put(Block { header: genesis, transactions: vec![] }).unwrap();
        queue.put(block2).unwrap();
        queue.put(block1).unwrap();

        let applied = queue.drain_ready().unwrap();
        assert_eq!(applied, 3);
        assert_eq!(chain.tip_height().unwrap(), Some(2));
        assert_eq!(queue.watermark(), 3);
    }

    #[test]
    fn saturation_reports_true_once_window_nearly_full() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let bus = EventBus::new();
        let chain = Arc::new(Blockchain::new(storage, bus));
        let queue = BlockQueue::new(chain, None, 4).unwrap();
        let genesis = header(0, UInt256::ZERO);
        let b1 = chained_block(1, &genesis);
        let b2 = chained_block(2, &b1.header);
        let b3 = chained_block(3, &b2.header);
        queue.put(b1).unwrap();
        queue.put(b2).unwrap();
        queue.put(b3).unwrap();
        assert!(queue.is_saturated());
    }
}
