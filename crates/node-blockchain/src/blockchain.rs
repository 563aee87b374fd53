//! The chain itself. `Blockchain::add_block` is the only path by which the
//! ledger height advances; everything else in this crate exists to support
//! that one call.
//!
//! The pipeline, in order:
//! 1. structural checks (size caps, duplicate transactions, merkle root)
//! 2. header chaining against the current tip
//! 3. per-transaction verification (witness, expiry, balance, dedup against
//!    already-committed history)
//! 4. `OnPersist` over every native contract
//! 5. each transaction's entry script, executed against a block-scoped
//!    storage overlay with its own undo log
//! 6. `PostPersist` over every native contract
//! 7. the global contract storage subset of this block's writes folded into
//!    the state trie
//! 8. one atomic commit of the overlay, the trie's new nodes, and the block
//!    itself, followed by the mempool/event-bus notifications
//!
//! Steps 1-3 reject the block without touching storage. From step 4 onward
//! a failure can't be "rejected" — persistence is already underway — so it
//! surfaces as a fatal `BlockchainError` (see that module's `is_rejection`).

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use node_bus::EventBus;
use node_mempool::{verify, Mempool};
use node_native::{InvocationContext, NativeRegistry};
use node_state::dao::{ApplicationLog, ChainState};
use node_storage::{CachedStore, Storage, StorageLayer, WriteOp};
use node_types::{Block, BlockHeader, UInt160, UInt256};
use node_vm::{CallFlags, ExecutionEngine, VmState};

use crate::errors::BlockchainError;
use crate::host::BlockchainHost;
use crate::overlay::OverlayStorage;

/// Serialized block size cap; matches the per-transaction cap's order of
/// magnitude scaled up for a full block's worth of transactions.
pub const MAX_BLOCK_SIZE: usize = 2 * 1024 * 1024;
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 50_000;

pub struct Blockchain {
    storage: Arc<dyn Storage>,
    registry: NativeRegistry,
    bus: EventBus,
    /// Held for the duration of `add_block`: exactly one block is applied
    /// at a time, so readers of `storage` never see a half-committed block.
    apply_lock: Mutex<()>,
}

impl Blockchain {
    pub fn new(storage: Arc<dyn Storage>, bus: EventBus) -> Self {
        Self {
            storage,
            registry: NativeRegistry::standard(),
            bus,
            apply_lock: Mutex::new(()),
        }
    }

    pub fn tip_height(&self) -> Result<Option<u32>, BlockchainError> {
        Ok(ChainState::new(self.storage.as_ref()).current_height()?)
    }

    pub fn tip_header(&self) -> Result<Option<BlockHeader>, BlockchainError> {
        let state = ChainState::new(self.storage.as_ref());
        match state.current_height()? {
            Some(height) => Ok(state.header_by_index(height)?),
            None => Ok(None),
        }
    }

    /// Read-only view onto chain state for callers (sync/inventory
    /// handling) that need more than the tip, without exposing the raw
    /// storage handle `add_block` serializes writes against.
    pub fn chain_state(&self) -> ChainState<'_> {
        ChainState::new(self.storage.as_ref())
    }

    /// Read-only access to the raw store, for verification that needs the
    /// `Storage` contract directly (mempool admission) rather than the
    /// `ChainState` views built on top of it.
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn add_block(&self, block: Block, mempool: Option<&Mempool>) -> Result<(), BlockchainError> {
        let _guard = self.apply_lock.lock();

        self.check_structural(&block)?;
        let prior_tip = self.check_header_chain(&block.header)?;
        let verified_signers = self.check_transactions(&block)?;

        let raw_storage = self.storage.as_ref();
        let overlay = CachedStore::new(StorageLayer(raw_storage));
        let block_storage = OverlayStorage::new(&overlay);

        let persist_ctx = InvocationContext {
            storage: &block_storage,
            block_height: block.index(),
            block_timestamp: block.header.timestamp,
            calling_script_hash: UInt160::ZERO,
            block_primary: block.header.next_consensus,
            witnesses: &[],
        };
        self.registry.run_on_persist(&persist_ctx)?;

        let log_state = ChainState::new(&block_storage);
        let mut included_hashes = Vec::with_capacity(block.transactions.len());
        for (tx, signers) in block.transactions.iter().zip(verified_signers.iter()) {
            let tx_hash = node_crypto::hash256(&bincode::serialize(tx)?);
            included_hashes.push(tx_hash);
            let entry_hash = node_crypto::script_hash(&tx.script);
            let mut host = BlockchainHost::new(
                &block_storage,
                entry_hash,
                signers.clone(),
                block.index(),
                block.header.timestamp,
            );
            let gas_limit = tx.system_fee.raw().max(0);
            let outcome = {
                let mut engine = ExecutionEngine::new(gas_limit, &mut host);
                let result = engine.execute(tx.script.clone(), entry_hash, CallFlags::ALL);
                (result, engine.gas_consumed())
            };
            let (result, gas_consumed) = outcome;
            let log = match result {
                Ok(VmState::Halt) => ApplicationLog {
                    trigger: "Application".to_string(),
                    vm_state: "HALT".to_string(),
                    gas_consumed,
                    notifications: host.into_notifications(),
                    exception: None,
                },
                Ok(other) => {
                    host.undo();
                    ApplicationLog {
                        trigger: "Application".to_string(),
                        vm_state: format!("{other:?}"),
                        gas_consumed,
                        notifications: Vec::new(),
                        exception: Some("script left the invocation stack non-empty".to_string()),
                    }
                }
                Err(e) => {
                    host.undo();
                    ApplicationLog {
                        trigger: "Application".to_string(),
                        vm_state: "FAULT".to_string(),
                        gas_consumed,
                        notifications: Vec::new(),
                        exception: Some(e.to_string()),
                    }
                }
            };
            log_state.put_application_log_for_tx(&tx_hash, &log)?;
        }

        self.registry.run_post_persist(&persist_ctx)?;

        let mut batch = overlay.drain_to_batch();
        let mut trie_puts = Vec::new();
        let mut trie_deletes = Vec::new();
        for op in batch.ops() {
            match op {
                WriteOp::Put { key, value } if node_state::keys::is_mpt_tracked(key) => {
                    trie_puts.push((key.clone(), value.clone()));
                }
                WriteOp::Delete { key } if node_state::keys::is_mpt_tracked(key) => {
                    trie_deletes.push(key.clone());
                }
                _ => {}
            }
        }

        let tip_root = prior_tip.as_ref().and_then(|h| h.state_root).unwrap_or(UInt256::ZERO);
        let mut trie = node_mpt::Trie::open(raw_storage, tip_root);
        trie.apply_batch(trie_puts, trie_deletes)?;
        let new_root = trie.commit();
        for (key, value) in trie.drain_writes() {
            batch.put(key, value);
        }
        raw_storage.write_batch(batch)?;

        let mut stored_block = block;
        match stored_block.header.state_root {
            Some(expected) if expected != new_root => {
                return Err(BlockchainError::Native(node_native::NativeError::InvalidArgument(format!(
                    "state root mismatch: header claims {expected}, computed {new_root}"
                ))));
            }
            Some(_) => {}
            None => stored_block.header.state_root = Some(new_root),
        }

        let chain_state = ChainState::new(raw_storage);
        chain_state.put_block(&stored_block)?;
        chain_state.put_mpt_root_at(stored_block.index(), &new_root)?;

        if let Some(pool) = mempool {
            pool.on_block_persisted(&included_hashes, stored_block.index());
        }
        self.bus.publish(node_bus::NodeEvent::BlockPersisted {
            block: stored_block.clone(),
            height: stored_block.index(),
        });

        Ok(())
    }

    fn check_structural(&self, block: &Block) -> Result<(), BlockchainError> {
        let size = bincode::serialize(block)?.len();
        if size > MAX_BLOCK_SIZE {
            return Err(BlockchainError::Structural(format!("block size {size} exceeds cap {MAX_BLOCK_SIZE}")));
        }
        if block.transactions.len() > MAX_TRANSACTIONS_PER_BLOCK {
            return Err(BlockchainError::Structural(format!(
                "{} transactions exceeds cap {MAX_TRANSACTIONS_PER_BLOCK}",
                block.transactions.len()
            )));
        }
        let mut seen = HashSet::with_capacity(block.transactions.len());
        let mut leaves = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            let hash = node_crypto::hash256(&bincode::serialize(tx)?);
            if !seen.insert(hash) {
                return Err(BlockchainError::DuplicateTransaction(hash));
            }
            leaves.push(hash);
        }
        let computed_root = node_crypto::merkle_root(&leaves);
        if computed_root != block.header.merkle_root {
            return Err(BlockchainError::Structural(format!(
                "merkle root mismatch: header claims {}, computed {computed_root}",
                block.header.merkle_root
            )));
        }
        Ok(())
    }

    /// Validates `header` chains onto the current tip and returns that
    /// prior header (`None` only for the genesis block).
    fn check_header_chain(&self, header: &BlockHeader) -> Result<Option<BlockHeader>, BlockchainError> {
        let state = ChainState::new(self.storage.as_ref());
        let current_height = state.current_height()?;
        match current_height {
            None => {
                if header.index != 0 || header.prev_hash != UInt256::ZERO {
                    return Err(BlockchainError::HeaderChain("genesis block must have index 0 and zero prev_hash".into()));
                }
                Ok(None)
            }
            Some(height) => {
                let prior = state
                    .header_by_index(height)?
                    .ok_or_else(|| BlockchainError::HeaderChain("current tip header missing from storage".into()))?;
                if header.index != height + 1 {
                    return Err(BlockchainError::HeaderChain(format!(
                        "expected index {}, got {}",
                        height + 1,
                        header.index
                    )));
                }
                let prior_hash = node_crypto::hash256(&bincode::serialize(&prior)?);
                if header.prev_hash != prior_hash {
                    return Err(BlockchainError::HeaderChain("prev_hash does not match current tip".into()));
                }
                if header.timestamp <= prior.timestamp {
                    return Err(BlockchainError::HeaderChain("timestamp does not advance past prior block".into()));
                }
                if header.witness.invocation_script.is_empty() {
                    return Err(BlockchainError::HeaderChain("header witness has no invocation script".into()));
                }
                if node_crypto::hash160(&header.witness.verification_script) != prior.next_consensus {
                    return Err(BlockchainError::HeaderChain("header witness does not match prior block's next_consensus".into()));
                }
                Ok(Some(prior))
            }
        }
    }

    /// Verifies every transaction in `block` against already-committed
    /// chain state and rejects the whole block on the first failure,
    /// returning each transaction's signer accounts for the VM's witness
    /// checks during execution.
    fn check_transactions(&self, block: &Block) -> Result<Vec<Vec<UInt160>>, BlockchainError> {
        let state = ChainState::new(self.storage.as_ref());
        let mut seen = HashSet::with_capacity(block.transactions.len());
        let mut signers = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            let hash = node_crypto::hash256(&bincode::serialize(tx)?);
            if !seen.insert(hash) {
                return Err(BlockchainError::DuplicateTransaction(hash));
            }
            if state.transaction_by_hash(&hash)?.is_some() {
                return Err(BlockchainError::AlreadyOnChain(hash));
            }
            verify::witnesses_present(tx).map_err(|e| reject(hash, e))?;
            verify::not_expired(tx, block.index()).map_err(|e| reject(hash, e))?;
            verify::sender_can_afford(self.storage.as_ref(), tx, block.index()).map_err(|e| reject(hash, e))?;
            signers.push(tx.signers.iter().map(|s| s.account).collect());
        }
        Ok(signers)
    }
}

fn reject(hash: UInt256, e: node_mempool::AdmissionError) -> BlockchainError {
    BlockchainError::TransactionRejected {
        hash,
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_native::gas_token::GasToken;
    use node_storage::MemoryStorage;
    use node_types::{Fixed8, Signer, Transaction, Witness, WitnessScope};

    /// Stand-in committee verification script; its hash160 is used as
    /// `next_consensus` so later blocks can build a header witness that
    /// actually satisfies `check_header_chain`.
    fn committee_script() -> Vec<u8> {
        vec![0x0c, b'c', b'o', b'm', b'm', b'i', b't', b't', b'e', b'e']
    }

    fn committee_witness() -> Witness {
        Witness {
            invocation_script: vec![0x01],
            verification_script: committee_script(),
        }
    }

    fn genesis_header() -> BlockHeader {
        BlockHeader {
            version: 0,
            prev_hash: UInt256::ZERO,
            merkle_root: node_crypto::merkle_root(&[]),
            timestamp: 1,
            nonce: 0,
            index: 0,
            primary_index: 0,
            next_consensus: node_crypto::hash160(&committee_script()),
            witness: Witness::default(),
            state_root: None,
        }
    }

    #[test]
    fn genesis_block_commits_and_advances_height() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let chain = Blockchain::new(storage, EventBus::new());
        let block = Block { header: genesis_header(), transactions: vec![] };
        chain.add_block(block, None).unwrap();
        assert_eq!(chain.tip_height().unwrap(), Some(0));
    }

    #[test]
    fn second_block_must_chain_onto_genesis() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let chain = Blockchain::new(storage, EventBus::new());
        let genesis = Block { header: genesis_header(), transactions: vec![] };
        chain.add_block(genesis.clone(), None).unwrap();

        let mut bad_header = genesis.header.clone();
        bad_header.index = 5;
        bad_header.timestamp = 2;
        let bad_block = Block { header: bad_header, transactions: vec![] };
        let err = chain.add_block(bad_block, None).unwrap_err();
        assert!(matches!(err, BlockchainError::HeaderChain(_)));
    }

    #[test]
    fn duplicate_transaction_in_one_block_is_rejected() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let chain = Blockchain::new(storage, EventBus::new());
        chain.add_block(Block { header: genesis_header(), transactions: vec![] }, None).unwrap();

        let sender = UInt160([1u8; 20]);
        let tx = Transaction {
            version: 0,
            nonce: 1,
            system_fee: Fixed8::ZERO,
            network_fee: Fixed8::ZERO,
            valid_until_block: 100,
            signers: vec![Signer {
                account: sender,
                scopes: WitnessScope::CalledByEntry,
                allowed_contracts: vec![],
                allowed_groups: vec![],
            }],
            attributes: vec![],
            script: vec![0x51],
            witnesses: vec![Witness {
                invocation_script: vec![0x01],
                verification_script: vec![],
            }],
        };
        let hash = node_crypto::hash256(&bincode::serialize(&tx).unwrap());
        let mut header = genesis_header();
        header.index = 1;
        header.timestamp = 2;
        header.prev_hash = node_crypto::hash256(&bincode::serialize(&genesis_header()).unwrap());
        header.merkle_root = node_crypto::merkle_root(&[hash, hash]);
        let block = Block { header, transactions: vec![tx.clone(), tx] };

        let chain = chain;
        let err = chain.add_block(block, None).unwrap_err();
        assert!(matches!(err, BlockchainError::DuplicateTransaction(_)));
    }

    #[test]
    fn transaction_executes_and_updates_native_balance() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let chain = Blockchain::new(storage.clone(), EventBus::new());
        chain.add_block(Block { header: genesis_header(), transactions: vec![] }, None).unwrap();

        let verification_script = vec![0x0c, b'k', b'e', b'y'];
        let account = node_crypto::script_hash(&verification_script);
        let gas = GasToken::new();
        let ctx = InvocationContext {
            storage: storage.as_ref(),
            block_height: 0,
            block_timestamp: 0,
            calling_script_hash: account,
            block_primary: UInt160::ZERO,
            witnesses: &[],
        };
        gas.mint(&ctx, &account, 1_000_000_000).unwrap();

        let tx = Transaction {
            version: 0,
            nonce: 1,
            system_fee: Fixed8::from_raw(10_000_000),
            network_fee: Fixed8::ZERO,
            valid_until_block: 100,
            signers: vec![Signer {
                account,
                scopes: WitnessScope::CalledByEntry,
                allowed_contracts: vec![],
                allowed_groups: vec![],
            }],
            attributes: vec![],
            script: vec![0x11, 0x40], // PushInt1, Ret (halts cleanly)
            witnesses: vec![Witness {
                invocation_script: vec![0x01],
                verification_script,
            }],
        };
        let hash = node_crypto::hash256(&bincode::serialize(&tx).unwrap());
        let mut header = genesis_header();
        header.index = 1;
        header.timestamp = 2;
        header.prev_hash = node_crypto::hash256(&bincode::serialize(&genesis_header()).unwrap());
        header.merkle_root = node_crypto::merkle_root(&[hash]);
        header.witness = committee_witness();
        let block = Block { header, transactions: vec![tx] };

        chain.add_block(block, None).unwrap();
        let log = ChainState::new(storage.as_ref()).application_log_for_tx(&hash).unwrap().unwrap();
        assert_eq!(log.vm_state, "HALT");
    }
}
