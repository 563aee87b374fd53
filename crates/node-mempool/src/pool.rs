//! The transaction pool itself: admission, capacity-bounded eviction,
//! block-proposal ordering and per-block reconciliation.
//!
//! A single `parking_lot::RwLock` guards the index and priority list, the
//! same pattern `node-storage`'s `MemoryStorage` uses for its map: fast
//! operations happen under the lock, long-running verification (balance
//! lookups, witness checks) runs outside it against a borrowed `Storage`
//! reference and is re-checked under the lock immediately before
//! insertion, since the pool state may have changed in between.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use node_bus::{EventBus, EvictionReason, NodeEvent};
use node_types::{Transaction, UInt256};

use crate::errors::{AdmissionError, MempoolError};
use crate::verify;

pub const DEFAULT_CAPACITY: usize = 50_000;

struct PooledTransaction {
    tx: Transaction,
    size: usize,
    high_priority: bool,
    fee_per_byte: i64,
    added_at: Instant,
    last_broadcast: Option<Instant>,
}

/// Orders the priority list: HighPriority before Normal, then
/// fee-per-byte descending, then hash ascending as a deterministic
/// tiebreak (matches the block-proposal ordering exactly, so the same
/// list serves both eviction and proposal).
#[derive(Clone, Copy, PartialEq, Eq)]
struct OrderKey {
    high_priority: bool,
    fee_per_byte: i64,
    hash: UInt256,
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .high_priority
            .cmp(&self.high_priority)
            .then_with(|| other.fee_per_byte.cmp(&self.fee_per_byte))
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

struct Inner {
    by_hash: HashMap<UInt256, PooledTransaction>,
    order: BTreeSet<OrderKey>,
    /// `conflicts_with[a] = {b, c}` — the tx `a` declared Conflicts against.
    conflicts_with: HashMap<UInt256, HashSet<UInt256>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            by_hash: HashMap::new(),
            order: BTreeSet::new(),
            conflicts_with: HashMap::new(),
        }
    }

    fn order_key(entry: &PooledTransaction, hash: UInt256) -> OrderKey {
        OrderKey {
            high_priority: entry.high_priority,
            fee_per_byte: entry.fee_per_byte,
            hash,
        }
    }

    fn remove(&mut self, hash: &UInt256) -> Option<PooledTransaction> {
        let entry = self.by_hash.remove(hash)?;
        self.order.remove(&Self::order_key(&entry, *hash));
        self.conflicts_with.remove(hash);
        Some(entry)
    }

    fn lowest_priority_hash(&self) -> Option<UInt256> {
        self.order.iter().next_back().map(|k| k.hash)
    }
}

pub struct Mempool {
    inner: RwLock<Inner>,
    capacity: usize,
    fee_per_byte_floor: i64,
    bus: EventBus,
}

impl Mempool {
    pub fn new(capacity: usize, fee_per_byte_floor: i64, bus: EventBus) -> Self {
        Self {
            inner: RwLock::new(Inner::new()),
            capacity,
            fee_per_byte_floor,
            bus,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, hash: &UInt256) -> bool {
        self.inner.read().by_hash.contains_key(hash)
    }

    /// Looks up a still-pending transaction by hash, for `GetData` replies
    /// and consensus proposal assembly — both need the full transaction
    /// body for a hash the pool already admitted, not just a membership
    /// check.
    pub fn get(&self, hash: &UInt256) -> Option<Transaction> {
        self.inner.read().by_hash.get(hash).map(|entry| entry.tx.clone())
    }

    fn hash_of(tx: &Transaction) -> UInt256 {
        node_crypto::hash256(&bincode::serialize(tx).expect("transaction always serializes"))
    }

    /// Runs the admission pipeline in order, checking conflicts and
    /// capacity under the lock and all other checks against `storage`
    /// beforehand.
    pub fn try_admit(&self, storage: &dyn node_storage::Storage, tx: Transaction, block_height: u32) -> Result<UInt256, MempoolError> {
        let hash = Self::hash_of(&tx);
        if self.contains(&hash) {
            return Err(AdmissionError::AlreadyPresent(hash).into());
        }

        verify::witnesses_present(&tx).map_err(MempoolError::from)?;
        let size = verify::tx_size(&tx);
        let floor = verify::current_fee_per_byte_floor(storage, block_height).max(self.fee_per_byte_floor);
        let fee_per_byte = tx.network_fee_per_byte(size);
        verify::network_fee_floor_met(&tx, floor).map_err(MempoolError::from)?;
        verify::not_expired(&tx, block_height).map_err(MempoolError::from)?;
        verify::sender_can_afford(storage, &tx, block_height).map_err(MempoolError::from)?;

        let high_priority = tx.has_high_priority();
        let declared_conflicts: HashSet<UInt256> = tx.conflicts().collect();

        let mut guard = self.inner.write();
        if guard.by_hash.contains_key(&hash) {
            return Err(AdmissionError::AlreadyPresent(hash).into());
        }

        for other in &declared_conflicts {
            if let Some(existing) = guard.by_hash.get(other) {
                if existing.fee_per_byte >= fee_per_byte {
                    return Err(AdmissionError::Conflicts(hash, *other).into());
                }
            }
        }
        // Also reject if an existing pool tx declared conflict against us
        // at an equal-or-higher fee.
        for (other_hash, their_conflicts) in guard.conflicts_with.iter() {
            if their_conflicts.contains(&hash) {
                let their_fee = guard.by_hash.get(other_hash).map(|e| e.fee_per_byte).unwrap_or(i64::MIN);
                if their_fee >= fee_per_byte {
                    return Err(AdmissionError::Conflicts(hash, *other_hash).into());
                }
            }
        }

        // Evict the conflicting transactions we out-bid.
        let to_evict: Vec<UInt256> = declared_conflicts
            .iter()
            .filter(|h| guard.by_hash.contains_key(*h))
            .copied()
            .collect();
        for evicted_hash in to_evict {
            guard.remove(&evicted_hash);
            self.bus.publish(NodeEvent::TransactionEvicted {
                hash: evicted_hash,
                reason: EvictionReason::CapacityPressure,
            });
        }

        if guard.by_hash.len() >= self.capacity {
            if let Some(lowest) = guard.lowest_priority_hash() {
                let should_evict = guard
                    .by_hash
                    .get(&lowest)
                    .map(|e| !e.high_priority && (e.fee_per_byte < fee_per_byte || (e.fee_per_byte == fee_per_byte && high_priority)))
                    .unwrap_or(false);
                if should_evict {
                    guard.remove(&lowest);
                    self.bus.publish(NodeEvent::TransactionEvicted {
                        hash: lowest,
                        reason: EvictionReason::CapacityPressure,
                    });
                } else {
                    return Err(AdmissionError::Conflicts(hash, lowest).into());
                }
            }
        }

        let entry = PooledTransaction {
            tx,
            size,
            high_priority,
            fee_per_byte,
            added_at: Instant::now(),
            last_broadcast: None,
        };
        guard.order.insert(Inner::order_key(&entry, hash));
        guard.conflicts_with.insert(hash, declared_conflicts);
        guard.by_hash.insert(hash, entry);
        drop(guard);

        self.bus.publish(NodeEvent::TransactionAdmitted { hash });
        Ok(hash)
    }

    /// Block-proposal ordering: highest priority first, bounded to
    /// `max_count` entries.
    pub fn propose(&self, max_count: usize) -> Vec<Transaction> {
        let guard = self.inner.read();
        guard
            .order
            .iter()
            .take(max_count)
            .filter_map(|k| guard.by_hash.get(&k.hash).map(|e| e.tx.clone()))
            .collect()
    }

    /// Per-block reconciliation, part one: drop everything included in the
    /// new block and everything expired as of its height. Re-verification
    /// of the remainder is the caller's job since it needs a storage
    /// snapshot; see `reverify_all`.
    pub fn on_block_persisted(&self, included: &[UInt256], new_height: u32) {
        let mut guard = self.inner.write();
        for hash in included {
            if guard.remove(hash).is_some() {
                self.bus.publish(NodeEvent::TransactionEvicted {
                    hash: *hash,
                    reason: EvictionReason::IncludedInBlock,
                });
            }
        }
        let expired: Vec<UInt256> = guard
            .by_hash
            .iter()
            .filter(|(_, e)| e.tx.valid_until_block <= new_height)
            .map(|(h, _)| *h)
            .collect();
        for hash in expired {
            guard.remove(&hash);
            self.bus.publish(NodeEvent::TransactionEvicted {
                hash,
                reason: EvictionReason::Expired,
            });
        }
    }

    /// Conservative re-verification: re-runs the full admission pipeline
    /// (minus the already-in-pool check) for every remaining transaction
    /// against the post-block state, evicting anything that no longer
    /// passes. A conservative implementation is allowed to re-check
    /// everything rather than tracking which checks depend on which state
    /// keys; this does that.
    pub fn reverify_all(&self, storage: &dyn node_storage::Storage, height: u32) {
        let snapshot: Vec<(UInt256, Transaction)> = {
            let guard = self.inner.read();
            guard.by_hash.iter().map(|(h, e)| (*h, e.tx.clone())).collect()
        };
        for (hash, tx) in snapshot {
            let floor = verify::current_fee_per_byte_floor(storage, height).max(self.fee_per_byte_floor);
            let still_valid = verify::not_expired(&tx, height).is_ok()
                && verify::network_fee_floor_met(&tx, floor).is_ok()
                && verify::sender_can_afford(storage, &tx, height).is_ok();
            if !still_valid {
                let mut guard = self.inner.write();
                if guard.remove(&hash).is_some() {
                    self.bus.publish(NodeEvent::TransactionEvicted {
                        hash,
                        reason: EvictionReason::ConflictsWithChain,
                    });
                }
            }
        }
    }

    /// Transactions not broadcast (or never broadcast) within `interval`,
    /// bounded to `max_count`; marks them as broadcast now.
    pub fn due_for_retransmission(&self, interval: Duration, max_count: usize) -> Vec<Transaction> {
        let now = Instant::now();
        let mut guard = self.inner.write();
        let due: Vec<UInt256> = guard
            .by_hash
            .iter()
            .filter(|(_, e)| e.last_broadcast.map(|t| now.duration_since(t) >= interval).unwrap_or(true))
            .map(|(h, _)| *h)
            .take(max_count)
            .collect();
        let mut out = Vec::with_capacity(due.len());
        for hash in due {
            if let Some(entry) = guard.by_hash.get_mut(&hash) {
                entry.last_broadcast = Some(now);
                out.push(entry.tx.clone());
            }
        }
        out
    }

    pub fn age_of(&self, hash: &UInt256) -> Option<Duration> {
        self.inner.read().by_hash.get(hash).map(|e| e.added_at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_native::{gas_token::GasToken, InvocationContext};
    use node_storage::MemoryStorage;
    use node_types::{Fixed8, Signer, UInt160, Witness, WitnessScope};

    fn signed_tx(nonce: u32, network_fee: i64, valid_until_block: u32, account: UInt160) -> Transaction {
        Transaction {
            version: 0,
            nonce,
            system_fee: Fixed8::ZERO,
            network_fee: Fixed8::from_raw(network_fee),
            valid_until_block,
            signers: vec![Signer {
                account,
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
        }
    }

    fn funded_account(storage: &MemoryStorage, account: UInt160) {
        let gas = GasToken::new();
        let ctx = InvocationContext {
            storage,
            block_height: 0,
            block_timestamp: 0,
            calling_script_hash: account,
            block_primary: UInt160::ZERO,
            witnesses: &[],
        };
        gas.mint(&ctx, &account, 1_000_000_000).unwrap();
    }

    #[tokio::test]
    async fn admits_and_proposes_in_fee_order() {
        let storage = MemoryStorage::new();
        let bus = EventBus::new();
        let pool = Mempool::new(DEFAULT_CAPACITY, 0, bus);
        let a = UInt160([1u8; 20]);
        let b = UInt160([2u8; 20]);
        funded_account(&storage, a);
        funded_account(&storage, b);

        pool.try_admit(&storage, signed_tx(1, 2000, 100, a), 0).unwrap();
        pool.try_admit(&storage, signed_tx(2, 5000, 100, b), 0).unwrap();

        let proposed = pool.propose(10);
        assert_eq!(proposed.len(), 2);
        assert!(proposed[0].network_fee.raw() >= proposed[1].network_fee.raw());
    }

    #[tokio::test]
    async fn duplicate_admission_is_rejected() {
        let storage = MemoryStorage::new();
        let bus = EventBus::new();
        let pool = Mempool::new(DEFAULT_CAPACITY, 0, bus);
        let a = UInt160([1u8; 20]);
        funded_account(&storage, a);
        let tx = signed_tx(1, 2000, 100, a);
        pool.try_admit(&storage, tx.clone(), 0).unwrap();
        assert!(pool.try_admit(&storage, tx, 0).is_err());
    }

    #[tokio::test]
    async fn block_persisted_evicts_included_and_expired() {
        let storage = MemoryStorage::new();
        let bus = EventBus::new();
        let pool = Mempool::new(DEFAULT_CAPACITY, 0, bus);
        let a = UInt160([1u8; 20]);
        let b = UInt160([2u8; 20]);
        funded_account(&storage, a);
        funded_account(&storage, b);
        let included = pool.try_admit(&storage, signed_tx(1, 2000, 100, a), 0).unwrap();
        pool.try_admit(&storage, signed_tx(2, 2000, 1, b), 0).unwrap();

        pool.on_block_persisted(&[included], 5);
        assert_eq!(pool.len(), 0);
    }

    #[tokio::test]
    async fn insufficient_balance_is_rejected() {
        let storage = MemoryStorage::new();
        let bus = EventBus::new();
        let pool = Mempool::new(DEFAULT_CAPACITY, 0, bus);
        let poor = UInt160([9u8; 20]);
        let result = pool.try_admit(&storage, signed_tx(1, 2000, 100, poor), 0);
        assert!(result.is_err());
    }
}
