//! In-memory bookkeeping for requests awaiting enough notary signatures.
//! One entry per main-transaction hash; removed once relayed (main path
//! taken) or once its fallback's valid-until-block is reached (fallback
//! path taken).

use std::collections::{HashMap, VecDeque};

use node_types::{Transaction, UInt256};

pub struct PendingRequest {
    pub main_tx: Transaction,
    pub fallback_tx: Transaction,
    pub signatures: HashMap<u8, [u8; 64]>,
    pub relayed: bool,
}

pub struct NotaryPool {
    pending: HashMap<UInt256, PendingRequest>,
    order: VecDeque<UInt256>,
    capacity: usize,
}

impl NotaryPool {
    pub fn new(capacity: usize) -> Self {
        Self { pending: HashMap::new(), order: VecDeque::new(), capacity: capacity.max(1) }
    }

    /// Admits a new request, evicting the oldest still-tracked one if the
    /// pool is already at capacity. Returns `false` if `main_hash` is
    /// already tracked.
    pub fn insert_request(&mut self, main_hash: UInt256, main_tx: Transaction, fallback_tx: Transaction) -> bool {
        if self.pending.contains_key(&main_hash) {
            return false;
        }
        while self.pending.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else { break };
            self.pending.remove(&oldest);
        }
        self.pending.insert(
            main_hash,
            PendingRequest { main_tx, fallback_tx, signatures: HashMap::new(), relayed: false },
        );
        self.order.push_back(main_hash);
        true
    }

    pub fn add_signature(&mut self, main_hash: &UInt256, notary_index: u8, signature: [u8; 64]) -> Option<&PendingRequest> {
        let entry = self.pending.get_mut(main_hash)?;
        entry.signatures.insert(notary_index, signature);
        Some(entry)
    }

    pub fn get(&self, main_hash: &UInt256) -> Option<&PendingRequest> {
        self.pending.get(main_hash)
    }

    pub fn mark_relayed(&mut self, main_hash: &UInt256) {
        if let Some(entry) = self.pending.get_mut(main_hash) {
            entry.relayed = true;
        }
    }

    /// Drops every non-relayed request whose fallback is now due (chain
    /// height reached the fallback's `valid_until_block`) and returns their
    /// fallback transactions for submission.
    pub fn expire(&mut self, height: u32) -> Vec<Transaction> {
        let due: Vec<UInt256> = self
            .pending
            .iter()
            .filter(|(_, req)| !req.relayed && height >= req.fallback_tx.valid_until_block)
            .map(|(hash, _)| *hash)
            .collect();
        due.into_iter()
            .filter_map(|hash| {
                self.order.retain(|h| *h != hash);
                self.pending.remove(&hash)
            })
            .map(|req| req.fallback_tx)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_types::{Fixed8, Signer, UInt160, Witness, WitnessScope};

    fn tx(valid_until_block: u32) -> Transaction {
        Transaction {
            version: 0,
            nonce: 0,
            system_fee: Fixed8::ZERO,
            network_fee: Fixed8::ZERO,
            valid_until_block,
            signers: vec![Signer {
                account: UInt160::ZERO,
                scopes: WitnessScope::CalledByEntry,
                allowed_contracts: vec![],
                allowed_groups: vec![],
            }],
            attributes: vec![],
            script: vec![],
            witnesses: vec![Witness::default()],
        }
    }

    #[test]
    fn capacity_evicts_oldest_pending_request() {
        let mut pool = NotaryPool::new(2);
        pool.insert_request(UInt256([1u8; 32]), tx(100), tx(10));
        pool.insert_request(UInt256([2u8; 32]), tx(100), tx(10));
        pool.insert_request(UInt256([3u8; 32]), tx(100), tx(10));

        assert!(pool.get(&UInt256([1u8; 32])).is_none());
        assert!(pool.get(&UInt256([2u8; 32])).is_some());
        assert!(pool.get(&UInt256([3u8; 32])).is_some());
    }

    #[test]
    fn expire_only_drops_requests_past_their_fallback_height_and_not_yet_relayed() {
        let mut pool = NotaryPool::new(10);
        pool.insert_request(UInt256([1u8; 32]), tx(100), tx(10));
        pool.insert_request(UInt256([2u8; 32]), tx(100), tx(20));
        pool.mark_relayed(&UInt256([1u8; 32]));

        let due = pool.expire(15);

        assert_eq!(due.len(), 1);
        assert!(pool.get(&UInt256([1u8; 32])).is_some(), "relayed requests are left for mark_relayed's caller to drop elsewhere");
        assert!(pool.get(&UInt256([2u8; 32])).is_none());
    }
}
