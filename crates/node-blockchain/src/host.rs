//! Bridges `node_vm::ExecutionEngine` into chain state for exactly one
//! transaction: general contract storage reads/writes, witness checks
//! against that transaction's already-verified signers, and notification
//! collection for the application log.
//!
//! `System.Contract.Call` isn't implemented below the VM yet, so every
//! running script is its own top-level frame; `calling_script_hash` is
//! always `None` and there is no committee/primary resolution beyond the
//! header's `next_consensus`.

use node_state::dao::NotificationRecord;
use node_storage::Storage;
use node_types::UInt160;
use node_vm::interop::{FindOptions, InteropHost};
use node_vm::StackItem;

/// One step of rollback: the full storage key and the value it held
/// immediately before this transaction's first write to it (`None` meaning
/// the key didn't exist). Recorded once per key, on first touch, so replaying
/// the log in order restores pre-transaction state regardless of how many
/// times the key was written afterward.
struct UndoEntry {
    key: Vec<u8>,
    previous: Option<Vec<u8>>,
}

pub struct BlockchainHost<'a> {
    storage: &'a dyn Storage,
    current_script_hash: UInt160,
    verified_accounts: Vec<UInt160>,
    block_height: u32,
    block_timestamp: u64,
    touched: std::collections::HashSet<Vec<u8>>,
    undo_log: Vec<UndoEntry>,
    notifications: Vec<NotificationRecord>,
}

impl<'a> BlockchainHost<'a> {
    pub fn new(
        storage: &'a dyn Storage,
        current_script_hash: UInt160,
        verified_accounts: Vec<UInt160>,
        block_height: u32,
        block_timestamp: u64,
    ) -> Self {
        Self {
            storage,
            current_script_hash,
            verified_accounts,
            block_height,
            block_timestamp,
            touched: std::collections::HashSet::new(),
            undo_log: Vec::new(),
            notifications: Vec::new(),
        }
    }

    fn record_undo(&mut self, full_key: &[u8]) {
        if self.touched.insert(full_key.to_vec()) {
            let previous = self.storage.get(full_key).ok();
            self.undo_log.push(UndoEntry {
                key: full_key.to_vec(),
                previous,
            });
        }
    }

    /// Replays the undo log back onto storage, in reverse so the earliest
    /// recorded value (the pre-transaction one) wins if a key was restored
    /// more than once. Called by the blockchain pipeline on VM fault or
    /// out-of-gas; does nothing to keys untouched by this transaction, so
    /// other transactions' already-applied writes in the same block survive.
    pub fn undo(self) {
        for entry in self.undo_log.into_iter().rev() {
            match entry.previous {
                Some(value) => {
                    let _ = self.storage.put(&entry.key, &value);
                }
                None => {
                    let _ = self.storage.delete(&entry.key);
                }
            }
        }
    }

    pub fn into_notifications(self) -> Vec<NotificationRecord> {
        self.notifications
    }
}

impl<'a> InteropHost for BlockchainHost<'a> {
    fn check_witness(&self, account: &UInt160) -> bool {
        self.verified_accounts.contains(account)
    }

    fn current_script_hash(&self) -> UInt160 {
        self.current_script_hash
    }

    fn calling_script_hash(&self) -> Option<UInt160> {
        None
    }

    fn block_height(&self) -> u32 {
        self.block_height
    }

    fn block_timestamp(&self) -> u64 {
        self.block_timestamp
    }

    fn storage_get(&self, contract: &UInt160, key: &[u8]) -> Option<Vec<u8>> {
        self.storage.get(&node_state::keys::contract_storage(contract, key)).ok()
    }

    fn storage_put(&mut self, contract: &UInt160, key: &[u8], value: &[u8]) {
        let full_key = node_state::keys::contract_storage(contract, key);
        self.record_undo(&full_key);
        let _ = self.storage.put(&full_key, value);
    }

    fn storage_delete(&mut self, contract: &UInt160, key: &[u8]) {
        let full_key = node_state::keys::contract_storage(contract, key);
        self.record_undo(&full_key);
        let _ = self.storage.delete(&full_key);
    }

    fn storage_find(&self, contract: &UInt160, prefix: &[u8], opts: &FindOptions) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut full_prefix = node_state::keys::contract_storage_prefix(contract);
        full_prefix.extend_from_slice(prefix);
        let strip = node_state::keys::contract_storage_prefix(contract).len();
        self.storage
            .seek(&full_prefix, node_storage::SeekDirection::Forward)
            .map(|(k, v)| {
                let key = if opts.remove_prefix { k[strip..].to_vec() } else { k };
                match (opts.keys_only, opts.values_only) {
                    (true, _) => (key, Vec::new()),
                    (_, true) => (Vec::new(), v),
                    _ => (key, v),
                }
            })
            .collect()
    }

    fn notify(&mut self, contract: &UInt160, event_name: &str, state: Vec<StackItem>) {
        let state_json = node_vm::serialize::to_json(&StackItem::array(state)).unwrap_or(serde_json::Value::Null);
        self.notifications.push(NotificationRecord {
            contract: *contract,
            event_name: event_name.to_string(),
            state_json,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_storage::MemoryStorage;

    #[test]
    fn check_witness_matches_verified_accounts() {
        let storage = MemoryStorage::new();
        let account = UInt160([1u8; 20]);
        let host = BlockchainHost::new(&storage, UInt160::ZERO, vec![account], 0, 0);
        assert!(host.check_witness(&account));
        assert!(!host.check_witness(&UInt160([2u8; 20])));
    }

    #[test]
    fn undo_restores_pre_transaction_value_including_absence() {
        let storage = MemoryStorage::new();
        let contract = UInt160([9u8; 20]);
        storage.put(&node_state::keys::contract_storage(&contract, b"existing"), b"before").unwrap();

        let mut host = BlockchainHost::new(&storage, UInt160::ZERO, vec![], 0, 0);
        host.storage_put(&contract, b"existing", b"after");
        host.storage_put(&contract, b"new", b"value");
        host.undo();

        assert_eq!(storage.get(&node_state::keys::contract_storage(&contract, b"existing")).unwrap(), b"before");
        assert!(storage.get(&node_state::keys::contract_storage(&contract, b"new")).is_err());
    }

    #[test]
    fn notify_collects_json_encoded_state() {
        let storage = MemoryStorage::new();
        let contract = UInt160([1u8; 20]);
        let mut host = BlockchainHost::new(&storage, UInt160::ZERO, vec![], 0, 0);
        host.notify(&contract, "Transfer", vec![StackItem::int(42)]);
        let notifications = host.into_notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].event_name, "Transfer");
    }
}
