//! Typed accessors layered over a raw `Storage`. Every value is encoded
//! with `bincode`; callers never see raw bytes.

use node_storage::{SeekDirection, Storage, WriteBatch};
use node_types::{AccountState, Block, BlockHeader, ContractState, Transaction, UInt160, UInt256};
use serde::{Deserialize, Serialize};

use crate::errors::StateError;
use crate::keys;

/// One transfer-history entry for NEP-17 (fungible) or NEP-11
/// (non-fungible) token movements, indexed by account and timestamp.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferRecord {
    pub token: UInt160,
    pub counterparty: Option<UInt160>,
    pub amount_raw: i64,
    pub block_index: u32,
    pub timestamp: u64,
    /// Present only for NEP-11 transfers.
    pub token_id: Option<Vec<u8>>,
}

/// Per-transaction or per-block execution log: every notification emitted
/// and the overall VM halt/fault outcome, kept so `getapplicationlog`-style
/// queries don't require re-executing history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplicationLog {
    pub trigger: String,
    pub vm_state: String,
    pub gas_consumed: i64,
    pub notifications: Vec<NotificationRecord>,
    pub exception: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub contract: UInt160,
    pub event_name: String,
    pub state_json: serde_json::Value,
}

/// Network magic plus the consistency markers used to detect a mismatched
/// or partially-written database at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bookkeeping {
    pub network_magic: u32,
    pub genesis_hash: UInt256,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StateError> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, StateError> {
    Ok(bincode::deserialize(bytes)?)
}

pub struct ChainState<'s> {
    storage: &'s dyn Storage,
}

impl<'s> ChainState<'s> {
    pub fn new(storage: &'s dyn Storage) -> Self {
        Self { storage }
    }

    pub fn header_by_hash(&self, hash: &UInt256) -> Result<Option<BlockHeader>, StateError> {
        match self.storage.get(&keys::header_by_hash(hash)) {
            Ok(bytes) => Ok(Some(decode(&bytes)?)),
            Err(node_storage::StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn header_by_index(&self, index: u32) -> Result<Option<BlockHeader>, StateError> {
        let hash = match self.storage.get(&keys::header_hash_by_index(index)) {
            Ok(bytes) => UInt256::from_bytes(&bytes).map_err(|_| StateError::Storage(node_storage::StorageError::NotFound))?,
            Err(node_storage::StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.header_by_hash(&hash)
    }

    pub fn block_by_hash(&self, hash: &UInt256) -> Result<Option<Block>, StateError> {
        match self.storage.get(&keys::block_by_hash(hash)) {
            Ok(bytes) => Ok(Some(decode(&bytes)?)),
            Err(node_storage::StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn put_block(&self, block: &Block) -> Result<(), StateError> {
        let hash = node_crypto::hash256(&bincode::serialize(&block.header)?);
        let mut batch = WriteBatch::new();
        batch.put(keys::header_by_hash(&hash), encode(&block.header)?);
        batch.put(keys::header_hash_by_index(block.index()), hash.as_bytes().to_vec());
        batch.put(keys::block_by_hash(&hash), encode(block)?);
        for (i, tx) in block.transactions.iter().enumerate() {
            let tx_hash = node_crypto::hash256(&bincode::serialize(tx)?);
            batch.put(keys::tx_by_hash(&tx_hash), encode(tx)?);
            batch.put(
                keys::tx_height_index(&tx_hash),
                encode(&(block.index(), i as u32))?,
            );
        }
        batch.put(keys::current_height(), block.index().to_be_bytes().to_vec());
        self.storage.write_batch(batch)?;
        Ok(())
    }

    pub fn transaction_by_hash(&self, hash: &UInt256) -> Result<Option<(Transaction, u32, u32)>, StateError> {
        let tx = match self.storage.get(&keys::tx_by_hash(hash)) {
            Ok(bytes) => decode::<Transaction>(&bytes)?,
            Err(node_storage::StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let (block_index, index_in_block) = match self.storage.get(&keys::tx_height_index(hash)) {
            Ok(bytes) => decode::<(u32, u32)>(&bytes)?,
            Err(node_storage::StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some((tx, block_index, index_in_block)))
    }

    pub fn put_application_log_for_tx(&self, tx_hash: &UInt256, log: &ApplicationLog) -> Result<(), StateError> {
        self.storage.put(&keys::applog_by_tx(tx_hash), &encode(log)?)?;
        Ok(())
    }

    pub fn application_log_for_tx(&self, tx_hash: &UInt256) -> Result<Option<ApplicationLog>, StateError> {
        match self.storage.get(&keys::applog_by_tx(tx_hash)) {
            Ok(bytes) => Ok(Some(decode(&bytes)?)),
            Err(node_storage::StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn put_application_log_for_block(&self, block_hash: &UInt256, log: &ApplicationLog) -> Result<(), StateError> {
        self.storage.put(&keys::applog_by_block(block_hash), &encode(log)?)?;
        Ok(())
    }

    pub fn contract_state(&self, hash: &UInt160) -> Result<Option<ContractState>, StateError> {
        match self.storage.get(&keys::contract_state(hash)) {
            Ok(bytes) => Ok(Some(decode(&bytes)?)),
            Err(node_storage::StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn put_contract_state(&self, hash: &UInt160, state: &ContractState) -> Result<(), StateError> {
        self.storage.put(&keys::contract_state(hash), &encode(state)?)?;
        Ok(())
    }

    pub fn delete_contract_state(&self, hash: &UInt160) -> Result<(), StateError> {
        self.storage.delete(&keys::contract_state(hash))?;
        Ok(())
    }

    /// Every deployed contract, in storage-key order.
    pub fn all_contracts(&self) -> Result<Vec<ContractState>, StateError> {
        let mut out = Vec::new();
        for (_, value) in self.storage.seek(&keys::contract_state_prefix(), SeekDirection::Forward) {
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    pub fn account_balance(&self, token: &UInt160, account: &UInt160) -> Result<AccountState, StateError> {
        match self.storage.get(&keys::account_state(token, account)) {
            Ok(bytes) => Ok(decode(&bytes)?),
            Err(node_storage::StorageError::NotFound) => Ok(AccountState::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn put_account_balance(&self, token: &UInt160, account: &UInt160, state: &AccountState) -> Result<(), StateError> {
        self.storage.put(&keys::account_state(token, account), &encode(state)?)?;
        Ok(())
    }

    pub fn record_transfer(
        &self,
        token: &UInt160,
        account: &UInt160,
        timestamp: u64,
        seq: u32,
        record: &TransferRecord,
    ) -> Result<(), StateError> {
        let key = keys::transfer_history_entry(token, account, timestamp, seq);
        self.storage.put(&key, &encode(record)?)?;
        Ok(())
    }

    /// Transfer history for `account` and `token`, oldest first.
    pub fn transfer_history(&self, token: &UInt160, account: &UInt160) -> Result<Vec<TransferRecord>, StateError> {
        let prefix = keys::transfer_history_prefix(token, account);
        let mut out = Vec::new();
        for (_, value) in self.storage.seek(&prefix, SeekDirection::Forward) {
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    pub fn mpt_root_at(&self, height: u32) -> Result<Option<UInt256>, StateError> {
        match self.storage.get(&keys::mpt_root_by_height(height)) {
            Ok(bytes) => Ok(Some(UInt256::from_bytes(&bytes).map_err(|_| StateError::Storage(node_storage::StorageError::NotFound))?)),
            Err(node_storage::StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn put_mpt_root_at(&self, height: u32, root: &UInt256) -> Result<(), StateError> {
        self.storage.put(&keys::mpt_root_by_height(height), root.as_bytes())?;
        Ok(())
    }

    pub fn current_height(&self) -> Result<Option<u32>, StateError> {
        match self.storage.get(&keys::current_height()) {
            Ok(bytes) => Ok(Some(u32::from_be_bytes(bytes.try_into().map_err(|_| {
                StateError::Storage(node_storage::StorageError::NotFound)
            })?))),
            Err(node_storage::StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn bookkeeping(&self) -> Result<Option<Bookkeeping>, StateError> {
        match self.storage.get(&keys::bookkeeping()) {
            Ok(bytes) => Ok(Some(decode(&bytes)?)),
            Err(node_storage::StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn put_bookkeeping(&self, bk: &Bookkeeping) -> Result<(), StateError> {
        self.storage.put(&keys::bookkeeping(), &encode(bk)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_storage::MemoryStorage;
    use node_types::{BlockHeader, Witness};

    fn sample_header(index: u32) -> BlockHeader {
        BlockHeader {
            version: 0,
            prev_hash: UInt256::ZERO,
            merkle_root: UInt256::ZERO,
            timestamp: 0,
            nonce: 0,
            index,
            primary_index: 0,
            next_consensus: UInt160::ZERO,
            witness: Witness::default(),
            state_root: None,
        }
    }

    #[test]
    fn put_and_get_block_round_trip() {
        let storage = MemoryStorage::new();
        let state = ChainState::new(&storage);
        let block = Block { header: sample_header(1), transactions: vec![] };
        state.put_block(&block).unwrap();
        let hash = node_crypto::hash256(&bincode::serialize(&block.header).unwrap());
        assert_eq!(state.block_by_hash(&hash).unwrap().unwrap().index(), 1);
        assert_eq!(state.header_by_index(1).unwrap().unwrap().index, 1);
        assert_eq!(state.current_height().unwrap(), Some(1));
    }

    #[test]
    fn account_balance_defaults_to_zero() {
        let storage = MemoryStorage::new();
        let state = ChainState::new(&storage);
        let balance = state.account_balance(&UInt160::ZERO, &UInt160::ZERO).unwrap();
        assert_eq!(balance.balance, node_types::Fixed8::ZERO);
    }

    #[test]
    fn transfer_history_orders_by_timestamp() {
        let storage = MemoryStorage::new();
        let state = ChainState::new(&storage);
        let token = UInt160::ZERO;
        let account = UInt160([1u8; 20]);
        for ts in [300u64, 100, 200] {
            let record = TransferRecord {
                token,
                counterparty: None,
                amount_raw: 1,
                block_index: 0,
                timestamp: ts,
                token_id: None,
            };
            state.record_transfer(&token, &account, ts, 0, &record).unwrap();
        }
        let history = state.transfer_history(&token, &account).unwrap();
        let timestamps: Vec<u64> = history.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
    }
}
