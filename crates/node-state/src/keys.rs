//! Key-space layout. Every accessor in `dao` goes through one of these
//! builders so the on-disk layout stays in one place.

use node_types::{UInt160, UInt256};

const HEADER_BY_HASH: u8 = 0x01;
const HEADER_HASH_BY_INDEX: u8 = 0x02;
const BLOCK_BY_HASH: u8 = 0x03;
const TX_BY_HASH: u8 = 0x04;
const TX_HEIGHT_INDEX: u8 = 0x05;
const APPLOG_BY_TX: u8 = 0x06;
const APPLOG_BY_BLOCK: u8 = 0x07;
const CONTRACT_STATE: u8 = 0x08;
const ACCOUNT_STATE: u8 = 0x09;
const TRANSFER_HISTORY: u8 = 0x0a;
const MPT_ROOT_BY_HEIGHT: u8 = 0x0b;
const CURRENT_HEIGHT: u8 = 0x0c;
const BOOKKEEPING: u8 = 0x0d;
const NATIVE_CONTRACT_STORAGE: u8 = 0x0e;
const CONTRACT_STORAGE: u8 = 0x0f;

pub fn header_by_hash(hash: &UInt256) -> Vec<u8> {
    prefixed(HEADER_BY_HASH, hash.as_bytes())
}

pub fn header_hash_by_index(index: u32) -> Vec<u8> {
    prefixed(HEADER_HASH_BY_INDEX, &index.to_be_bytes())
}

pub fn block_by_hash(hash: &UInt256) -> Vec<u8> {
    prefixed(BLOCK_BY_HASH, hash.as_bytes())
}

pub fn tx_by_hash(hash: &UInt256) -> Vec<u8> {
    prefixed(TX_BY_HASH, hash.as_bytes())
}

pub fn tx_height_index(hash: &UInt256) -> Vec<u8> {
    prefixed(TX_HEIGHT_INDEX, hash.as_bytes())
}

pub fn applog_by_tx(hash: &UInt256) -> Vec<u8> {
    prefixed(APPLOG_BY_TX, hash.as_bytes())
}

pub fn applog_by_block(hash: &UInt256) -> Vec<u8> {
    prefixed(APPLOG_BY_BLOCK, hash.as_bytes())
}

pub fn contract_state(hash: &UInt160) -> Vec<u8> {
    prefixed(CONTRACT_STATE, hash.as_bytes())
}

pub fn contract_state_prefix() -> Vec<u8> {
    vec![CONTRACT_STATE]
}

/// A native contract's own storage slot, namespaced by contract id so
/// unrelated contracts can never collide on a key.
pub fn native_storage(contract_id: i32, subkey: &[u8]) -> Vec<u8> {
    let mut key = vec![NATIVE_CONTRACT_STORAGE];
    key.extend_from_slice(&contract_id.to_be_bytes());
    key.extend_from_slice(subkey);
    key
}

pub fn native_storage_prefix(contract_id: i32) -> Vec<u8> {
    let mut key = vec![NATIVE_CONTRACT_STORAGE];
    key.extend_from_slice(&contract_id.to_be_bytes());
    key
}

/// A deployed contract's own instance storage, namespaced by contract hash
/// so two contracts can never collide on a key.
pub fn contract_storage(contract: &UInt160, subkey: &[u8]) -> Vec<u8> {
    let mut key = vec![CONTRACT_STORAGE];
    key.extend_from_slice(contract.as_bytes());
    key.extend_from_slice(subkey);
    key
}

pub fn contract_storage_prefix(contract: &UInt160) -> Vec<u8> {
    let mut key = vec![CONTRACT_STORAGE];
    key.extend_from_slice(contract.as_bytes());
    key
}

pub fn account_state(token: &UInt160, account: &UInt160) -> Vec<u8> {
    let mut key = vec![ACCOUNT_STATE];
    key.extend_from_slice(token.as_bytes());
    key.extend_from_slice(account.as_bytes());
    key
}

/// Key for one transfer-history entry, ordered so a prefix scan on
/// `(token, account)` yields entries in ascending timestamp order.
pub fn transfer_history_entry(token: &UInt160, account: &UInt160, timestamp: u64, seq: u32) -> Vec<u8> {
    let mut key = vec![TRANSFER_HISTORY];
    key.extend_from_slice(token.as_bytes());
    key.extend_from_slice(account.as_bytes());
    key.extend_from_slice(&timestamp.to_be_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

pub fn transfer_history_prefix(token: &UInt160, account: &UInt160) -> Vec<u8> {
    let mut key = vec![TRANSFER_HISTORY];
    key.extend_from_slice(token.as_bytes());
    key.extend_from_slice(account.as_bytes());
    key
}

pub fn mpt_root_by_height(height: u32) -> Vec<u8> {
    prefixed(MPT_ROOT_BY_HEIGHT, &height.to_be_bytes())
}

pub fn current_height() -> Vec<u8> {
    vec![CURRENT_HEIGHT]
}

pub fn bookkeeping() -> Vec<u8> {
    vec![BOOKKEEPING]
}

/// True for keys that belong to the global contract storage tracked by the
/// MPT (contract metadata, account balances, native-contract bookkeeping),
/// false for ledger bookkeeping (headers, blocks, transfer history, chain
/// height) that is never part of the state root.
pub fn is_mpt_tracked(key: &[u8]) -> bool {
    matches!(
        key.first(),
        Some(&CONTRACT_STATE) | Some(&ACCOUNT_STATE) | Some(&NATIVE_CONTRACT_STORAGE) | Some(&CONTRACT_STORAGE)
    )
}

fn prefixed(tag: u8, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + suffix.len());
    key.push(tag);
    key.extend_from_slice(suffix);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn different_tags_never_collide() {
        let h = UInt256::ZERO;
        assert_ne!(header_by_hash(&h), block_by_hash(&h));
        assert_ne!(header_by_hash(&h), tx_by_hash(&h));
    }

    #[test]
    fn height_index_is_big_endian_for_lexicographic_order() {
        let low = header_hash_by_index(1);
        let high = header_hash_by_index(2);
        assert!(low < high);
    }

    #[test]
    fn native_storage_keys_are_namespaced_by_contract_id() {
        let a = native_storage(-1, b"balance");
        let b = native_storage(-2, b"balance");
        assert_ne!(a, b);
        assert!(a.starts_with(&native_storage_prefix(-1)));
    }

    #[test]
    fn mpt_tracking_excludes_ledger_bookkeeping() {
        assert!(is_mpt_tracked(&contract_state(&UInt160::ZERO)));
        assert!(is_mpt_tracked(&account_state(&UInt160::ZERO, &UInt160::ZERO)));
        assert!(is_mpt_tracked(&native_storage(-1, b"x")));
        assert!(is_mpt_tracked(&contract_storage(&UInt160::ZERO, b"x")));
        assert!(!is_mpt_tracked(&current_height()));
        assert!(!is_mpt_tracked(&header_by_hash(&UInt256::ZERO)));
    }
}
