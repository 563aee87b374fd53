//! Builds block 0 and seeds the storage state the first call to
//! `NeoToken::on_persist`/`RoleManagement` needs to have something to elect
//! or designate, since both start from whatever `Blockchain::add_block`
//! finds already on disk before it runs the native on-persist hooks.
//!
//! Without this, `NeoToken::elected()` would run against an empty
//! candidate list at height 0 and commit an empty committee/validator set,
//! leaving consensus and notary with nobody able to ever propose a block.
//! Real vote weight accrues over time through `vote`/`registerCandidate`;
//! this only breaks the chicken-and-egg problem at the very first block by
//! giving the configured standby committee synthetic descending vote
//! counts, so the existing election logic picks them up unmodified.

use std::sync::Arc;

use node_native::ids;
use node_storage::Storage;
use node_types::{Block, BlockHeader, PublicKey, UInt160, UInt256, Witness};

use crate::config::ProtocolConfig;

const P2P_NOTARY_ROLE_TAG: u8 = 32;

fn candidate_key(pubkey: &PublicKey) -> Vec<u8> {
    let mut subkey = b"candidate:".to_vec();
    subkey.extend_from_slice(pubkey.as_bytes());
    node_state::keys::native_storage(ids::NEO_TOKEN_ID, &subkey)
}

fn notary_role_key(activation_height: u32) -> Vec<u8> {
    let mut subkey = vec![b'r', P2P_NOTARY_ROLE_TAG];
    subkey.extend_from_slice(&activation_height.to_be_bytes());
    node_state::keys::native_storage(ids::ROLE_MANAGEMENT_ID, &subkey)
}

/// Writes synthetic candidate votes for the standby committee (so
/// `elected()` picks exactly this list and in this order at height 0) and
/// designates the standby notaries directly, the same storage shape a real
/// `designateAsRole` call at height -1 would have produced.
pub fn seed_standby_roles(storage: &dyn Storage, protocol: &ProtocolConfig) -> Result<(), node_storage::StorageError> {
    let n = protocol.standby_committee.len() as i64;
    for (rank, pubkey) in protocol.standby_committee.iter().enumerate() {
        let votes = n - rank as i64;
        storage.put(&candidate_key(pubkey), &bincode::serialize(&votes).expect("i64 always serializes"))?;
    }
    if !protocol.standby_notaries.is_empty() {
        let key = notary_role_key(0);
        storage.put(&key, &bincode::serialize(&protocol.standby_notaries).expect("key list always serializes"))?;
    }
    Ok(())
}

/// `next_consensus` for the genesis header: the hash of the standby
/// committee taken as the consensus script, since no prior block exists to
/// derive it from.
fn genesis_next_consensus(protocol: &ProtocolConfig) -> UInt160 {
    let validators: Vec<PublicKey> = protocol
        .standby_committee
        .iter()
        .take(protocol.validators_count)
        .copied()
        .collect();
    node_consensus::validators::next_consensus_hash(&validators)
}

pub fn genesis_block(protocol: &ProtocolConfig) -> Block {
    let header = BlockHeader {
        version: 0,
        prev_hash: UInt256::ZERO,
        merkle_root: node_crypto::merkle_root(&[]),
        timestamp: 0,
        nonce: 0,
        index: 0,
        primary_index: 0,
        next_consensus: genesis_next_consensus(protocol),
        witness: Witness::default(),
        state_root: None,
    };
    Block { header, transactions: Vec::new() }
}

/// Seeds the standby committee/notaries and persists block 0, if the chain
/// doesn't already have one. Idempotent across restarts.
pub fn ensure_genesis(
    blockchain: &Arc<node_blockchain::Blockchain>,
    protocol: &ProtocolConfig,
) -> Result<(), GenesisError> {
    if blockchain.tip_height()?.is_some() {
        return Ok(());
    }
    seed_standby_roles(blockchain.storage(), protocol)?;
    blockchain.add_block(genesis_block(protocol), None)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum GenesisError {
    #[error(transparent)]
    Storage(#[from] node_storage::StorageError),
    #[error(transparent)]
    Blockchain(#[from] node_blockchain::errors::BlockchainError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_blockchain::Blockchain;
    use node_bus::EventBus;
    use node_storage::MemoryStorage;

    fn key(byte: u8) -> PublicKey {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        bytes[1] = byte;
        PublicKey::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn genesis_seeds_a_non_empty_validator_set() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let chain = Arc::new(Blockchain::new(storage, EventBus::new()));
        let protocol = ProtocolConfig {
            standby_committee: vec![key(1), key(2), key(3), key(4)],
            validators_count: 4,
            ..ProtocolConfig::default()
        };

        ensure_genesis(&chain, &protocol).unwrap();

        assert_eq!(chain.tip_height().unwrap(), Some(0));
        let validators = node_consensus::validators::current_validators(chain.storage()).unwrap();
        assert_eq!(validators.len(), 4);
        assert_eq!(validators[0], key(1));
    }

    #[test]
    fn ensure_genesis_is_idempotent() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let chain = Arc::new(Blockchain::new(storage, EventBus::new()));
        let protocol = ProtocolConfig { standby_committee: vec![key(1)], validators_count: 1, ..ProtocolConfig::default() };

        ensure_genesis(&chain, &protocol).unwrap();
        ensure_genesis(&chain, &protocol).unwrap();

        assert_eq!(chain.tip_height().unwrap(), Some(0));
    }
}
