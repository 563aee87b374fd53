//! Reads the validator set `NeoToken::on_persist` wrote to storage, and
//! builds the deterministic next-consensus script/hash the committee's
//! blocks are expected to carry.

use node_storage::Storage;
use node_types::{PublicKey, UInt160};

use crate::errors::ConsensusError;

/// Mirrors `NeoToken`'s own storage key so this crate never needs a VM
/// invocation just to learn who's allowed to sign the next block.
fn validators_key() -> Vec<u8> {
    node_state::keys::native_storage(node_native::ids::NEO_TOKEN_ID, b"validators")
}

/// Current validator set, ordered exactly as `NeoToken::on_persist` last
/// wrote it (the order `(h - v) mod N` indexes into). Empty before the
/// first `on_persist` call (i.e. before block 0 is even persisted).
pub fn current_validators(storage: &dyn Storage) -> Result<Vec<PublicKey>, ConsensusError> {
    match storage.get(&validators_key()) {
        Ok(bytes) => Ok(bincode::deserialize(&bytes)?),
        Err(node_storage::StorageError::NotFound) => Ok(Vec::new()),
        Err(e) => Err(ConsensusError::State(node_state::StateError::Storage(e))),
    }
}

/// A validator set is identified on-chain by the hash of this encoding,
/// not by an executable multisig script — the same simplification this
/// workspace already applies to block header witnesses (`next_consensus`
/// is checked by hash equality, never by running a script engine).
pub fn consensus_script(validators: &[PublicKey]) -> Vec<u8> {
    bincode::serialize(validators).expect("public key list always serializes")
}

pub fn next_consensus_hash(validators: &[PublicKey]) -> UInt160 {
    node_crypto::hash160(&consensus_script(validators))
}

/// `Primary = validators[(h - v) mod N]`, computed with `rem_euclid` so a
/// view number larger than the height (possible only transiently during a
/// pathological run of change-views) doesn't panic on underflow.
pub fn primary_index(height: u32, view: u8, validator_count: usize) -> u8 {
    let n = validator_count as i64;
    (((height as i64) - (view as i64)).rem_euclid(n)) as u8
}

pub fn quorum(validator_count: usize) -> usize {
    let f = (validator_count.saturating_sub(1)) / 3;
    2 * f + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> PublicKey {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        bytes[1] = byte;
        PublicKey::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn primary_rotates_with_height_and_resets_with_view() {
        let n = 4;
        assert_eq!(primary_index(0, 0, n), 0);
        assert_eq!(primary_index(1, 0, n), 1);
        assert_eq!(primary_index(1, 1, n), 0);
        assert_eq!(primary_index(4, 0, n), 0);
    }

    #[test]
    fn quorum_is_two_f_plus_one() {
        assert_eq!(quorum(1), 1);
        assert_eq!(quorum(4), 3);
        assert_eq!(quorum(7), 5);
    }

    #[test]
    fn next_consensus_hash_is_stable_for_the_same_set() {
        let validators = vec![key(1), key(2), key(3)];
        assert_eq!(next_consensus_hash(&validators), next_consensus_hash(&validators));
        let other = vec![key(1), key(2)];
        assert_ne!(next_consensus_hash(&validators), next_consensus_hash(&other));
    }
}
