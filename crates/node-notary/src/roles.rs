//! Reads the P2P-notary role membership `RoleManagement::designateAsRole`
//! wrote to storage directly, the same trick `node-consensus` uses for the
//! validator set — no VM invocation just to learn who's allowed to sign.

use node_storage::{SeekDirection, Storage};
use node_types::{PublicKey, UInt160};

use crate::errors::NotaryError;

/// Mirrors `node_native::role_management::Role::P2pNotary`'s tag.
const P2P_NOTARY_ROLE_TAG: u8 = 32;

fn members_prefix() -> Vec<u8> {
    node_state::keys::native_storage(node_native::ids::ROLE_MANAGEMENT_ID, &[b'r', P2P_NOTARY_ROLE_TAG])
}

/// Designated notary members in effect as of `height`: the designation with
/// the largest activation height not exceeding it. Empty before the role
/// has ever been designated.
pub fn designated_notaries(storage: &dyn Storage, height: u32) -> Result<Vec<PublicKey>, NotaryError> {
    let prefix = members_prefix();
    for (key, value) in storage.seek(&prefix, SeekDirection::Backward) {
        if key.len() < prefix.len() + 4 {
            continue;
        }
        let activation = u32::from_be_bytes(key[prefix.len()..prefix.len() + 4].try_into().unwrap());
        if activation <= height {
            return Ok(bincode::deserialize(&value)?);
        }
    }
    Ok(Vec::new())
}

/// A notary committee is identified on-chain by the hash of this encoding,
/// the same simplification `node-consensus` applies to `next_consensus`:
/// checked by hash equality, never by running a script engine.
pub fn notary_account_script(notaries: &[PublicKey]) -> Vec<u8> {
    bincode::serialize(notaries).expect("public key list always serializes")
}

pub fn notary_account_hash(notaries: &[PublicKey]) -> UInt160 {
    node_crypto::hash160(&notary_account_script(notaries))
}

pub fn quorum(notary_count: usize) -> usize {
    let f = notary_count.saturating_sub(1) / 3;
    2 * f + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_is_two_f_plus_one() {
        assert_eq!(quorum(1), 1);
        assert_eq!(quorum(4), 3);
        assert_eq!(quorum(7), 5);
    }

    fn key(byte: u8) -> PublicKey {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        bytes[1] = byte;
        PublicKey::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn account_hash_is_stable_for_the_same_committee() {
        let a = vec![key(1), key(2), key(3)];
        assert_eq!(notary_account_hash(&a), notary_account_hash(&a));
        let b = vec![key(1), key(2)];
        assert_ne!(notary_account_hash(&a), notary_account_hash(&b));
    }
}
