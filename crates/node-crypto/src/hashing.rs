//! SHA256 / double-SHA256 / RIPEMD160(SHA256) and SHA3 helpers.
//!
//! `hash256` is the "long hash" used for blocks, transactions and Merkle
//! roots; `hash160` is the "short hash" used for script/account identifiers.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

use node_types::{UInt160, UInt256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Double-SHA256, Neo's "long hash".
pub fn hash256(data: &[u8]) -> UInt256 {
    UInt256(sha256(&sha256(data)))
}

/// RIPEMD160(SHA256(data)), Neo's "short hash".
pub fn hash160(data: &[u8]) -> UInt160 {
    let sha = sha256(data);
    let mut hasher = Ripemd160::new();
    hasher.update(sha);
    let out: [u8; 20] = hasher.finalize().into();
    UInt160(out)
}

/// Script-hash of a verification script, the authorizing identity of a
/// witness.
pub fn script_hash(verification_script: &[u8]) -> UInt160 {
    hash160(verification_script)
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash256_is_double_sha256() {
        let data = b"neo";
        let expected = UInt256(sha256(&sha256(data)));
        assert_eq!(hash256(data), expected);
    }

    #[test]
    fn hash160_is_ripemd_of_sha256() {
        let data = b"neo";
        let h = hash160(data);
        assert_eq!(h.0.len(), 20);
    }

    #[test]
    fn deterministic() {
        assert_eq!(hash256(b"a"), hash256(b"a"));
        assert_ne!(hash256(b"a"), hash256(b"b"));
    }
}
