//! Merkle tree over transaction hashes, used for the block header's
//! `merkle_root` field.

use node_types::UInt256;

use crate::hashing::hash256;

/// Computes the Merkle root of an ordered list of leaf hashes using Neo's
/// pairwise double-SHA256 combine, duplicating the last node on odd levels.
pub fn merkle_root(leaves: &[UInt256]) -> UInt256 {
    if leaves.is_empty() {
        return UInt256::ZERO;
    }
    let mut level: Vec<UInt256> = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| combine(&pair[0], &pair[1]))
            .collect();
    }
    level[0]
}

fn combine(left: &UInt256, right: &UInt256) -> UInt256 {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&left.0);
    buf.extend_from_slice(&right.0);
    hash256(&buf)
}

/// A Merkle proof (sibling path) for one leaf, usable to verify inclusion
/// without the full leaf set.
#[derive(Clone, Debug)]
pub struct MerkleProof {
    pub leaf_index: usize,
    /// `(sibling_hash, sibling_is_on_right)` from leaf level to root.
    pub path: Vec<(UInt256, bool)>,
}

pub fn merkle_proof(leaves: &[UInt256], leaf_index: usize) -> Option<MerkleProof> {
    if leaf_index >= leaves.len() {
        return None;
    }
    let mut level: Vec<UInt256> = leaves.to_vec();
    let mut index = leaf_index;
    let mut path = Vec::new();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        let sibling_index = index ^ 1;
        path.push((level[sibling_index], sibling_index > index));
        level = level
            .chunks(2)
            .map(|pair| combine(&pair[0], &pair[1]))
            .collect();
        index /= 2;
    }
    Some(MerkleProof {
        leaf_index,
        path,
    })
}

pub fn verify_proof(leaf: UInt256, proof: &MerkleProof, root: UInt256) -> bool {
    let mut current = leaf;
    for (sibling, sibling_on_right) in &proof.path {
        current = if *sibling_on_right {
            combine(&current, sibling)
        } else {
            combine(sibling, &current)
        };
    }
    current == root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_leaf_root_is_the_leaf() {
        let leaf = UInt256([1u8; 32]);
        assert_eq!(merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn empty_root_is_zero() {
        assert_eq!(merkle_root(&[]), UInt256::ZERO);
    }

    #[test]
    fn proof_verifies_for_every_leaf() {
        let leaves: Vec<UInt256> = (0..5u8).map(|i| UInt256([i; 32])).collect();
        let root = merkle_root(&leaves);
        for (i, leaf) in leaves.iter().enumerate() {
            let proof = merkle_proof(&leaves, i).unwrap();
            assert!(verify_proof(*leaf, &proof, root));
        }
    }

    #[test]
    fn proof_fails_for_wrong_leaf() {
        let leaves: Vec<UInt256> = (0..4u8).map(|i| UInt256([i; 32])).collect();
        let root = merkle_root(&leaves);
        let proof = merkle_proof(&leaves, 0).unwrap();
        assert!(!verify_proof(UInt256([99u8; 32]), &proof, root));
    }
}
