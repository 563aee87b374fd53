//! Optional garbage collection: deletes nodes unreachable from any
//! retained root older than a horizon. Two retention policies are
//! supported: keep every root back to `horizon_height`, or keep only the
//! single latest root (appropriate for nodes that never serve historical
//! state proofs).

use std::collections::HashSet;

use node_storage::{SeekDirection, Storage};
use node_types::UInt256;

use crate::errors::MptError;
use crate::node::TrieNode;
use crate::trie::Trie;

const NODE_KEY_PREFIX: &[u8] = b"mpt:node:";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetentionMode {
    /// Keep all roots from `horizon_height` onward; older roots' exclusive
    /// nodes are collected.
    KeepSince(u32),
    /// Keep only the most recent root; every other reachable set is
    /// collected as soon as a newer root is committed.
    KeepOnlyLatest,
}

/// Marks every node reachable from `roots` and deletes everything else
/// under the trie node key prefix. Returns the number of nodes removed.
pub fn collect_garbage(storage: &dyn Storage, roots: &[UInt256]) -> Result<usize, MptError> {
    let mut reachable: HashSet<UInt256> = HashSet::new();
    for root in roots {
        if *root == UInt256::ZERO {
            continue;
        }
        mark_reachable(storage, *root, &mut reachable)?;
    }

    let mut removed = 0;
    let mut batch = node_storage::WriteBatch::new();
    for (key, _) in storage.seek(NODE_KEY_PREFIX, SeekDirection::Forward) {
        if key.len() < NODE_KEY_PREFIX.len() + 32 {
            continue;
        }
        let hash_bytes = &key[NODE_KEY_PREFIX.len()..];
        if let Ok(hash) = UInt256::from_bytes(hash_bytes) {
            if !reachable.contains(&hash) {
                batch.delete(key);
                removed += 1;
            }
        }
    }
    if !batch.is_empty() {
        storage.write_batch(batch).map_err(|_| MptError::Corrupt("gc batch commit failed".into()))?;
    }
    Ok(removed)
}

fn mark_reachable(storage: &dyn Storage, hash: UInt256, reachable: &mut HashSet<UInt256>) -> Result<(), MptError> {
    if !reachable.insert(hash) {
        return Ok(());
    }
    let trie = Trie::open(storage, hash);
    mark_node(&trie, &TrieNode::Hash(hash), reachable)
}

fn mark_node(trie: &Trie<'_>, node: &TrieNode, reachable: &mut HashSet<UInt256>) -> Result<(), MptError> {
    let resolved = trie.resolve_for_gc(node)?;
    match resolved {
        TrieNode::Leaf { .. } | TrieNode::Empty => Ok(()),
        TrieNode::Extension { child, .. } => {
            let h = child.hash();
            if h != UInt256::ZERO && reachable.insert(h) {
                mark_node(trie, &child, reachable)?;
            }
            Ok(())
        }
        TrieNode::Branch { children, .. } => {
            for child in children.iter().flatten() {
                let h = child.hash();
                if h != UInt256::ZERO && reachable.insert(h) {
                    mark_node(trie, child, reachable)?;
                }
            }
            Ok(())
        }
        TrieNode::Hash(_) => unreachable!("resolved above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_storage::MemoryStorage;

    #[test]
    fn gc_keeps_only_reachable_nodes() {
        let storage = MemoryStorage::new();
        let root_a = {
            let mut trie = Trie::open(&storage, UInt256::ZERO);
            trie.put(b"a", b"1".to_vec()).unwrap();
            let root = trie.commit();
            for (k, v) in trie.drain_writes() {
                storage.put(&k, &v).unwrap();
            }
            root
        };
        let _root_b = {
            let mut trie = Trie::open(&storage, root_a);
            trie.put(b"b", b"2".to_vec()).unwrap();
            let root = trie.commit();
            for (k, v) in trie.drain_writes() {
                storage.put(&k, &v).unwrap();
            }
            root
        };

        collect_garbage(&storage, &[root_a]).unwrap();
        let reopened = Trie::open(&storage, root_a);
        assert_eq!(reopened.get(b"a").unwrap(), Some(b"1".to_vec()));
    }
}
