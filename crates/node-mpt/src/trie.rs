//! The trie itself: root-keyed lookups, single-key insert/delete, and a
//! batched-update entry point that applies many key changes in one pass
//! before recomputing hashes, so a block's worth of storage writes costs
//! one rehash of the touched path, not one per key.

use std::collections::HashMap;

use node_storage::Storage;
use node_types::UInt256;

use crate::errors::MptError;
use crate::node::{bytes_to_nibbles, common_prefix_len, TrieNode, BRANCH_WIDTH};

const NODE_KEY_PREFIX: &[u8] = b"mpt:node:";

fn node_storage_key(hash: &UInt256) -> Vec<u8> {
    let mut key = NODE_KEY_PREFIX.to_vec();
    key.extend_from_slice(hash.as_bytes());
    key
}

/// A Merkle-Patricia Trie rooted at a specific hash. Reads resolve `Hash`
/// placeholders lazily from `storage`; writes accumulate in-memory until
/// `commit` persists every touched node and returns the new root.
pub struct Trie<'s> {
    storage: &'s dyn Storage,
    root: TrieNode,
    dirty: HashMap<UInt256, TrieNode>,
}

impl<'s> Trie<'s> {
    pub fn open(storage: &'s dyn Storage, root_hash: UInt256) -> Self {
        let root = if root_hash == UInt256::ZERO {
            TrieNode::Empty
        } else {
            TrieNode::Hash(root_hash)
        };
        Self {
            storage,
            root,
            dirty: HashMap::new(),
        }
    }

    pub fn root_hash(&self) -> UInt256 {
        self.root.hash()
    }

    fn resolve(&self, node: &TrieNode) -> Result<TrieNode, MptError> {
        match node {
            TrieNode::Hash(h) => {
                if let Some(cached) = self.dirty.get(h) {
                    return Ok(cached.clone());
                }
                let key = node_storage_key(h);
                let bytes = self
                    .storage
                    .get(&key)
                    .map_err(|_| MptError::NodeNotFound(*h))?;
                decode_node(&bytes)
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolves a possibly-unloaded node, for use by the garbage collector
    /// walking reachability without mutating the trie.
    pub fn resolve_for_gc(&self, node: &TrieNode) -> Result<TrieNode, MptError> {
        self.resolve(node)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, MptError> {
        let nibbles = bytes_to_nibbles(key);
        self.get_rec(&self.root, &nibbles)
    }

    fn get_rec(&self, node: &TrieNode, nibbles: &[u8]) -> Result<Option<Vec<u8>>, MptError> {
        let node = self.resolve(node)?;
        match node {
            TrieNode::Empty => Ok(None),
            TrieNode::Leaf { key, value } => {
                if key == nibbles {
                    Ok(Some(value))
                } else {
                    Ok(None)
                }
            }
            TrieNode::Extension { key, child } => {
                if nibbles.starts_with(&key) {
                    self.get_rec(&child, &nibbles[key.len()..])
                } else {
                    Ok(None)
                }
            }
            TrieNode::Branch { children, value } => {
                if nibbles.is_empty() {
                    return Ok(value);
                }
                match &children[nibbles[0] as usize] {
                    Some(child) => self.get_rec(child, &nibbles[1..]),
                    None => Ok(None),
                }
            }
            TrieNode::Hash(_) => unreachable!("resolved above"),
        }
    }

    pub fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), MptError> {
        let nibbles = bytes_to_nibbles(key);
        let root = std::mem::replace(&mut self.root, TrieNode::Empty);
        self.root = self.put_rec(root, &nibbles, value)?;
        Ok(())
    }

    fn put_rec(&mut self, node: TrieNode, nibbles: &[u8], value: Vec<u8>) -> Result<TrieNode, MptError> {
        let node = self.resolve(&node)?;
        match node {
            TrieNode::Empty => Ok(TrieNode::Leaf {
                key: nibbles.to_vec(),
                value,
            }),
            TrieNode::Leaf { key: leaf_key, value: leaf_value } => {
                if leaf_key == nibbles {
                    return Ok(TrieNode::Leaf { key: leaf_key, value });
                }
                let prefix_len = common_prefix_len(&leaf_key, nibbles);
                let mut branch = TrieNode::new_branch();
                self.insert_into_branch(&mut branch, &leaf_key[prefix_len..], leaf_value)?;
                self.insert_into_branch(&mut branch, &nibbles[prefix_len..], value)?;
                Ok(wrap_with_extension(&leaf_key[..prefix_len], branch))
            }
            TrieNode::Extension { key: ext_key, child } => {
                if nibbles.starts_with(&ext_key) {
                    let new_child = self.put_rec(*child, &nibbles[ext_key.len()..], value)?;
                    Ok(TrieNode::Extension { key: ext_key, child: Box::new(new_child) })
                } else {
                    let prefix_len = common_prefix_len(&ext_key, nibbles);
                    let mut branch = TrieNode::new_branch();
                    let remainder_ext = ext_key[prefix_len..].to_vec();
                    let shrunk = if remainder_ext.len() > 1 {
                        TrieNode::Extension { key: remainder_ext[1..].to_vec(), child }
                    } else {
                        *child
                    };
                    self.insert_branch_slot(&mut branch, remainder_ext[0], shrunk)?;
                    self.insert_into_branch(&mut branch, &nibbles[prefix_len..], value)?;
                    Ok(wrap_with_extension(&ext_key[..prefix_len], branch))
                }
            }
            TrieNode::Branch { mut children, value: branch_value } => {
                if nibbles.is_empty() {
                    return Ok(TrieNode::Branch { children, value: Some(value) });
                }
                let slot = nibbles[0] as usize;
                let child = children[slot].take().map(|c| *c).unwrap_or(TrieNode::Empty);
                let new_child = self.put_rec(child, &nibbles[1..], value)?;
                children[slot] = Some(Box::new(new_child));
                Ok(TrieNode::Branch { children, value: branch_value })
            }
            TrieNode::Hash(_) => unreachable!("resolved above"),
        }
    }

    fn insert_into_branch(&mut self, branch: &mut TrieNode, nibbles: &[u8], value: Vec<u8>) -> Result<(), MptError> {
        if let TrieNode::Branch { children, value: branch_value } = branch {
            if nibbles.is_empty() {
                *branch_value = Some(value);
                return Ok(());
            }
            let leaf = TrieNode::Leaf { key: nibbles[1..].to_vec(), value };
            children[nibbles[0] as usize] = Some(Box::new(leaf));
        }
        Ok(())
    }

    fn insert_branch_slot(&mut self, branch: &mut TrieNode, nibble: u8, node: TrieNode) -> Result<(), MptError> {
        if let TrieNode::Branch { children, .. } = branch {
            children[nibble as usize] = Some(Box::new(node));
        }
        Ok(())
    }

    pub fn delete(&mut self, key: &[u8]) -> Result<bool, MptError> {
        let nibbles = bytes_to_nibbles(key);
        let root = std::mem::replace(&mut self.root, TrieNode::Empty);
        let (new_root, removed) = self.delete_rec(root, &nibbles)?;
        self.root = new_root;
        Ok(removed)
    }

    fn delete_rec(&mut self, node: TrieNode, nibbles: &[u8]) -> Result<(TrieNode, bool), MptError> {
        let node = self.resolve(&node)?;
        match node {
            TrieNode::Empty => Ok((TrieNode::Empty, false)),
            TrieNode::Leaf { key, value } => {
                if key == nibbles {
                    Ok((TrieNode::Empty, true))
                } else {
                    Ok((TrieNode::Leaf { key, value }, false))
                }
            }
            TrieNode::Extension { key, child } => {
                if !nibbles.starts_with(&key) {
                    return Ok((TrieNode::Extension { key, child }, false));
                }
                let (new_child, removed) = self.delete_rec(*child, &nibbles[key.len()..])?;
                if !removed {
                    return Ok((TrieNode::Extension { key, child: Box::new(new_child) }, false));
                }
                Ok((collapse_extension(key, new_child), true))
            }
            TrieNode::Branch { mut children, value } => {
                if nibbles.is_empty() {
                    if value.is_none() {
                        return Ok((TrieNode::Branch { children, value }, false));
                    }
                    return Ok((collapse_branch(children, None), true));
                }
                let slot = nibbles[0] as usize;
                let child = match children[slot].take() {
                    Some(c) => *c,
                    None => return Ok((TrieNode::Branch { children, value }, false)),
                };
                let (new_child, removed) = self.delete_rec(child, &nibbles[1..])?;
                if !removed {
                    children[slot] = Some(Box::new(new_child));
                    return Ok((TrieNode::Branch { children, value }, false));
                }
                if !new_child.is_empty() {
                    children[slot] = Some(Box::new(new_child));
                }
                Ok((collapse_branch(children, value), true))
            }
            TrieNode::Hash(_) => unreachable!("resolved above"),
        }
    }

    /// Applies many key changes in one pass (spec behavior: batched updates
    /// merge multiple writes that touch overlapping paths so the shared
    /// prefix is only rehashed once per commit, not once per key).
    pub fn apply_batch(&mut self, puts: Vec<(Vec<u8>, Vec<u8>)>, deletes: Vec<Vec<u8>>) -> Result<(), MptError> {
        for key in deletes {
            self.delete(&key)?;
        }
        for (key, value) in puts {
            self.put(&key, value)?;
        }
        Ok(())
    }

    /// Walks the in-memory tree, hashing every node bottom-up and staging
    /// it for storage; returns the new root hash. The caller is
    /// responsible for writing `drain_writes()` to persistent storage.
    pub fn commit(&mut self) -> UInt256 {
        let root = std::mem::replace(&mut self.root, TrieNode::Empty);
        let (hashed, pending) = stage_for_commit(root);
        for (hash, node) in pending {
            self.dirty.insert(hash, node);
        }
        self.root = TrieNode::Hash(hashed.hash());
        self.dirty.insert(hashed.hash(), hashed);
        hashed.hash()
    }

    pub fn drain_writes(&mut self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.dirty
            .drain()
            .map(|(hash, node)| (node_storage_key(&hash), node.encode()))
            .collect()
    }
}

fn wrap_with_extension(prefix: &[u8], inner: TrieNode) -> TrieNode {
    if prefix.is_empty() {
        inner
    } else {
        TrieNode::Extension {
            key: prefix.to_vec(),
            child: Box::new(inner),
        }
    }
}

fn collapse_extension(key: Vec<u8>, child: TrieNode) -> TrieNode {
    match child {
        TrieNode::Empty => TrieNode::Empty,
        TrieNode::Leaf { key: leaf_key, value } => {
            let mut combined = key;
            combined.extend_from_slice(&leaf_key);
            TrieNode::Leaf { key: combined, value }
        }
        TrieNode::Extension { key: inner_key, child: inner_child } => {
            let mut combined = key;
            combined.extend_from_slice(&inner_key);
            TrieNode::Extension { key: combined, child: inner_child }
        }
        branch => TrieNode::Extension { key, child: Box::new(branch) },
    }
}

/// After removing a child, collapses a branch with exactly one remaining
/// child (and no terminal value) into an extension/leaf, matching the
/// canonical-form invariant that every branch has either a value or at
/// least two live children.
fn collapse_branch(children: Box<[Option<Box<TrieNode>>; BRANCH_WIDTH]>, value: Option<Vec<u8>>) -> TrieNode {
    let live: Vec<(usize, &TrieNode)> = children
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.as_deref().map(|n| (i, n)))
        .collect();
    if live.is_empty() {
        return match value {
            Some(v) => TrieNode::Leaf { key: vec![], value: v },
            None => TrieNode::Empty,
        };
    }
    if live.len() == 1 && value.is_none() {
        let (nibble, _) = live[0];
        let child = (*children).into_iter().nth(nibble).flatten().unwrap();
        let mut prefix = vec![nibble as u8];
        return match *child {
            TrieNode::Leaf { key, value } => {
                prefix.extend_from_slice(&key);
                TrieNode::Leaf { key: prefix, value }
            }
            TrieNode::Extension { key, child: inner } => {
                prefix.extend_from_slice(&key);
                TrieNode::Extension { key: prefix, child: inner }
            }
            branch => TrieNode::Extension { key: prefix, child: Box::new(branch) },
        };
    }
    TrieNode::Branch { children, value }
}

fn stage_for_commit(node: TrieNode) -> (TrieNode, Vec<(UInt256, TrieNode)>) {
    let mut pending = Vec::new();
    let hashed = stage_rec(node, &mut pending);
    (hashed, pending)
}

fn stage_rec(node: TrieNode, pending: &mut Vec<(UInt256, TrieNode)>) -> TrieNode {
    match node {
        TrieNode::Leaf { .. } | TrieNode::Empty | TrieNode::Hash(_) => {
            if !node.is_empty() {
                pending.push((node.hash(), node.clone()));
            }
            node
        }
        TrieNode::Extension { key, child } => {
            let child = stage_rec(*child, pending);
            let result = TrieNode::Extension { key, child: Box::new(child) };
            pending.push((result.hash(), result.clone()));
            result
        }
        TrieNode::Branch { children, value } => {
            let mut new_children: Box<[Option<Box<TrieNode>>; BRANCH_WIDTH]> = Box::new(Default::default());
            for (i, c) in (*children).into_iter().enumerate() {
                if let Some(c) = c {
                    new_children[i] = Some(Box::new(stage_rec(*c, pending)));
                }
            }
            let result = TrieNode::Branch { children: new_children, value };
            pending.push((result.hash(), result.clone()));
            result
        }
    }
}

fn decode_node(bytes: &[u8]) -> Result<TrieNode, MptError> {
    if bytes.is_empty() {
        return Err(MptError::Corrupt("empty node encoding".into()));
    }
    let mut cursor = 1usize;
    let read_bytes = |bytes: &[u8], cursor: &mut usize| -> Result<Vec<u8>, MptError> {
        let len = u32::from_le_bytes(
            bytes
                .get(*cursor..*cursor + 4)
                .ok_or(MptError::Corrupt("truncated length".into()))?
                .try_into()
                .unwrap(),
        ) as usize;
        *cursor += 4;
        let slice = bytes
            .get(*cursor..*cursor + len)
            .ok_or(MptError::Corrupt("truncated body".into()))?
            .to_vec();
        *cursor += len;
        Ok(slice)
    };
    match bytes[0] {
        0x00 => {
            let key = read_bytes(bytes, &mut cursor)?;
            let value = read_bytes(bytes, &mut cursor)?;
            Ok(TrieNode::Leaf { key, value })
        }
        0x01 => {
            let key = read_bytes(bytes, &mut cursor)?;
            let hash_bytes = bytes
                .get(cursor..cursor + 32)
                .ok_or(MptError::Corrupt("truncated extension child hash".into()))?;
            let child_hash = UInt256::from_bytes(hash_bytes).map_err(|e| MptError::Corrupt(e.to_string()))?;
            Ok(TrieNode::Extension { key, child: Box::new(TrieNode::Hash(child_hash)) })
        }
        0x02 => {
            let mut children: Box<[Option<Box<TrieNode>>; BRANCH_WIDTH]> = Box::new(Default::default());
            for slot in children.iter_mut() {
                let hash_bytes = bytes
                    .get(cursor..cursor + 32)
                    .ok_or(MptError::Corrupt("truncated branch child hash".into()))?;
                cursor += 32;
                let h = UInt256::from_bytes(hash_bytes).map_err(|e| MptError::Corrupt(e.to_string()))?;
                if h != UInt256::ZERO {
                    *slot = Some(Box::new(TrieNode::Hash(h)));
                }
            }
            let has_value = *bytes.get(cursor).ok_or(MptError::Corrupt("truncated branch value flag".into()))?;
            cursor += 1;
            let value = if has_value == 1 {
                Some(read_bytes(bytes, &mut cursor)?)
            } else {
                None
            };
            Ok(TrieNode::Branch { children, value })
        }
        0x03 => {
            let hash_bytes = bytes
                .get(cursor..cursor + 32)
                .ok_or(MptError::Corrupt("truncated hash node".into()))?;
            Ok(TrieNode::Hash(UInt256::from_bytes(hash_bytes).map_err(|e| MptError::Corrupt(e.to_string()))?))
        }
        0xff => Ok(TrieNode::Empty),
        other => Err(MptError::Corrupt(format!("unknown node tag 0x{other:02x}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_storage::MemoryStorage;

    #[test]
    fn put_and_get_single_key() {
        let storage = MemoryStorage::new();
        let mut trie = Trie::open(&storage, UInt256::ZERO);
        trie.put(b"hello", b"world".to_vec()).unwrap();
        assert_eq!(trie.get(b"hello").unwrap(), Some(b"world".to_vec()));
        assert_eq!(trie.get(b"nope").unwrap(), None);
    }

    #[test]
    fn delete_removes_key() {
        let storage = MemoryStorage::new();
        let mut trie = Trie::open(&storage, UInt256::ZERO);
        trie.put(b"a", b"1".to_vec()).unwrap();
        trie.put(b"b", b"2".to_vec()).unwrap();
        assert!(trie.delete(b"a").unwrap());
        assert_eq!(trie.get(b"a").unwrap(), None);
        assert_eq!(trie.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn commit_persists_and_reopens_with_same_root() {
        let storage = MemoryStorage::new();
        let root = {
            let mut trie = Trie::open(&storage, UInt256::ZERO);
            trie.put(b"a", b"1".to_vec()).unwrap();
            trie.put(b"ab", b"2".to_vec()).unwrap();
            trie.put(b"b", b"3".to_vec()).unwrap();
            let root = trie.commit();
            for (k, v) in trie.drain_writes() {
                storage.put(&k, &v).unwrap();
            }
            root
        };
        let reopened = Trie::open(&storage, root);
        assert_eq!(reopened.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(reopened.get(b"ab").unwrap(), Some(b"2".to_vec()));
        assert_eq!(reopened.get(b"b").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn different_key_sets_produce_different_roots() {
        let storage = MemoryStorage::new();
        let mut t1 = Trie::open(&storage, UInt256::ZERO);
        t1.put(b"x", b"1".to_vec()).unwrap();
        let r1 = t1.commit();

        let storage2 = MemoryStorage::new();
        let mut t2 = Trie::open(&storage2, UInt256::ZERO);
        t2.put(b"x", b"2".to_vec()).unwrap();
        let r2 = t2.commit();

        assert_ne!(r1, r2);
    }

    #[test]
    fn batch_update_applies_puts_and_deletes() {
        let storage = MemoryStorage::new();
        let mut trie = Trie::open(&storage, UInt256::ZERO);
        trie.put(b"a", b"1".to_vec()).unwrap();
        trie.apply_batch(
            vec![(b"b".to_vec(), b"2".to_vec())],
            vec![b"a".to_vec()],
        )
        .unwrap();
        assert_eq!(trie.get(b"a").unwrap(), None);
        assert_eq!(trie.get(b"b").unwrap(), Some(b"2".to_vec()));
    }
}
