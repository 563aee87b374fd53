//! Layered cached store: a transient in-memory overlay that intercepts
//! reads and holds pending writes, flushing to the underlying store as one
//! batch on commit. Overlays compose to model per-transaction execution
//! scratch space; `rollback` discards the topmost overlay.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::errors::StorageError;
use crate::store::{SeekDirection, Storage, WriteBatch};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Slot {
    Value(Vec<u8>),
    Tombstone,
}

/// Read interface shared by a raw `Storage` and a `CachedStore`, letting
/// overlays stack on top of either one without the overlay caring which.
pub trait Layer: Send + Sync {
    fn layer_get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn layer_seek(&self, prefix: &[u8], direction: SeekDirection) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// Adapts a `&dyn Storage` (the bottom of any overlay stack) to `Layer`.
pub struct StorageLayer<'a>(pub &'a dyn Storage);

impl<'a> Layer for StorageLayer<'a> {
    fn layer_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.0.get(key).ok()
    }

    fn layer_seek(&self, prefix: &[u8], direction: SeekDirection) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.0.seek(prefix, direction).collect()
    }
}

/// A single overlay layer. Reads fall through to `parent` (another
/// `CachedStore` or a `StorageLayer`) on a cache miss.
pub struct CachedStore<P: Layer> {
    parent: P,
    overlay: RwLock<BTreeMap<Vec<u8>, Slot>>,
}

impl<P: Layer> Layer for CachedStore<P> {
    fn layer_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.overlay.read().get(key) {
            Some(Slot::Value(v)) => Some(v.clone()),
            Some(Slot::Tombstone) => None,
            None => self.parent.layer_get(key),
        }
    }

    fn layer_seek(&self, prefix: &[u8], direction: SeekDirection) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Slot> = BTreeMap::new();
        for (k, v) in self.parent.layer_seek(prefix, SeekDirection::Forward) {
            merged.insert(k, Slot::Value(v));
        }
        for (k, slot) in self.overlay.read().range(prefix.to_vec()..) {
            if !k.starts_with(prefix) {
                break;
            }
            merged.insert(k.clone(), slot.clone());
        }
        let mut out: Vec<(Vec<u8>, Vec<u8>)> = merged
            .into_iter()
            .filter_map(|(k, slot)| match slot {
                Slot::Value(v) => Some((k, v)),
                Slot::Tombstone => None,
            })
            .collect();
        if direction == SeekDirection::Backward {
            out.reverse();
        }
        out
    }
}

impl<P: Layer> CachedStore<P> {
    pub fn new(parent: P) -> Self {
        Self {
            parent,
            overlay: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        self.layer_get(key).ok_or(StorageError::NotFound)
    }

    pub fn put(&self, key: &[u8], value: &[u8]) {
        self.overlay
            .write()
            .insert(key.to_vec(), Slot::Value(value.to_vec()));
    }

    pub fn delete(&self, key: &[u8]) {
        self.overlay.write().insert(key.to_vec(), Slot::Tombstone);
    }

    pub fn seek(&self, prefix: &[u8], direction: SeekDirection) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.layer_seek(prefix, direction)
    }

    /// Discards all pending writes in this overlay without touching the
    /// parent. Used when a transaction/invocation faults: on fault or
    /// out-of-gas, contract-level state changes are discarded.
    pub fn rollback(&self) {
        self.overlay.write().clear();
    }

    pub fn pending_len(&self) -> usize {
        self.overlay.read().len()
    }

    /// Drains this overlay's pending writes into a `WriteBatch` without
    /// touching the parent; the caller is responsible for applying it
    /// (e.g. to the root `Storage`) and clearing the overlay afterward.
    pub fn drain_to_batch(&self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        let overlay = self.overlay.read();
        for (k, slot) in overlay.iter() {
            match slot {
                Slot::Value(v) => {
                    batch.put(k.clone(), v.clone());
                }
                Slot::Tombstone => {
                    batch.delete(k.clone());
                }
            }
        }
        batch
    }

    pub fn clear(&self) {
        self.overlay.write().clear();
    }
}

/// Commits a top-level overlay down to the underlying `Storage` in a single
/// batch, then clears the overlay: the transaction-scoped overlay is
/// flushed atomically.
pub fn commit_to_storage(
    cached: &CachedStore<StorageLayer<'_>>,
    storage: &dyn Storage,
) -> Result<(), StorageError> {
    let batch = cached.drain_to_batch();
    if !batch.is_empty() {
        storage.write_batch(batch)?;
    }
    cached.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    #[test]
    fn overlay_shadows_parent() {
        let parent = MemoryStorage::new();
        parent.put(b"k", b"parent-value").unwrap();
        let overlay = CachedStore::new(StorageLayer(&parent));
        assert_eq!(overlay.get(b"k").unwrap(), b"parent-value");
        overlay.put(b"k", b"overlay-value");
        assert_eq!(overlay.get(b"k").unwrap(), b"overlay-value");
        // parent untouched until commit
        assert_eq!(parent.get(b"k").unwrap(), b"parent-value");
    }

    #[test]
    fn rollback_discards_pending_writes() {
        let parent = MemoryStorage::new();
        let overlay = CachedStore::new(StorageLayer(&parent));
        overlay.put(b"k", b"v");
        overlay.rollback();
        assert!(matches!(overlay.get(b"k"), Err(StorageError::NotFound)));
    }

    #[test]
    fn tombstone_hides_parent_value() {
        let parent = MemoryStorage::new();
        parent.put(b"k", b"v").unwrap();
        let overlay = CachedStore::new(StorageLayer(&parent));
        overlay.delete(b"k");
        assert!(matches!(overlay.get(b"k"), Err(StorageError::NotFound)));
    }

    #[test]
    fn nested_overlay_of_overlay() {
        let parent = MemoryStorage::new();
        parent.put(b"k", b"base").unwrap();
        let mid = CachedStore::new(StorageLayer(&parent));
        mid.put(b"k", b"mid");
        let top = CachedStore::new(mid);
        assert_eq!(top.get(b"k").unwrap(), b"mid");
        top.put(b"k", b"top");
        assert_eq!(top.get(b"k").unwrap(), b"top");
        top.rollback();
        assert_eq!(top.get(b"k").unwrap(), b"mid");
    }

    #[test]
    fn seek_merges_overlay_and_parent() {
        let parent = MemoryStorage::new();
        parent.put(b"p:a", b"1").unwrap();
        parent.put(b"p:b", b"2").unwrap();
        let overlay = CachedStore::new(StorageLayer(&parent));
        overlay.put(b"p:c", b"3");
        overlay.delete(b"p:a");
        let results = overlay.seek(b"p:", SeekDirection::Forward);
        assert_eq!(
            results,
            vec![(b"p:b".to_vec(), b"2".to_vec()), (b"p:c".to_vec(), b"3".to_vec())]
        );
    }

    #[test]
    fn commit_flushes_overlay_to_storage() {
        let parent = MemoryStorage::new();
        let overlay = CachedStore::new(StorageLayer(&parent));
        overlay.put(b"k", b"v");
        commit_to_storage(&overlay, &parent).unwrap();
        assert_eq!(parent.get(b"k").unwrap(), b"v");
        assert_eq!(overlay.pending_len(), 0);
    }
}
