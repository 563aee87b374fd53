//! Adapts a block-scoped `CachedStore` overlay back into `Storage` so
//! anything written against the raw key-value contract (native contract
//! invocation, the MPT) can run against pending, uncommitted block state
//! without knowing it's layered.

use node_storage::{CachedStore, SeekDirection, StorageError, StorageLayer, WriteBatch, WriteOp};

pub struct OverlayStorage<'a> {
    cached: &'a CachedStore<StorageLayer<'a>>,
}

impl<'a> OverlayStorage<'a> {
    pub fn new(cached: &'a CachedStore<StorageLayer<'a>>) -> Self {
        Self { cached }
    }
}

impl<'a> node_storage::Storage for OverlayStorage<'a> {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        self.cached.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.cached.put(key, value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.cached.delete(key);
        Ok(())
    }

    fn seek(&self, prefix: &[u8], direction: SeekDirection) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        Box::new(self.cached.seek(prefix, direction).into_iter())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        for op in batch.ops() {
            match op {
                WriteOp::Put { key, value } => self.cached.put(key, value),
                WriteOp::Delete { key } => self.cached.delete(key),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_storage::{MemoryStorage, Storage};

    #[test]
    fn reads_and_writes_go_through_the_overlay_not_the_parent() {
        let parent = MemoryStorage::new();
        let cached = CachedStore::new(StorageLayer(&parent));
        let overlay = OverlayStorage::new(&cached);
        overlay.put(b"k", b"v").unwrap();
        assert_eq!(overlay.get(b"k").unwrap(), b"v");
        assert!(parent.get(b"k").is_err());
    }
}
