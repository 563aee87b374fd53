//! In-memory `Storage` backend: a `BTreeMap` under a single lock, used by
//! tests and as the default development backend.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::errors::StorageError;
use crate::store::{SeekDirection, Storage, WriteBatch, WriteOp};

#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn seek(
        &self,
        prefix: &[u8],
        direction: SeekDirection,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        let prefix = prefix.to_vec();
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = self
            .data
            .read()
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let iter: Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)>> = match direction {
            SeekDirection::Forward => Box::new(snapshot.into_iter()),
            SeekDirection::Backward => Box::new(snapshot.into_iter().rev()),
        };
        iter
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut guard = self.data.write();
        for op in batch.ops() {
            match op {
                WriteOp::Put { key, value } => {
                    guard.insert(key.clone(), value.clone());
                }
                WriteOp::Delete { key } => {
                    guard.remove(key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip() {
        let s = MemoryStorage::new();
        s.put(b"a", b"1").unwrap();
        assert_eq!(s.get(b"a").unwrap(), b"1");
    }

    #[test]
    fn get_missing_is_not_found() {
        let s = MemoryStorage::new();
        assert!(matches!(s.get(b"missing"), Err(StorageError::NotFound)));
    }

    #[test]
    fn seek_respects_prefix_and_order() {
        let s = MemoryStorage::new();
        s.put(b"prefix:b", b"2").unwrap();
        s.put(b"prefix:a", b"1").unwrap();
        s.put(b"other:z", b"9").unwrap();
        let forward: Vec<_> = s.seek(b"prefix:", SeekDirection::Forward).collect();
        assert_eq!(forward.len(), 2);
        assert_eq!(forward[0].0, b"prefix:a");
        assert_eq!(forward[1].0, b"prefix:b");
        let backward: Vec<_> = s.seek(b"prefix:", SeekDirection::Backward).collect();
        assert_eq!(backward[0].0, b"prefix:b");
    }

    #[test]
    fn batch_commit_is_all_or_nothing_in_effect() {
        let s = MemoryStorage::new();
        s.put(b"x", b"old").unwrap();
        let mut batch = WriteBatch::new();
        batch.put(b"x", b"new").delete(b"y");
        s.write_batch(batch).unwrap();
        assert_eq!(s.get(b"x").unwrap(), b"new");
    }
}
