//! Production `Storage` backend over RocksDB (feature `rocksdb-backend`).

use rocksdb::{IteratorMode, Options, WriteBatch as RocksWriteBatch, DB};

use crate::errors::StorageError;
use crate::store::{SeekDirection, Storage, WriteBatch, WriteOp};

pub struct RocksDbStorage {
    db: DB,
}

impl RocksDbStorage {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path).map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(Self { db })
    }
}

impl Storage for RocksDbStorage {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        self.db
            .get(key)
            .map_err(|e| StorageError::Io(e.to_string()))?
            .ok_or(StorageError::NotFound)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db
            .put(key, value)
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.db
            .delete(key)
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    fn seek(
        &self,
        prefix: &[u8],
        direction: SeekDirection,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        let prefix = prefix.to_vec();
        let mode = match direction {
            SeekDirection::Forward => IteratorMode::From(&prefix, rocksdb::Direction::Forward),
            SeekDirection::Backward => IteratorMode::From(&prefix, rocksdb::Direction::Reverse),
        };
        let prefix_for_filter = prefix.clone();
        let iter = self
            .db
            .iterator(mode)
            .filter_map(|r| r.ok())
            .take_while(move |(k, _)| k.starts_with(&prefix_for_filter))
            .map(|(k, v)| (k.to_vec(), v.to_vec()));
        Box::new(iter)
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut rb = RocksWriteBatch::default();
        for op in batch.ops() {
            match op {
                WriteOp::Put { key, value } => rb.put(key, value),
                WriteOp::Delete { key } => rb.delete(key),
            }
        }
        self.db
            .write(rb)
            .map_err(|e| StorageError::BatchCommit(e.to_string()))
    }
}
