//! The `Storage` contract: Get/Put/Delete/Seek plus atomic batch commit.

use crate::errors::StorageError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Backward,
}

/// A single write accumulated in a `WriteBatch`.
#[derive(Clone, Debug)]
pub enum WriteOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Accumulates writes for atomic commit: either all become visible or none
/// do.
#[derive(Default, Clone, Debug)]
pub struct WriteBatch {
    pub(crate) ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(WriteOp::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(WriteOp::Delete { key: key.into() });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

/// Single-writer, multi-reader key-value store over opaque byte keys.
pub trait Storage: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StorageError>;

    fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_ok()
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    fn delete(&self, key: &[u8]) -> Result<(), StorageError>;

    /// Lazily iterate all (key, value) pairs whose key starts with `prefix`,
    /// sorted lexicographically ascending or descending.
    fn seek(
        &self,
        prefix: &[u8],
        direction: SeekDirection,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>;

    /// Commit a batch atomically.
    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError>;
}
