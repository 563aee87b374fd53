//! Pluggable key-value storage with a layered overlay cache on top.

pub mod cached;
pub mod errors;
pub mod memory;
pub mod store;

#[cfg(feature = "rocksdb-backend")]
pub mod rocksdb_backend;

pub use cached::{commit_to_storage, CachedStore, Layer, StorageLayer};
pub use errors::StorageError;
pub use memory::MemoryStorage;
pub use store::{SeekDirection, Storage, WriteBatch, WriteOp};

#[cfg(feature = "rocksdb-backend")]
pub use rocksdb_backend::RocksDbStorage;
