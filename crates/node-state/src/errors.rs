use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("storage error: {0}")]
    Storage(#[from] node_storage::StorageError),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}
