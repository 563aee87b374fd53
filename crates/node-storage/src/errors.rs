use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("key not found")]
    NotFound,
    #[error("I/O error: {0}")]
    Io(String),
    #[error("batch commit failed: {0}")]
    BatchCommit(String),
}
