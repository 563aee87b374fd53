use node_types::{ClassifiedError, ErrorKind, UInt256};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("transaction {0} already in pool")]
    AlreadyPresent(UInt256),
    #[error("transaction {0} conflicts with pool transaction {1} at an equal or higher fee")]
    Conflicts(UInt256, UInt256),
    #[error("network fee per byte {actual} below floor {floor}")]
    FeeBelowFloor { actual: i64, floor: i64 },
    #[error("valid-until-block {valid_until_block} is not after current height {current_height}")]
    Expired { valid_until_block: u32, current_height: u32 },
    #[error("sender balance insufficient for system+network fee")]
    InsufficientBalance,
    #[error("witness verification failed for signer {0}")]
    WitnessCheckFailed(node_types::UInt160),
    #[error("transaction has no signers")]
    NoSender,
}

#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("rejected: {0}")]
    Rejected(#[from] AdmissionError),
    #[error("storage error: {0}")]
    Storage(#[from] node_storage::StorageError),
    #[error("state error: {0}")]
    State(#[from] node_state::StateError),
    #[error("native contract error: {0}")]
    Native(#[from] node_native::NativeError),
}

impl From<MempoolError> for ClassifiedError {
    fn from(e: MempoolError) -> Self {
        let kind = match &e {
            MempoolError::Rejected(_) => ErrorKind::Validation,
            MempoolError::Storage(_) | MempoolError::State(_) | MempoolError::Native(_) => ErrorKind::TransientIo,
        };
        ClassifiedError::new(kind, "mempool_fault", e.to_string())
    }
}
