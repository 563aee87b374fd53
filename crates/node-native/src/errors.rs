use node_types::{ClassifiedError, ErrorKind, UInt160};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NativeError {
    #[error("unknown method {0} on contract {1}")]
    UnknownMethod(String, &'static str),
    #[error("unknown native contract hash")]
    UnknownContract,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("witness check failed for {0}")]
    WitnessCheckFailed(UInt160),
    #[error("contract already exists")]
    ContractAlreadyExists,
    #[error("contract not found")]
    ContractNotFound,
    #[error("not yet active at this height")]
    NotYetActive,
    #[error("storage error: {0}")]
    Storage(#[from] node_storage::StorageError),
    #[error("state error: {0}")]
    State(#[from] node_state::StateError),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl From<NativeError> for ClassifiedError {
    fn from(e: NativeError) -> Self {
        let kind = match &e {
            NativeError::Storage(_) | NativeError::State(_) | NativeError::Codec(_) => ErrorKind::TransientIo,
            NativeError::UnknownContract | NativeError::UnknownMethod(..) => ErrorKind::Programming,
            _ => ErrorKind::Validation,
        };
        ClassifiedError::new(kind, "native_contract_fault", e.to_string())
    }
}
