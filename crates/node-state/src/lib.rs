//! Typed DAO layer over `node-storage`'s raw key-value contract: headers,
//! blocks, transactions, application logs, account/contract state and
//! transfer history, all keyed through `keys` and encoded with `bincode`.

pub mod dao;
pub mod errors;
pub mod keys;

pub use dao::{ApplicationLog, Bookkeeping, ChainState, NotificationRecord, TransferRecord};
pub use errors::StateError;
