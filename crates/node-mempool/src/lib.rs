//! Transaction pool: admission, conflict resolution, priority ordering,
//! capacity-bounded eviction and per-block reconciliation.
//!
//! Cryptographic witness verification belongs to `node-blockchain`'s VM
//! pipeline; see `verify`'s module doc for the boundary this crate draws.

pub mod errors;
pub mod pool;
pub mod verify;

pub use errors::{AdmissionError, MempoolError};
pub use pool::{Mempool, DEFAULT_CAPACITY};
