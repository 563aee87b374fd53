//! Core data-model types shared across the node: hashes, Fixed8 decimal,
//! public keys, transactions, blocks, account and contract state.
//!
//! Wire/storage encoding lives in `node-crypto` (hashing, addresses) and in
//! the `codec` modules of the crates that own a given on-disk/on-wire
//! format; this crate only defines the shapes.

pub mod account;
pub mod block;
pub mod contract;
pub mod errors;
pub mod fixed8;
pub mod hashes;
pub mod pubkey;
pub mod transaction;

pub use account::{AccountBalances, AccountState};
pub use block::{Block, BlockHeader};
pub use contract::{ContractManifest, ContractState, EventDescriptor, MethodDescriptor, NefFile};
pub use errors::{ClassifiedError, ErrorKind};
pub use fixed8::Fixed8;
pub use hashes::{HashParseError, UInt160, UInt256};
pub use pubkey::{PublicKey, PublicKeyError};
pub use transaction::{
    Signer, Transaction, TransactionAttribute, Witness, WitnessCondition, WitnessRule,
    WitnessScope, MAX_SCRIPT_LENGTH, MAX_TRANSACTION_SIZE,
};
