//! Block header and block data model.

use serde::{Deserialize, Serialize};

use crate::hashes::UInt160;
use crate::hashes::UInt256;
use crate::transaction::{Transaction, Witness};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_hash: UInt256,
    pub merkle_root: UInt256,
    /// Milliseconds since Unix epoch.
    pub timestamp: u64,
    pub nonce: u64,
    pub index: u32,
    pub primary_index: u8,
    pub next_consensus: UInt160,
    pub witness: Witness,
    /// Present only when the state-root-in-header protocol extension is
    /// enabled for the active hardfork.
    pub state_root: Option<UInt256>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn index(&self) -> u32 {
        self.header.index
    }
}
