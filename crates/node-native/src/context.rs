//! Per-invocation context handed to a native contract: the storage it may
//! read/write, the block it's executing under, and which accounts have a
//! verified witness in the current transaction or trigger.

use node_storage::Storage;
use node_types::UInt160;

pub struct InvocationContext<'a> {
    pub storage: &'a dyn Storage,
    pub block_height: u32,
    pub block_timestamp: u64,
    pub calling_script_hash: UInt160,
    /// The account credited with the primary-node reward during
    /// `PostPersist`; meaningless outside that trigger.
    pub block_primary: UInt160,
    pub witnesses: &'a [UInt160],
}

impl<'a> InvocationContext<'a> {
    pub fn check_witness(&self, account: &UInt160) -> bool {
        self.witnesses.contains(account)
    }
}
