//! Events broadcast between the node's long-lived tasks.
//!
//! Each long-lived activity (peer read/write, block-queue consumer,
//! header-queue consumer, mempool reverifier, dBFT loop, discovery)
//! communicates exclusively via bounded channels; this enum is the payload
//! carried on the fan-out side of that communication.

use node_types::{Block, UInt160, UInt256};

#[derive(Clone, Debug)]
pub enum NodeEvent {
    /// A block was committed by `Blockchain::add_block`; height is the new
    /// chain height. Consumed by the mempool (to evict/re-verify) and by
    /// the P2P broadcast layer (to relay an `Inv`).
    BlockPersisted { block: Block, height: u32 },
    /// A transaction was admitted to the mempool and should be relayed.
    TransactionAdmitted { hash: UInt256 },
    /// A transaction was evicted from the mempool (capacity pressure or
    /// block inclusion) and subscribers should drop any cached reference.
    TransactionEvicted { hash: UInt256, reason: EvictionReason },
    /// The committee/validator set changed at a governance epoch boundary.
    CommitteeChanged { validators: Vec<UInt160> },
    /// A peer completed the version/verack handshake.
    PeerConnected { address: String },
    /// A peer was disconnected, graceful or not.
    PeerDisconnected { address: String },
    /// Raw transaction relayed by the P2P layer before mempool admission;
    /// used by tests/observability to watch ingress independent of
    /// admission outcome.
    TransactionReceived { tx_hash: UInt256 },
    /// Emitted by consensus when a new view begins.
    ViewChanged { height: u32, view: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionReason {
    IncludedInBlock,
    Expired,
    CapacityPressure,
    ConflictsWithChain,
}

/// Helper kept for log lines and test assertions that need the underlying
/// transaction without threading the whole event through.
pub fn transaction_hash(event: &NodeEvent) -> Option<UInt256> {
    match event {
        NodeEvent::TransactionAdmitted { hash } => Some(*hash),
        NodeEvent::TransactionEvicted { hash, .. } => Some(*hash),
        NodeEvent::TransactionReceived { tx_hash } => Some(*tx_hash),
        _ => None,
    }
}
