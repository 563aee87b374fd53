//! dBFT wire messages. Every variant travels inside an `Extensible`
//! payload under the `"consensus"` category: `ConsensusMessage` is
//! bincode-encoded into `Extensible::data`, and the sender's signature
//! over those exact bytes goes in `Extensible::witness.invocation_script`.
//! `Extensible::witness.verification_script` carries the sender's raw
//! compressed public key rather than an executable script — consensus
//! identity is checked by matching `validator_index` against the current
//! validator list and verifying the signature directly, not by hashing a
//! script, so there's nothing for a script engine to run here.

use serde::{Deserialize, Serialize};

use node_types::{BlockHeader, UInt256};

/// A proposed block, header complete except for the witness that only
/// exists once enough commits have been collected.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockProposal {
    pub header: BlockHeader,
    pub tx_hashes: Vec<UInt256>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ConsensusPayload {
    PrepareRequest { proposal: BlockProposal },
    PreCommit { block_hash: UInt256 },
    Commit { block_hash: UInt256 },
    ChangeView { new_view: u8 },
    RecoveryRequest,
    RecoveryMessage {
        proposal: Option<BlockProposal>,
        pre_commits: Vec<(u8, UInt256, [u8; 64])>,
        commits: Vec<(u8, UInt256, [u8; 64])>,
        change_views: Vec<(u8, u8)>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusMessage {
    pub height: u32,
    pub view: u8,
    pub validator_index: u8,
    pub payload: ConsensusPayload,
}
