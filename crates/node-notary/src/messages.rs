//! Wire payloads for the two extensible categories a notary round uses:
//! `"notary-request"` carries the just-submitted main/fallback pair, and
//! `"notary-signature"` carries one notary's signature share over the main
//! transaction once it validated the pair.

use serde::{Deserialize, Serialize};

use node_types::{Transaction, UInt256};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotaryRequest {
    pub main_tx: Transaction,
    pub fallback_tx: Transaction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotarySignature {
    pub main_hash: UInt256,
    pub notary_index: u8,
    pub signature: [u8; 64],
}
