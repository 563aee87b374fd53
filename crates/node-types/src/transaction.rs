//! Transaction data model: signers, witness scopes, attributes, witnesses.
//!
//! Verification invariants (size limits, signer checks, fee checks) are
//! enforced during block processing, not encoded here; see
//! `node-blockchain`.

use serde::{Deserialize, Serialize};

use crate::fixed8::Fixed8;
use crate::hashes::{UInt160, UInt256};
use crate::pubkey::PublicKey;

/// Maximum size of a transaction's entry script.
pub const MAX_SCRIPT_LENGTH: usize = 64 * 1024;
/// Maximum total serialized size of a transaction.
pub const MAX_TRANSACTION_SIZE: usize = 100 * 1024;

/// A restriction on when a signer's witness is considered authoritative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WitnessScope {
    /// The witness never asserts authority (used for fee-only signers).
    None,
    /// Authority is asserted only for the entry-script invocation itself.
    CalledByEntry,
    /// Authority is restricted to calls into the listed contracts.
    CustomContracts(Vec<UInt160>),
    /// Authority is restricted to calls into contracts carrying one of the
    /// listed manifest groups.
    CustomGroups(Vec<PublicKey>),
    /// Authority is gated by boolean predicates evaluated against the
    /// current invocation context.
    Rules(Vec<WitnessRule>),
    /// Authority is asserted unconditionally for any invocation.
    Global,
}

/// A single boolean predicate used by `WitnessScope::Rules`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessRule {
    pub allow: bool,
    pub condition: WitnessCondition,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WitnessCondition {
    ScriptHash(UInt160),
    Group(PublicKey),
    CalledByEntry,
    CalledByContract(UInt160),
    CalledByGroup(PublicKey),
    And(Vec<WitnessCondition>),
    Or(Vec<WitnessCondition>),
    Not(Box<WitnessCondition>),
    Boolean(bool),
}

/// A transaction signer: a script-hash plus the scope under which its
/// witness is considered to assert authority. The first signer is "sender".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    pub account: UInt160,
    pub scopes: WitnessScope,
    /// Only meaningful alongside `CalledByEntry`/`Global` combinators in the
    /// reference protocol; kept for forward compatibility with allowed
    /// contract method restrictions.
    pub allowed_contracts: Vec<UInt160>,
    pub allowed_groups: Vec<PublicKey>,
}

/// Tagged transaction attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionAttribute {
    HighPriority,
    OracleResponse { id: u64, code: u8, result: Vec<u8> },
    NotValidBefore { height: u32 },
    Conflicts { hash: UInt256 },
    NotaryAssisted { n_keys: u8 },
}

impl TransactionAttribute {
    pub fn is_high_priority(&self) -> bool {
        matches!(self, TransactionAttribute::HighPriority)
    }

    pub fn conflicts_hash(&self) -> Option<UInt256> {
        match self {
            TransactionAttribute::Conflicts { hash } => Some(*hash),
            _ => None,
        }
    }
}

/// Invocation-script + verification-script pair. The hash of the
/// verification script is the authorizing identity for its signer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Witness {
    pub invocation_script: Vec<u8>,
    pub verification_script: Vec<u8>,
}

impl Witness {
    /// Authorizing identity of this witness: `hash160` of the verification
    /// script. Computing the hash itself is `node-crypto`'s job; this just
    /// names the relationship for callers that already have a hasher.
    pub fn verification_script(&self) -> &[u8] {
        &self.verification_script
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub nonce: u32,
    pub system_fee: Fixed8,
    pub network_fee: Fixed8,
    pub valid_until_block: u32,
    pub signers: Vec<Signer>,
    pub attributes: Vec<TransactionAttribute>,
    pub script: Vec<u8>,
    pub witnesses: Vec<Witness>,
}

impl Transaction {
    /// The first signer is always "sender".
    pub fn sender(&self) -> Option<UInt160> {
        self.signers.first().map(|s| s.account)
    }

    pub fn has_high_priority(&self) -> bool {
        self.attributes.iter().any(|a| a.is_high_priority())
    }

    pub fn conflicts(&self) -> impl Iterator<Item = UInt256> + '_ {
        self.attributes.iter().filter_map(|a| a.conflicts_hash())
    }

    /// Fee-per-byte used for mempool ordering; caller supplies the
    /// serialized size since encoding lives in `node-codec`-equivalent
    /// logic inside this crate's `codec` module.
    pub fn network_fee_per_byte(&self, size: usize) -> i64 {
        if size == 0 {
            return 0;
        }
        self.network_fee.raw() / size as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signer() -> Signer {
        Signer {
            account: UInt160::ZERO,
            scopes: WitnessScope::CalledByEntry,
            allowed_contracts: vec![],
            allowed_groups: vec![],
        }
    }

    #[test]
    fn sender_is_first_signer() {
        let tx = Transaction {
            version: 0,
            nonce: 1,
            system_fee: Fixed8::ZERO,
            network_fee: Fixed8::ZERO,
            valid_until_block: 100,
            signers: vec![sample_signer()],
            attributes: vec![],
            script: vec![],
            witnesses: vec![],
        };
        assert_eq!(tx.sender(), Some(UInt160::ZERO));
    }

    #[test]
    fn conflicts_iterates_attribute_hashes() {
        let hash = UInt256([9u8; 32]);
        let tx = Transaction {
            version: 0,
            nonce: 1,
            system_fee: Fixed8::ZERO,
            network_fee: Fixed8::ZERO,
            valid_until_block: 100,
            signers: vec![sample_signer()],
            attributes: vec![TransactionAttribute::Conflicts { hash }],
            script: vec![],
            witnesses: vec![],
        };
        assert_eq!(tx.conflicts().collect::<Vec<_>>(), vec![hash]);
    }
}
