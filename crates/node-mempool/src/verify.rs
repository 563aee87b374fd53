//! Stateless or state-reading checks run before a transaction is admitted.
//! Cryptographic witness verification against arbitrary scripts belongs to
//! the VM (`node-blockchain`'s per-transaction verification step); this
//! module performs only the cheap structural check (the witness's
//! authorizing identity matches the signer) so the pool doesn't need a
//! script interpreter of its own.

use node_native::{InvocationContext, NativeContract};
use node_types::{Fixed8, Transaction, UInt160};

use crate::errors::AdmissionError;

pub fn tx_size(tx: &Transaction) -> usize {
    bincode::serialize(tx).map(|b| b.len()).unwrap_or(usize::MAX)
}

pub fn network_fee_floor_met(tx: &Transaction, fee_per_byte_floor: i64) -> Result<(), AdmissionError> {
    let size = tx_size(tx);
    let actual = tx.network_fee_per_byte(size);
    if actual < fee_per_byte_floor {
        return Err(AdmissionError::FeeBelowFloor { actual, floor: fee_per_byte_floor });
    }
    Ok(())
}

pub fn not_expired(tx: &Transaction, current_height: u32) -> Result<(), AdmissionError> {
    if tx.valid_until_block <= current_height {
        return Err(AdmissionError::Expired {
            valid_until_block: tx.valid_until_block,
            current_height,
        });
    }
    Ok(())
}

/// Structural witness check: every signer has a witness whose verification
/// script hashes to that signer's account, and carries a non-empty
/// invocation script (a signature was at least supplied).
pub fn witnesses_present(tx: &Transaction) -> Result<(), AdmissionError> {
    for (i, signer) in tx.signers.iter().enumerate() {
        let witness = tx.witnesses.get(i).ok_or(AdmissionError::WitnessCheckFailed(signer.account))?;
        if witness.invocation_script.is_empty() {
            return Err(AdmissionError::WitnessCheckFailed(signer.account));
        }
        let script_hash = node_crypto::script_hash(&witness.verification_script);
        if script_hash != signer.account {
            return Err(AdmissionError::WitnessCheckFailed(signer.account));
        }
    }
    Ok(())
}

/// Best-effort: sender's GAS balance covers system fee + network fee. Does
/// not account for fees spent by other not-yet-included pool transactions
/// from the same sender; the final word belongs to block execution.
pub fn sender_can_afford(
    storage: &dyn node_storage::Storage,
    tx: &Transaction,
    block_height: u32,
) -> Result<(), AdmissionError> {
    let sender = tx.sender().ok_or(AdmissionError::NoSender)?;
    let gas = node_native::gas_token::GasToken::new();
    let ctx = InvocationContext {
        storage,
        block_height,
        block_timestamp: 0,
        calling_script_hash: sender,
        block_primary: UInt160::ZERO,
        witnesses: &[],
    };
    let balance = gas.balance_of(&ctx, &sender).map_err(|_| AdmissionError::InsufficientBalance)?;
    let required = tx.system_fee.saturating_add(tx.network_fee);
    if balance < required {
        return Err(AdmissionError::InsufficientBalance);
    }
    Ok(())
}

pub fn current_fee_per_byte_floor(storage: &dyn node_storage::Storage, block_height: u32) -> i64 {
    let policy = node_native::policy::Policy::new();
    let ctx = InvocationContext {
        storage,
        block_height,
        block_timestamp: 0,
        calling_script_hash: UInt160::ZERO,
        block_primary: UInt160::ZERO,
        witnesses: &[],
    };
    policy
        .invoke(&ctx, "getFeePerByte", &[])
        .ok()
        .and_then(|v| v.as_integer().cloned())
        .and_then(|i| num_traits::ToPrimitive::to_i64(&i))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_storage::MemoryStorage;
    use node_types::{Signer, Witness, WitnessScope};

    fn sample_tx(network_fee: i64, valid_until_block: u32) -> Transaction {
        let account = UInt160([1u8; 20]);
        Transaction {
            version: 0,
            nonce: 1,
            system_fee: Fixed8::from_raw(0),
            network_fee: Fixed8::from_raw(network_fee),
            valid_until_block,
            signers: vec![Signer {
                account,
                scopes: WitnessScope::CalledByEntry,
                allowed_contracts: vec![],
                allowed_groups: vec![],
            }],
            attributes: vec![],
            script: vec![0x51],
            witnesses: vec![Witness {
                invocation_script: vec![0x01],
                verification_script: vec![],
            }],
        }
    }

    #[test]
    fn expired_when_valid_until_not_after_height() {
        let tx = sample_tx(1000, 10);
        assert!(not_expired(&tx, 10).is_err());
        assert!(not_expired(&tx, 9).is_ok());
    }

    #[test]
    fn fee_floor_rejects_cheap_tx() {
        let tx = sample_tx(1, 100);
        assert!(network_fee_floor_met(&tx, 1000).is_err());
    }

    #[test]
    fn witness_check_requires_matching_script_hash() {
        let mut tx = sample_tx(1000, 100);
        tx.witnesses[0].verification_script = vec![0x02, 0x03];
        assert!(witnesses_present(&tx).is_err());
    }

    #[test]
    fn sender_balance_check_uses_state() {
        let storage = MemoryStorage::new();
        let tx = sample_tx(1000, 100);
        assert!(sender_can_afford(&storage, &tx, 0).is_err());
        let sender = tx.sender().unwrap();
        let gas = node_native::gas_token::GasToken::new();
        let ctx = InvocationContext {
            storage: &storage,
            block_height: 0,
            block_timestamp: 0,
            calling_script_hash: sender,
            block_primary: UInt160::ZERO,
            witnesses: &[],
        };
        gas.mint(&ctx, &sender, 1_000_000).unwrap();
        assert!(sender_can_afford(&storage, &tx, 0).is_ok());
    }
}
