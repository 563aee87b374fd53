//! LedgerContract: read-only access to committed blocks, transactions and
//! their execution results. All state here is owned by `node-state`; this
//! contract is a thin, script-callable view over it.

use node_state::dao::ChainState;
use node_types::UInt160;

use crate::context::InvocationContext;
use crate::errors::NativeError;
use crate::ids;
use crate::registry::NativeContract;
use crate::value::NativeValue;

pub struct Ledger;

impl Ledger {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for Ledger {
    fn id(&self) -> i32 {
        ids::LEDGER_ID
    }

    fn hash(&self) -> UInt160 {
        ids::contract_hash(self.name())
    }

    fn name(&self) -> &'static str {
        "LedgerContract"
    }

    fn invoke(
        &self,
        ctx: &InvocationContext,
        method: &str,
        args: &[NativeValue],
    ) -> Result<NativeValue, NativeError> {
        let state = ChainState::new(ctx.storage);
        match method {
            "currentIndex" => Ok(NativeValue::Integer(ctx.block_height.into())),
            "currentHash" => {
                let header = state
                    .header_by_index(ctx.block_height)?
                    .ok_or(NativeError::ContractNotFound)?;
                Ok(NativeValue::Hash256(
                    node_crypto::hash256(&bincode::serialize(&header).map_err(|e| NativeError::InvalidArgument(e.to_string()))?),
                ))
            }
            "getBlock" => {
                let block = if let Some(index) = args.first().and_then(|v| v.as_u32()) {
                    state.header_by_index(index)?.and_then(|h| {
                        let hash = node_crypto::hash256(&bincode::serialize(&h).ok()?);
                        state.block_by_hash(&hash).ok().flatten()
                    })
                } else if let Some(hash) = args.first().and_then(|v| v.as_hash256()) {
                    state.block_by_hash(&hash)?
                } else {
                    return Err(NativeError::InvalidArgument("block index or hash".into()));
                };
                match block {
                    Some(b) => Ok(NativeValue::Bytes(
                        bincode::serialize(&b).map_err(|e| NativeError::InvalidArgument(e.to_string()))?,
                    )),
                    None => Ok(NativeValue::Null),
                }
            }
            "getTransaction" => {
                let hash = args
                    .first()
                    .and_then(|v| v.as_hash256())
                    .ok_or_else(|| NativeError::InvalidArgument("tx hash".into()))?;
                match state.transaction_by_hash(&hash)? {
                    Some((tx, _block_index, _index_in_block)) => Ok(NativeValue::Bytes(
                        bincode::serialize(&tx).map_err(|e| NativeError::InvalidArgument(e.to_string()))?,
                    )),
                    None => Ok(NativeValue::Null),
                }
            }
            "getTransactionHeight" => {
                let hash = args
                    .first()
                    .and_then(|v| v.as_hash256())
                    .ok_or_else(|| NativeError::InvalidArgument("tx hash".into()))?;
                match state.transaction_by_hash(&hash)? {
                    Some((_tx, block_index, _index_in_block)) => {
                        Ok(NativeValue::Integer(block_index.into()))
                    }
                    None => Ok(NativeValue::Integer((-1).into())),
                }
            }
            other => Err(NativeError::UnknownMethod(other.to_string(), self.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_storage::MemoryStorage;
    use node_types::{Block, BlockHeader, Witness};

    fn sample_header(index: u32) -> BlockHeader {
        BlockHeader {
            version: 0,
            prev_hash: node_types::UInt256::ZERO,
            merkle_root: node_types::UInt256::ZERO,
            timestamp: 0,
            nonce: 0,
            index,
            primary_index: 0,
            next_consensus: UInt160::ZERO,
            witness: Witness::default(),
            state_root: None,
        }
    }

    #[test]
    fn current_index_reflects_context_height() {
        let storage = MemoryStorage::new();
        let ledger = Ledger::new();
        let ctx = InvocationContext {
            storage: &storage,
            block_height: 42,
            block_timestamp: 0,
            calling_script_hash: UInt160::ZERO,
            block_primary: UInt160::ZERO,
            witnesses: &[],
        };
        let result = ledger.invoke(&ctx, "currentIndex", &[]).unwrap();
        assert_eq!(result.as_integer().unwrap().to_string(), "42");
    }

    #[test]
    fn get_block_by_index_returns_stored_block() {
        let storage = MemoryStorage::new();
        let state = ChainState::new(&storage);
        let block = Block {
            header: sample_header(5),
            transactions: vec![],
        };
        state.put_block(&block).unwrap();
        let ledger = Ledger::new();
        let ctx = InvocationContext {
            storage: &storage,
            block_height: 5,
            block_timestamp: 0,
            calling_script_hash: UInt160::ZERO,
            block_primary: UInt160::ZERO,
            witnesses: &[],
        };
        let result = ledger.invoke(&ctx, "getBlock", &[NativeValue::Integer(5.into())]).unwrap();
        assert!(matches!(result, NativeValue::Bytes(_)));
    }
}
