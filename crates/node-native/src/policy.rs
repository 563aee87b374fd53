//! PolicyContract: fee-per-byte, storage price, execution fee factor, and
//! the blocked-account list. Committee-adjusted numeric parameters take
//! effect one block after the adjusting transaction, per protocol.

use node_types::UInt160;

use crate::context::InvocationContext;
use crate::errors::NativeError;
use crate::ids;
use crate::registry::NativeContract;
use crate::value::NativeValue;

const DEFAULT_FEE_PER_BYTE: i64 = 1000;
const DEFAULT_EXEC_FEE_FACTOR: i64 = 30;
const DEFAULT_STORAGE_PRICE: i64 = 100_000;

const FEE_PER_BYTE: &str = "fee_per_byte";
const EXEC_FEE_FACTOR: &str = "exec_fee_factor";
const STORAGE_PRICE: &str = "storage_price";

pub struct Policy;

impl Policy {
    pub fn new() -> Self {
        Self
    }

    fn current(&self, ctx: &InvocationContext, name: &str, default: i64) -> Result<i64, NativeError> {
        let key = node_state::keys::native_storage(ids::POLICY_ID, format!("cur:{name}").as_bytes());
        match ctx.storage.get(&key) {
            Ok(bytes) => Ok(bincode::deserialize(&bytes)?),
            Err(node_storage::StorageError::NotFound) => Ok(default),
            Err(e) => Err(e.into()),
        }
    }

    /// Stages `value` to become effective at `ctx.block_height + 1`; the
    /// promotion itself happens in `on_persist` of the *next* block.
    fn schedule(&self, ctx: &InvocationContext, name: &str, value: i64) -> Result<(), NativeError> {
        if !ctx.check_witness(&ctx.calling_script_hash) {
            return Err(NativeError::WitnessCheckFailed(ctx.calling_script_hash));
        }
        let key = node_state::keys::native_storage(ids::POLICY_ID, format!("pending:{name}").as_bytes());
        let activation_height = ctx.block_height + 1;
        ctx.storage.put(&key, &bincode::serialize(&(value, activation_height))?)?;
        Ok(())
    }

    fn promote_if_due(&self, ctx: &InvocationContext, name: &str) -> Result<(), NativeError> {
        let pending_key = node_state::keys::native_storage(ids::POLICY_ID, format!("pending:{name}").as_bytes());
        let (value, activation_height): (i64, u32) = match ctx.storage.get(&pending_key) {
            Ok(bytes) => bincode::deserialize(&bytes)?,
            Err(node_storage::StorageError::NotFound) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if activation_height > ctx.block_height {
            return Ok(());
        }
        let cur_key = node_state::keys::native_storage(ids::POLICY_ID, format!("cur:{name}").as_bytes());
        ctx.storage.put(&cur_key, &bincode::serialize(&value)?)?;
        ctx.storage.delete(&pending_key)?;
        Ok(())
    }

    fn is_blocked(&self, ctx: &InvocationContext, account: &UInt160) -> Result<bool, NativeError> {
        let key = node_state::keys::native_storage(ids::POLICY_ID, &blocked_subkey(account));
        Ok(ctx.storage.contains(&key))
    }
}

fn blocked_subkey(account: &UInt160) -> Vec<u8> {
    let mut key = b"blocked:".to_vec();
    key.extend_from_slice(account.as_bytes());
    key
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for Policy {
    fn id(&self) -> i32 {
        ids::POLICY_ID
    }

    fn hash(&self) -> UInt160 {
        ids::contract_hash(self.name())
    }

    fn name(&self) -> &'static str {
        "PolicyContract"
    }

    fn on_persist(&self, ctx: &InvocationContext) -> Result<(), NativeError> {
        self.promote_if_due(ctx, FEE_PER_BYTE)?;
        self.promote_if_due(ctx, EXEC_FEE_FACTOR)?;
        self.promote_if_due(ctx, STORAGE_PRICE)?;
        Ok(())
    }

    fn invoke(
        &self,
        ctx: &InvocationContext,
        method: &str,
        args: &[NativeValue],
    ) -> Result<NativeValue, NativeError> {
        match method {
            "getFeePerByte" => Ok(NativeValue::Integer(self.current(ctx, FEE_PER_BYTE, DEFAULT_FEE_PER_BYTE)?.into())),
            "getExecFeeFactor" => Ok(NativeValue::Integer(
                self.current(ctx, EXEC_FEE_FACTOR, DEFAULT_EXEC_FEE_FACTOR)?.into(),
            )),
            "getStoragePrice" => Ok(NativeValue::Integer(
                self.current(ctx, STORAGE_PRICE, DEFAULT_STORAGE_PRICE)?.into(),
            )),
            "setFeePerByte" => {
                let value = args.first().and_then(|v| v.as_u32()).ok_or_else(|| NativeError::InvalidArgument("fee".into()))?;
                self.schedule(ctx, FEE_PER_BYTE, value as i64)?;
                Ok(NativeValue::Null)
            }
            "setExecFeeFactor" => {
                let value = args.first().and_then(|v| v.as_u32()).ok_or_else(|| NativeError::InvalidArgument("factor".into()))?;
                self.schedule(ctx, EXEC_FEE_FACTOR, value as i64)?;
                Ok(NativeValue::Null)
            }
            "setStoragePrice" => {
                let value = args.first().and_then(|v| v.as_u32()).ok_or_else(|| NativeError::InvalidArgument("price".into()))?;
                self.schedule(ctx, STORAGE_PRICE, value as i64)?;
                Ok(NativeValue::Null)
            }
            "isBlocked" => {
                let account = args.first().and_then(|v| v.as_hash160()).ok_or_else(|| NativeError::InvalidArgument("account".into()))?;
                Ok(NativeValue::Bool(self.is_blocked(ctx, &account)?))
            }
            "blockAccount" => {
                if !ctx.check_witness(&ctx.calling_script_hash) {
                    return Err(NativeError::WitnessCheckFailed(ctx.calling_script_hash));
                }
                let account = args.first().and_then(|v| v.as_hash160()).ok_or_else(|| NativeError::InvalidArgument("account".into()))?;
                ctx.storage
                    .put(&node_state::keys::native_storage(ids::POLICY_ID, &blocked_subkey(&account)), &[1])?;
                Ok(NativeValue::Null)
            }
            "unblockAccount" => {
                if !ctx.check_witness(&ctx.calling_script_hash) {
                    return Err(NativeError::WitnessCheckFailed(ctx.calling_script_hash));
                }
                let account = args.first().and_then(|v| v.as_hash160()).ok_or_else(|| NativeError::InvalidArgument("account".into()))?;
                ctx.storage
                    .delete(&node_state::keys::native_storage(ids::POLICY_ID, &blocked_subkey(&account)))?;
                Ok(NativeValue::Null)
            }
            other => Err(NativeError::UnknownMethod(other.to_string(), self.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_storage::MemoryStorage;

    fn witnessed_ctx(storage: &MemoryStorage, height: u32, signer: UInt160) -> InvocationContext<'_> {
        InvocationContext {
            storage,
            block_height: height,
            block_timestamp: 0,
            calling_script_hash: signer,
            block_primary: UInt160::ZERO,
            witnesses: &[],
        }
    }

    #[test]
    fn defaults_apply_before_any_change() {
        let storage = MemoryStorage::new();
        let policy = Policy::new();
        let ctx = witnessed_ctx(&storage, 0, UInt160::ZERO);
        let result = policy.invoke(&ctx, "getFeePerByte", &[]).unwrap();
        assert_eq!(result.as_integer().unwrap().to_string(), DEFAULT_FEE_PER_BYTE.to_string());
    }

    #[test]
    fn setter_without_witness_is_rejected() {
        let storage = MemoryStorage::new();
        let policy = Policy::new();
        let ctx = InvocationContext {
            storage: &storage,
            block_height: 0,
            block_timestamp: 0,
            calling_script_hash: UInt160::ZERO,
            block_primary: UInt160::ZERO,
            witnesses: &[],
        };
        let result = policy.invoke(&ctx, "setFeePerByte", &[NativeValue::Integer(5u32.into())]);
        assert!(matches!(result, Err(NativeError::WitnessCheckFailed(_))));
    }

    #[test]
    fn change_takes_effect_one_block_after_on_persist() {
        let storage = MemoryStorage::new();
        let policy = Policy::new();
        let signer = UInt160([9u8; 20]);
        let witnesses = [signer];
        let set_ctx = InvocationContext {
            storage: &storage,
            block_height: 10,
            block_timestamp: 0,
            calling_script_hash: signer,
            block_primary: UInt160::ZERO,
            witnesses: &witnesses,
        };
        policy.invoke(&set_ctx, "setFeePerByte", &[NativeValue::Integer(500u32.into())]).unwrap();

        let same_block = witnessed_ctx(&storage, 10, signer);
        assert_eq!(
            policy.invoke(&same_block, "getFeePerByte", &[]).unwrap().as_integer().unwrap().to_string(),
            DEFAULT_FEE_PER_BYTE.to_string()
        );

        let next_block = witnessed_ctx(&storage, 11, signer);
        policy.on_persist(&next_block).unwrap();
        assert_eq!(
            policy.invoke(&next_block, "getFeePerByte", &[]).unwrap().as_integer().unwrap().to_string(),
            "500"
        );
    }

    #[test]
    fn blocked_account_round_trips() {
        let storage = MemoryStorage::new();
        let policy = Policy::new();
        let signer = UInt160([3u8; 20]);
        let witnesses = [signer];
        let ctx = InvocationContext {
            storage: &storage,
            block_height: 0,
            block_timestamp: 0,
            calling_script_hash: signer,
            block_primary: UInt160::ZERO,
            witnesses: &witnesses,
        };
        let target = UInt160([7u8; 20]);
        policy.invoke(&ctx, "blockAccount", &[NativeValue::Hash160(target)]).unwrap();
        assert!(policy.invoke(&ctx, "isBlocked", &[NativeValue::Hash160(target)]).unwrap().as_bool().unwrap());
        policy.invoke(&ctx, "unblockAccount", &[NativeValue::Hash160(target)]).unwrap();
        assert!(!policy.invoke(&ctx, "isBlocked", &[NativeValue::Hash160(target)]).unwrap().as_bool().unwrap());
    }
}
