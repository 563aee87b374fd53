//! GasToken: the divisible utility token. Minted as a per-block reward to
//! the primary node during `PostPersist`, spent as transaction fees, and
//! burnable directly via `burnGas`.

use node_state::dao::ChainState;
use node_types::{Fixed8, UInt160};

use crate::context::InvocationContext;
use crate::errors::NativeError;
use crate::ids;
use crate::registry::NativeContract;
use crate::value::NativeValue;

/// Reward credited to the block's primary node each `PostPersist`.
const BLOCK_REWARD_RAW: i64 = 5 * 100_000_000;

pub struct GasToken;

impl GasToken {
    pub fn new() -> Self {
        Self
    }

    fn hash(&self) -> UInt160 {
        ids::contract_hash(self.name())
    }

    pub fn balance_of(&self, ctx: &InvocationContext, account: &UInt160) -> Result<Fixed8, NativeError> {
        Ok(ChainState::new(ctx.storage).account_balance(&self.hash(), account)?.balance)
    }

    /// Credits `amount` raw units to `account`, used by block-reward
    /// minting and by the blockchain pipeline when charging fees in
    /// reverse (refunding unused system fee). Not exposed as an invoke
    /// method: only the host may mint.
    pub fn mint(&self, ctx: &InvocationContext, account: &UInt160, amount_raw: i64) -> Result<(), NativeError> {
        let state = ChainState::new(ctx.storage);
        let token = self.hash();
        let mut balance = state.account_balance(&token, account)?;
        balance.balance = balance.balance.saturating_add(Fixed8::from_raw(amount_raw));
        balance.balance_height = ctx.block_height;
        state.put_account_balance(&token, account, &balance)?;
        Ok(())
    }

    /// Debits `amount` raw units from `account`, used by the blockchain
    /// pipeline to charge system/network fees. Not exposed as an invoke
    /// method.
    pub fn burn(&self, ctx: &InvocationContext, account: &UInt160, amount_raw: i64) -> Result<(), NativeError> {
        let state = ChainState::new(ctx.storage);
        let token = self.hash();
        let mut balance = state.account_balance(&token, account)?;
        if balance.balance.raw() < amount_raw {
            return Err(NativeError::InsufficientBalance);
        }
        balance.balance = balance.balance.saturating_sub(Fixed8::from_raw(amount_raw));
        balance.balance_height = ctx.block_height;
        state.put_account_balance(&token, account, &balance)?;
        Ok(())
    }

    fn transfer(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let from = args.first().and_then(|v| v.as_hash160()).ok_or_else(|| NativeError::InvalidArgument("from".into()))?;
        let to = args.get(1).and_then(|v| v.as_hash160()).ok_or_else(|| NativeError::InvalidArgument("to".into()))?;
        let amount_raw = args
            .get(2)
            .and_then(|v| v.as_integer())
            .and_then(num_traits::ToPrimitive::to_i64)
            .ok_or_else(|| NativeError::InvalidArgument("amount".into()))?;
        if !ctx.check_witness(&from) {
            return Err(NativeError::WitnessCheckFailed(from));
        }
        self.burn(ctx, &from, amount_raw)?;
        self.mint(ctx, &to, amount_raw)?;
        Ok(NativeValue::Bool(true))
    }

    fn burn_gas(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let account = args.first().and_then(|v| v.as_hash160()).ok_or_else(|| NativeError::InvalidArgument("account".into()))?;
        let amount_raw = args
            .get(1)
            .and_then(|v| v.as_integer())
            .and_then(num_traits::ToPrimitive::to_i64)
            .ok_or_else(|| NativeError::InvalidArgument("amount".into()))?;
        if !ctx.check_witness(&account) {
            return Err(NativeError::WitnessCheckFailed(account));
        }
        self.burn(ctx, &account, amount_raw)?;
        Ok(NativeValue::Bool(true))
    }
}

impl Default for GasToken {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for GasToken {
    fn id(&self) -> i32 {
        ids::GAS_TOKEN_ID
    }

    fn hash(&self) -> UInt160 {
        GasToken::hash(self)
    }

    fn name(&self) -> &'static str {
        "GasToken"
    }

    fn post_persist(&self, ctx: &InvocationContext) -> Result<(), NativeError> {
        self.mint(ctx, &ctx.block_primary, BLOCK_REWARD_RAW)
    }

    fn invoke(
        &self,
        ctx: &InvocationContext,
        method: &str,
        args: &[NativeValue],
    ) -> Result<NativeValue, NativeError> {
        match method {
            "symbol" => Ok(NativeValue::Bytes(b"GAS".to_vec())),
            "decimals" => Ok(NativeValue::Integer(8.into())),
            "totalSupply" => {
                let prefix = node_state::keys::native_storage_prefix(ids::GAS_TOKEN_ID);
                let _ = prefix;
                Err(NativeError::UnknownMethod("totalSupply (unbounded supply, not tracked)".into(), self.name()))
            }
            "balanceOf" => {
                let account = args.first().and_then(|v| v.as_hash160()).ok_or_else(|| NativeError::InvalidArgument("account".into()))?;
                Ok(NativeValue::Integer(self.balance_of(ctx, &account)?.raw().into()))
            }
            "transfer" => self.transfer(ctx, args),
            "burnGas" => self.burn_gas(ctx, args),
            other => Err(NativeError::UnknownMethod(other.to_string(), self.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_storage::MemoryStorage;

    fn ctx(storage: &MemoryStorage, primary: UInt160) -> InvocationContext<'_> {
        InvocationContext {
            storage,
            block_height: 1,
            block_timestamp: 0,
            calling_script_hash: primary,
            block_primary: primary,
            witnesses: &[],
        }
    }

    #[test]
    fn post_persist_mints_block_reward_to_primary() {
        let storage = MemoryStorage::new();
        let gas = GasToken::new();
        let primary = UInt160([5u8; 20]);
        let c = ctx(&storage, primary);
        gas.post_persist(&c).unwrap();
        assert_eq!(gas.balance_of(&c, &primary).unwrap(), Fixed8::from_raw(BLOCK_REWARD_RAW));
    }

    #[test]
    fn burn_gas_requires_witness_and_sufficient_balance() {
        let storage = MemoryStorage::new();
        let gas = GasToken::new();
        let account = UInt160([6u8; 20]);
        let witnesses = [account];
        let c = InvocationContext {
            storage: &storage,
            block_height: 1,
            block_timestamp: 0,
            calling_script_hash: account,
            block_primary: account,
            witnesses: &witnesses,
        };
        gas.mint(&c, &account, 100).unwrap();
        let result = gas.invoke(&c, "burnGas", &[NativeValue::Hash160(account), NativeValue::Integer(50.into())]).unwrap();
        assert_eq!(result.as_bool(), Some(true));
        assert_eq!(gas.balance_of(&c, &account).unwrap(), Fixed8::from_raw(50));
        let over_burn = gas.invoke(&c, "burnGas", &[NativeValue::Hash160(account), NativeValue::Integer(1000.into())]);
        assert!(matches!(over_burn, Err(NativeError::InsufficientBalance)));
    }
}
