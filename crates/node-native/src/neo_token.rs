//! NeoToken: the non-divisible governance token. Holders vote for
//! candidates; the top-voted candidates form the committee each epoch and
//! the top subset of the committee are validators.
//!
//! Cross-contract composition with RoleManagement (designating the
//! elected validators as the `Validator` role) is out of scope here: this
//! contract keeps its own committee/validator sets, and wiring a native
//! contract to call into another is the blockchain pipeline's job, not
//! this dispatch layer's.

use node_state::dao::ChainState;
use node_types::{AccountState, Fixed8, PublicKey, UInt160};

use crate::context::InvocationContext;
use crate::errors::NativeError;
use crate::ids;
use crate::registry::NativeContract;
use crate::value::NativeValue;

const TOTAL_SUPPLY: i64 = 100_000_000;
const COMMITTEE_SIZE: usize = 7;
const VALIDATOR_COUNT: usize = 4;
const COMMITTEE_EPOCH_BLOCKS: u32 = 21;

pub struct NeoToken;

impl NeoToken {
    pub fn new() -> Self {
        Self
    }

    fn hash(&self) -> UInt160 {
        ids::contract_hash(self.name())
    }

    fn mint_genesis_supply_if_needed(&self, ctx: &InvocationContext) -> Result<(), NativeError> {
        let key = node_state::keys::native_storage(ids::NEO_TOKEN_ID, b"genesis_minted");
        if ctx.storage.contains(&key) {
            return Ok(());
        }
        let state = ChainState::new(ctx.storage);
        let mut account = state.account_balance(&self.hash(), &ctx.calling_script_hash)?;
        account.balance = Fixed8::from_i64(TOTAL_SUPPLY);
        account.balance_height = ctx.block_height;
        state.put_account_balance(&self.hash(), &ctx.calling_script_hash, &account)?;
        ctx.storage.put(&key, &[1])?;
        Ok(())
    }

    fn balance_of(&self, ctx: &InvocationContext, account: &UInt160) -> Result<Fixed8, NativeError> {
        Ok(ChainState::new(ctx.storage).account_balance(&self.hash(), account)?.balance)
    }

    fn transfer(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let from = args.first().and_then(|v| v.as_hash160()).ok_or_else(|| NativeError::InvalidArgument("from".into()))?;
        let to = args.get(1).and_then(|v| v.as_hash160()).ok_or_else(|| NativeError::InvalidArgument("to".into()))?;
        let amount = args.get(2).and_then(|v| v.as_u32()).ok_or_else(|| NativeError::InvalidArgument("amount".into()))?;
        if !ctx.check_witness(&from) {
            return Err(NativeError::WitnessCheckFailed(from));
        }
        let state = ChainState::new(ctx.storage);
        let token = self.hash();
        let mut from_account = state.account_balance(&token, &from)?;
        let amount_fixed = Fixed8::from_i64(amount as i64);
        if from_account.balance < amount_fixed {
            return Err(NativeError::InsufficientBalance);
        }
        from_account.balance = from_account.balance - amount_fixed;
        from_account.balance_height = ctx.block_height;
        state.put_account_balance(&token, &from, &from_account)?;

        let mut to_account = state.account_balance(&token, &to)?;
        to_account.balance = to_account.balance + amount_fixed;
        to_account.balance_height = ctx.block_height;
        state.put_account_balance(&token, &to, &to_account)?;

        if let Some(candidate) = from_account.vote_to {
            adjust_candidate_votes(ctx.storage, &candidate, -amount_fixed.raw())?;
        }
        if let Some(candidate) = to_account.vote_to {
            adjust_candidate_votes(ctx.storage, &candidate, amount_fixed.raw())?;
        }
        Ok(NativeValue::Bool(true))
    }

    fn register_candidate(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let pubkey = args.first().and_then(|v| v.as_public_key()).ok_or_else(|| NativeError::InvalidArgument("public key".into()))?;
        let account = node_crypto::hash160(pubkey.as_bytes());
        if !ctx.check_witness(&account) {
            return Err(NativeError::WitnessCheckFailed(account));
        }
        let key = candidate_key(&pubkey);
        if !ctx.storage.contains(&key) {
            ctx.storage.put(&key, &bincode::serialize(&0i64)?)?;
        }
        Ok(NativeValue::Bool(true))
    }

    fn unregister_candidate(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let pubkey = args.first().and_then(|v| v.as_public_key()).ok_or_else(|| NativeError::InvalidArgument("public key".into()))?;
        let account = node_crypto::hash160(pubkey.as_bytes());
        if !ctx.check_witness(&account) {
            return Err(NativeError::WitnessCheckFailed(account));
        }
        ctx.storage.delete(&candidate_key(&pubkey))?;
        Ok(NativeValue::Bool(true))
    }

    fn vote(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let account = args.first().and_then(|v| v.as_hash160()).ok_or_else(|| NativeError::InvalidArgument("account".into()))?;
        if !ctx.check_witness(&account) {
            return Err(NativeError::WitnessCheckFailed(account));
        }
        let new_candidate = args.get(1).and_then(|v| v.as_public_key());
        let state = ChainState::new(ctx.storage);
        let token = self.hash();
        let mut account_state = state.account_balance(&token, &account)?;
        let weight = account_state.balance.raw();

        if let Some(old) = account_state.vote_to {
            adjust_candidate_votes(ctx.storage, &old, -weight)?;
        }
        if let Some(new_candidate) = new_candidate {
            adjust_candidate_votes(ctx.storage, &new_candidate, weight)?;
        }
        account_state.vote_to = new_candidate;
        state.put_account_balance(&token, &account, &account_state)?;
        Ok(NativeValue::Bool(true))
    }

    fn candidates(&self, ctx: &InvocationContext) -> Result<Vec<(PublicKey, i64)>, NativeError> {
        let prefix = node_state::keys::native_storage_prefix(ids::NEO_TOKEN_ID);
        let mut candidate_prefix = prefix.clone();
        candidate_prefix.extend_from_slice(b"candidate:");
        let mut out = Vec::new();
        for (key, value) in ctx.storage.seek(&candidate_prefix, node_storage::SeekDirection::Forward) {
            let raw_key = &key[candidate_prefix.len()..];
            if let Ok(pubkey) = PublicKey::from_bytes(raw_key) {
                let votes: i64 = bincode::deserialize(&value)?;
                out.push((pubkey, votes));
            }
        }
        Ok(out)
    }

    fn elected(&self, ctx: &InvocationContext, take: usize) -> Result<Vec<PublicKey>, NativeError> {
        let mut candidates = self.candidates(ctx)?;
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_bytes().cmp(b.0.as_bytes())));
        Ok(candidates.into_iter().take(take).map(|(k, _)| k).collect())
    }
}

fn candidate_key(pubkey: &PublicKey) -> Vec<u8> {
    let mut subkey = b"candidate:".to_vec();
    subkey.extend_from_slice(pubkey.as_bytes());
    node_state::keys::native_storage(ids::NEO_TOKEN_ID, &subkey)
}

fn adjust_candidate_votes(storage: &dyn node_storage::Storage, pubkey: &PublicKey, delta: i64) -> Result<(), NativeError> {
    let key = candidate_key(pubkey);
    let current: i64 = match storage.get(&key) {
        Ok(bytes) => bincode::deserialize(&bytes)?,
        Err(node_storage::StorageError::NotFound) => 0,
        Err(e) => return Err(e.into()),
    };
    storage.put(&key, &bincode::serialize(&(current + delta))?)?;
    Ok(())
}

impl Default for NeoToken {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for NeoToken {
    fn id(&self) -> i32 {
        ids::NEO_TOKEN_ID
    }

    fn hash(&self) -> UInt160 {
        NeoToken::hash(self)
    }

    fn name(&self) -> &'static str {
        "NeoToken"
    }

    fn on_persist(&self, ctx: &InvocationContext) -> Result<(), NativeError> {
        self.mint_genesis_supply_if_needed(ctx)?;
        if ctx.block_height % COMMITTEE_EPOCH_BLOCKS != 0 {
            return Ok(());
        }
        let committee = self.elected(ctx, COMMITTEE_SIZE)?;
        let validators = committee.iter().take(VALIDATOR_COUNT).cloned().collect::<Vec<_>>();
        ctx.storage.put(
            &node_state::keys::native_storage(ids::NEO_TOKEN_ID, b"committee"),
            &bincode::serialize(&committee)?,
        )?;
        ctx.storage.put(
            &node_state::keys::native_storage(ids::NEO_TOKEN_ID, b"validators"),
            &bincode::serialize(&validators)?,
        )?;
        Ok(())
    }

    fn invoke(
        &self,
        ctx: &InvocationContext,
        method: &str,
        args: &[NativeValue],
    ) -> Result<NativeValue, NativeError> {
        match method {
            "symbol" => Ok(NativeValue::Bytes(b"NEO".to_vec())),
            "decimals" => Ok(NativeValue::Integer(0.into())),
            "totalSupply" => Ok(NativeValue::Integer(TOTAL_SUPPLY.into())),
            "balanceOf" => {
                let account = args.first().and_then(|v| v.as_hash160()).ok_or_else(|| NativeError::InvalidArgument("account".into()))?;
                Ok(NativeValue::Integer(self.balance_of(ctx, &account)?.raw().into()))
            }
            "transfer" => self.transfer(ctx, args),
            "registerCandidate" => self.register_candidate(ctx, args),
            "unregisterCandidate" => self.unregister_candidate(ctx, args),
            "vote" => self.vote(ctx, args),
            "getCandidates" => {
                let values = self
                    .candidates(ctx)?
                    .into_iter()
                    .map(|(k, v)| NativeValue::Array(vec![NativeValue::PublicKey(k), NativeValue::Integer(v.into())]))
                    .collect();
                Ok(NativeValue::Array(values))
            }
            "getCommittee" => {
                let committee = load_keys(ctx, b"committee")?;
                Ok(NativeValue::Array(committee.into_iter().map(NativeValue::PublicKey).collect()))
            }
            "getValidators" => {
                let validators = load_keys(ctx, b"validators")?;
                Ok(NativeValue::Array(validators.into_iter().map(NativeValue::PublicKey).collect()))
            }
            other => Err(NativeError::UnknownMethod(other.to_string(), self.name())),
        }
    }
}

fn load_keys(ctx: &InvocationContext, subkey: &[u8]) -> Result<Vec<PublicKey>, NativeError> {
    let key = node_state::keys::native_storage(ids::NEO_TOKEN_ID, subkey);
    match ctx.storage.get(&key) {
        Ok(bytes) => Ok(bincode::deserialize(&bytes)?),
        Err(node_storage::StorageError::NotFound) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_storage::MemoryStorage;

    #[test]
    fn genesis_mint_credits_caller_once() {
        let storage = MemoryStorage::new();
        let token = NeoToken::new();
        let minter = UInt160([1u8; 20]);
        let ctx = InvocationContext {
            storage: &storage,
            block_height: 0,
            block_timestamp: 0,
            calling_script_hash: minter,
            block_primary: UInt160::ZERO,
            witnesses: &[],
        };
        token.on_persist(&ctx).unwrap();
        assert_eq!(token.balance_of(&ctx, &minter).unwrap(), Fixed8::from_i64(TOTAL_SUPPLY));
        token.on_persist(&ctx).unwrap();
        assert_eq!(token.balance_of(&ctx, &minter).unwrap(), Fixed8::from_i64(TOTAL_SUPPLY));
    }

    #[test]
    fn transfer_without_witness_fails() {
        let storage = MemoryStorage::new();
        let token = NeoToken::new();
        let ctx = InvocationContext {
            storage: &storage,
            block_height: 0,
            block_timestamp: 0,
            calling_script_hash: UInt160::ZERO,
            block_primary: UInt160::ZERO,
            witnesses: &[],
        };
        let result = token.transfer(&ctx, &[
            NativeValue::Hash160(UInt160([1u8; 20])),
            NativeValue::Hash160(UInt160([2u8; 20])),
            NativeValue::Integer(1u32.into()),
        ]);
        assert!(matches!(result, Err(NativeError::WitnessCheckFailed(_))));
    }
}
