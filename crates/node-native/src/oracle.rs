//! OracleContract: request/response bookkeeping for off-chain data
//! requests. Fetching the remote URL and collecting oracle-node signatures
//! on the response happens in the node's oracle service, outside this
//! dispatch layer; this contract only stores the request until a response
//! is finalized and removes it once `finish` is called.

use node_types::UInt160;

use crate::context::InvocationContext;
use crate::errors::NativeError;
use crate::ids;
use crate::registry::NativeContract;
use crate::value::NativeValue;

const MIN_ORACLE_RESPONSE_FEE_RAW: i64 = 50_000_000;

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OracleRequest {
    pub url: String,
    pub filter: String,
    pub callback_contract: UInt160,
    pub callback_method: String,
    pub user_data: Vec<u8>,
    pub gas_for_response: i64,
}

pub struct Oracle;

impl Oracle {
    pub fn new() -> Self {
        Self
    }

    fn request_key(id: u64) -> Vec<u8> {
        let mut sub = b"req:".to_vec();
        sub.extend_from_slice(&id.to_be_bytes());
        sub
    }

    fn next_id(&self, ctx: &InvocationContext) -> Result<u64, NativeError> {
        let key = node_state::keys::native_storage(ids::ORACLE_ID, b"next_id");
        let id = match ctx.storage.get(&key) {
            Ok(bytes) => u64::from_be_bytes(
                bytes
                    .try_into()
                    .map_err(|_| NativeError::InvalidArgument("corrupt oracle request id counter".into()))?,
            ),
            Err(node_storage::StorageError::NotFound) => 0,
            Err(e) => return Err(e.into()),
        };
        ctx.storage.put(&key, &(id + 1).to_be_bytes())?;
        Ok(id)
    }

    fn request(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let url = args.first().and_then(|v| v.as_string()).ok_or_else(|| NativeError::InvalidArgument("url".into()))?;
        let filter = args.get(1).and_then(|v| v.as_string()).unwrap_or_default();
        let callback_contract = args
            .get(2)
            .and_then(|v| v.as_hash160())
            .ok_or_else(|| NativeError::InvalidArgument("callback contract".into()))?;
        let callback_method = args
            .get(3)
            .and_then(|v| v.as_string())
            .ok_or_else(|| NativeError::InvalidArgument("callback method".into()))?;
        let gas_for_response = args
            .get(4)
            .and_then(|v| v.as_integer())
            .and_then(num_traits::ToPrimitive::to_i64)
            .ok_or_else(|| NativeError::InvalidArgument("gas for response".into()))?;
        if gas_for_response < MIN_ORACLE_RESPONSE_FEE_RAW {
            return Err(NativeError::InvalidArgument("gas for response below minimum".into()));
        }
        let user_data = args.get(5).and_then(|v| v.as_bytes()).unwrap_or(&[]).to_vec();

        let id = self.next_id(ctx)?;
        let request = OracleRequest {
            url,
            filter,
            callback_contract,
            callback_method,
            user_data,
            gas_for_response,
        };
        let key = node_state::keys::native_storage(ids::ORACLE_ID, &Self::request_key(id));
        ctx.storage.put(&key, &bincode::serialize(&request)?)?;
        Ok(NativeValue::Integer(id.into()))
    }

    pub fn get_request(&self, ctx: &InvocationContext, id: u64) -> Result<Option<OracleRequest>, NativeError> {
        let key = node_state::keys::native_storage(ids::ORACLE_ID, &Self::request_key(id));
        match ctx.storage.get(&key) {
            Ok(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            Err(node_storage::StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the finalized request. The actual callback invocation into
    /// `callback_contract` is the blockchain pipeline's responsibility,
    /// since it requires re-entering the VM with the response payload.
    fn finish(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let id = args.first().and_then(|v| v.as_u32()).ok_or_else(|| NativeError::InvalidArgument("id".into()))? as u64;
        if self.get_request(ctx, id)?.is_none() {
            return Err(NativeError::ContractNotFound);
        }
        let key = node_state::keys::native_storage(ids::ORACLE_ID, &Self::request_key(id));
        ctx.storage.delete(&key)?;
        Ok(NativeValue::Null)
    }
}

impl Default for Oracle {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for Oracle {
    fn id(&self) -> i32 {
        ids::ORACLE_ID
    }

    fn hash(&self) -> UInt160 {
        ids::contract_hash(self.name())
    }

    fn name(&self) -> &'static str {
        "OracleContract"
    }

    fn invoke(
        &self,
        ctx: &InvocationContext,
        method: &str,
        args: &[NativeValue],
    ) -> Result<NativeValue, NativeError> {
        match method {
            "request" => self.request(ctx, args),
            "finish" => self.finish(ctx, args),
            "getRequest" => {
                let id = args.first().and_then(|v| v.as_u32()).ok_or_else(|| NativeError::InvalidArgument("id".into()))? as u64;
                match self.get_request(ctx, id)? {
                    Some(r) => Ok(NativeValue::Bytes(
                        bincode::serialize(&r).map_err(|e| NativeError::InvalidArgument(e.to_string()))?,
                    )),
                    None => Ok(NativeValue::Null),
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

    fn ctx(storage: &MemoryStorage) -> InvocationContext<'_> {
        InvocationContext {
            storage,
            block_height: 1,
            block_timestamp: 0,
            calling_script_hash: UInt160::ZERO,
            block_primary: UInt160::ZERO,
            witnesses: &[],
        }
    }

    #[test]
    fn request_then_finish_round_trips_and_clears() {
        let storage = MemoryStorage::new();
        let oracle = Oracle::new();
        let c = ctx(&storage);
        let result = oracle
            .invoke(
                &c,
                "request",
                &[
                    NativeValue::Bytes(b"https://example.test/data".to_vec()),
                    NativeValue::Bytes(b"$.value".to_vec()),
                    NativeValue::Hash160(UInt160([2u8; 20])),
                    NativeValue::Bytes(b"callback".to_vec()),
                    NativeValue::Integer(MIN_ORACLE_RESPONSE_FEE_RAW.into()),
                ],
            )
            .unwrap();
        let id = result.as_integer().unwrap().clone();
        assert_eq!(id.to_string(), "0");

        let fetched = oracle.invoke(&c, "getRequest", &[NativeValue::Integer(0u32.into())]).unwrap();
        assert!(matches!(fetched, NativeValue::Bytes(_)));

        oracle.invoke(&c, "finish", &[NativeValue::Integer(0u32.into())]).unwrap();
        let after = oracle.invoke(&c, "getRequest", &[NativeValue::Integer(0u32.into())]).unwrap();
        assert_eq!(after, NativeValue::Null);
    }

    #[test]
    fn request_below_minimum_fee_is_rejected() {
        let storage = MemoryStorage::new();
        let oracle = Oracle::new();
        let c = ctx(&storage);
        let result = oracle.invoke(
            &c,
            "request",
            &[
                NativeValue::Bytes(b"https://example.test".to_vec()),
                NativeValue::Bytes(b"".to_vec()),
                NativeValue::Hash160(UInt160::ZERO),
                NativeValue::Bytes(b"cb".to_vec()),
                NativeValue::Integer(1.into()),
            ],
        );
        assert!(matches!(result, Err(NativeError::InvalidArgument(_))));
    }
}
