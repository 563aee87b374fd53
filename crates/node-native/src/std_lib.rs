//! StdLib: primitive data conversions exposed to scripts — base64,
//! integer/string conversion, and JSON (de)serialization of a restricted
//! value shape.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use node_types::UInt160;
use num_bigint::BigInt;
use num_traits::Num;

use crate::context::InvocationContext;
use crate::errors::NativeError;
use crate::ids;
use crate::registry::NativeContract;
use crate::value::NativeValue;

pub struct StdLib;

impl StdLib {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdLib {
    fn default() -> Self {
        Self::new()
    }
}

fn json_to_native(value: &serde_json::Value) -> Result<NativeValue, NativeError> {
    match value {
        serde_json::Value::Null => Ok(NativeValue::Null),
        serde_json::Value::Bool(b) => Ok(NativeValue::Bool(*b)),
        serde_json::Value::Number(n) => {
            let i = n.as_i64().ok_or_else(|| NativeError::InvalidArgument("non-integer json number".into()))?;
            Ok(NativeValue::Integer(i.into()))
        }
        serde_json::Value::String(s) => Ok(NativeValue::Bytes(s.as_bytes().to_vec())),
        serde_json::Value::Array(items) => Ok(NativeValue::Array(
            items.iter().map(json_to_native).collect::<Result<Vec<_>, _>>()?,
        )),
        serde_json::Value::Object(_) => Err(NativeError::InvalidArgument("json objects are not representable".into())),
    }
}

fn native_to_json(value: &NativeValue) -> serde_json::Value {
    match value {
        NativeValue::Null => serde_json::Value::Null,
        NativeValue::Bool(b) => serde_json::Value::Bool(*b),
        NativeValue::Integer(i) => serde_json::json!(i.to_string()),
        NativeValue::Bytes(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
        NativeValue::Hash160(h) => serde_json::Value::String(h.to_hex_le()),
        NativeValue::Hash256(h) => serde_json::Value::String(h.to_hex_le()),
        NativeValue::PublicKey(k) => serde_json::Value::String(k.to_string()),
        NativeValue::Array(items) => serde_json::Value::Array(items.iter().map(native_to_json).collect()),
    }
}

impl NativeContract for StdLib {
    fn id(&self) -> i32 {
        ids::STD_LIB_ID
    }

    fn hash(&self) -> UInt160 {
        ids::contract_hash(self.name())
    }

    fn name(&self) -> &'static str {
        "StdLib"
    }

    fn invoke(
        &self,
        _ctx: &InvocationContext,
        method: &str,
        args: &[NativeValue],
    ) -> Result<NativeValue, NativeError> {
        match method {
            "base64Encode" => {
                let data = args.first().and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("data".into()))?;
                Ok(NativeValue::Bytes(BASE64.encode(data).into_bytes()))
            }
            "base64Decode" => {
                let text = args.first().and_then(|v| v.as_string()).ok_or_else(|| NativeError::InvalidArgument("text".into()))?;
                let decoded = BASE64.decode(&text).map_err(|e| NativeError::InvalidArgument(e.to_string()))?;
                Ok(NativeValue::Bytes(decoded))
            }
            "base58Encode" => {
                let data = args.first().and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("data".into()))?;
                Ok(NativeValue::Bytes(bs58::encode(data).into_string().into_bytes()))
            }
            "base58Decode" => {
                let text = args.first().and_then(|v| v.as_string()).ok_or_else(|| NativeError::InvalidArgument("text".into()))?;
                let decoded = bs58::decode(&text).into_vec().map_err(|e| NativeError::InvalidArgument(e.to_string()))?;
                Ok(NativeValue::Bytes(decoded))
            }
            "itoa" => {
                let value = args.first().and_then(|v| v.as_integer()).ok_or_else(|| NativeError::InvalidArgument("value".into()))?;
                Ok(NativeValue::Bytes(value.to_string().into_bytes()))
            }
            "atoi" => {
                let text = args.first().and_then(|v| v.as_string()).ok_or_else(|| NativeError::InvalidArgument("text".into()))?;
                let radix = args.get(1).and_then(|v| v.as_u32()).unwrap_or(10);
                let value = BigInt::from_str_radix(&text, radix).map_err(|e| NativeError::InvalidArgument(e.to_string()))?;
                Ok(NativeValue::Integer(value))
            }
            "jsonSerialize" => {
                let value = args.first().ok_or_else(|| NativeError::InvalidArgument("value".into()))?;
                let json = serde_json::to_vec(&native_to_json(value)).map_err(|e| NativeError::InvalidArgument(e.to_string()))?;
                Ok(NativeValue::Bytes(json))
            }
            "jsonDeserialize" => {
                let text = args.first().and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("json".into()))?;
                let parsed: serde_json::Value = serde_json::from_slice(text).map_err(|e| NativeError::InvalidArgument(e.to_string()))?;
                json_to_native(&parsed)
            }
            "memoryCompare" => {
                let a = args.first().and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("a".into()))?;
                let b = args.get(1).and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("b".into()))?;
                Ok(NativeValue::Integer((a.cmp(b) as i32).into()))
            }
            "memorySearch" => {
                let haystack = args.first().and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("haystack".into()))?;
                let needle = args.get(1).and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("needle".into()))?;
                let found = haystack
                    .windows(needle.len().max(1))
                    .position(|w| w == needle)
                    .map(|p| p as i64)
                    .unwrap_or(-1);
                Ok(NativeValue::Integer(found.into()))
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
            block_height: 0,
            block_timestamp: 0,
            calling_script_hash: UInt160::ZERO,
            block_primary: UInt160::ZERO,
            witnesses: &[],
        }
    }

    #[test]
    fn base64_round_trips() {
        let storage = MemoryStorage::new();
        let std_lib = StdLib::new();
        let c = ctx(&storage);
        let encoded = std_lib.invoke(&c, "base64Encode", &[NativeValue::Bytes(b"neo".to_vec())]).unwrap();
        let decoded = std_lib.invoke(&c, "base64Decode", &[encoded]).unwrap();
        assert_eq!(decoded, NativeValue::Bytes(b"neo".to_vec()));
    }

    #[test]
    fn atoi_itoa_round_trips() {
        let storage = MemoryStorage::new();
        let std_lib = StdLib::new();
        let c = ctx(&storage);
        let text = std_lib.invoke(&c, "itoa", &[NativeValue::Integer(42.into())]).unwrap();
        assert_eq!(text, NativeValue::Bytes(b"42".to_vec()));
        let back = std_lib.invoke(&c, "atoi", &[text, NativeValue::Integer(10u32.into())]).unwrap();
        assert_eq!(back, NativeValue::Integer(42.into()));
    }

    #[test]
    fn json_round_trips_array_of_integers() {
        let storage = MemoryStorage::new();
        let std_lib = StdLib::new();
        let c = ctx(&storage);
        let array = NativeValue::Array(vec![NativeValue::Integer(1.into()), NativeValue::Integer(2.into())]);
        let serialized = std_lib.invoke(&c, "jsonSerialize", &[array.clone()]).unwrap();
        let deserialized = std_lib.invoke(&c, "jsonDeserialize", &[serialized]).unwrap();
        assert_eq!(deserialized, array);
    }

    #[test]
    fn memory_search_finds_substring() {
        let storage = MemoryStorage::new();
        let std_lib = StdLib::new();
        let c = ctx(&storage);
        let result = std_lib
            .invoke(
                &c,
                "memorySearch",
                &[NativeValue::Bytes(b"hello world".to_vec()), NativeValue::Bytes(b"world".to_vec())],
            )
            .unwrap();
        assert_eq!(result, NativeValue::Integer(6.into()));
    }
}
