//! CryptoLib: stateless cryptographic primitives exposed to scripts —
//! hashing, secp256k1 signature verification (secp256r1 is covered
//! directly by `System.Crypto.CheckSig`) and base58/base58check codecs.

use node_types::UInt160;

use crate::context::InvocationContext;
use crate::errors::NativeError;
use crate::ids;
use crate::registry::NativeContract;
use crate::value::NativeValue;

pub struct CryptoLib;

impl CryptoLib {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CryptoLib {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for CryptoLib {
    fn id(&self) -> i32 {
        ids::CRYPTO_LIB_ID
    }

    fn hash(&self) -> UInt160 {
        ids::contract_hash(self.name())
    }

    fn name(&self) -> &'static str {
        "CryptoLib"
    }

    fn invoke(
        &self,
        _ctx: &InvocationContext,
        method: &str,
        args: &[NativeValue],
    ) -> Result<NativeValue, NativeError> {
        match method {
            "sha256" => {
                let data = args.first().and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("data".into()))?;
                Ok(NativeValue::Bytes(node_crypto::hashing::sha256(data).to_vec()))
            }
            "ripemd160" => {
                let data = args.first().and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("data".into()))?;
                Ok(NativeValue::Bytes(node_crypto::hash160(data).as_bytes().to_vec()))
            }
            "hash160" => {
                let data = args.first().and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("data".into()))?;
                Ok(NativeValue::Hash160(node_crypto::hash160(data)))
            }
            "hash256" => {
                let data = args.first().and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("data".into()))?;
                Ok(NativeValue::Hash256(node_crypto::hash256(data)))
            }
            "keccak256" => {
                let data = args.first().and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("data".into()))?;
                Ok(NativeValue::Bytes(node_crypto::keccak256(data).to_vec()))
            }
            "verifyWithECDsaSecp256k1" => {
                let message = args.first().and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("message".into()))?;
                let public_key = args
                    .get(1)
                    .and_then(|v| v.as_bytes())
                    .ok_or_else(|| NativeError::InvalidArgument("public key".into()))?;
                let signature = args
                    .get(2)
                    .and_then(|v| v.as_bytes())
                    .ok_or_else(|| NativeError::InvalidArgument("signature".into()))?;
                Ok(NativeValue::Bool(node_crypto::verify_secp256k1(public_key, message, signature).is_ok()))
            }
            "base58CheckEncode" => {
                let data = args.first().and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("data".into()))?;
                if data.is_empty() {
                    return Err(NativeError::InvalidArgument("data".into()));
                }
                let (version, rest) = (data[0], &data[1..]);
                let hash = UInt160::from_bytes(rest).map_err(|e| NativeError::InvalidArgument(e.to_string()))?;
                Ok(NativeValue::Bytes(node_crypto::encode_address(version, &hash).into_bytes()))
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
    fn sha256_matches_direct_call() {
        let storage = MemoryStorage::new();
        let lib = CryptoLib::new();
        let c = ctx(&storage);
        let result = lib.invoke(&c, "sha256", &[NativeValue::Bytes(b"neo".to_vec())]).unwrap();
        assert_eq!(result, NativeValue::Bytes(node_crypto::hashing::sha256(b"neo").to_vec()));
    }

    #[test]
    fn secp256k1_signature_verifies() {
        let storage = MemoryStorage::new();
        let lib = CryptoLib::new();
        let c = ctx(&storage);
        let kp = node_crypto::Secp256k1KeyPair::generate();
        let msg = b"cryptolib call";
        let sig = kp.sign(msg);
        let result = lib
            .invoke(
                &c,
                "verifyWithECDsaSecp256k1",
                &[
                    NativeValue::Bytes(msg.to_vec()),
                    NativeValue::Bytes(kp.public_key_sec1()),
                    NativeValue::Bytes(sig.to_vec()),
                ],
            )
            .unwrap();
        assert_eq!(result.as_bool(), Some(true));
    }
}
