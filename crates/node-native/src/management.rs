//! ContractManagement: deploy/update/destroy and contract lookup. Positive
//! contract ids are assigned from a monotonic counter kept in this
//! contract's own storage slot; native contracts keep the negative ids in
//! `ids`.

use node_state::dao::ChainState;
use node_types::{ContractManifest, ContractState, NefFile, UInt160};

use crate::context::InvocationContext;
use crate::errors::NativeError;
use crate::ids;
use crate::registry::NativeContract;
use crate::value::NativeValue;

pub struct Management;

impl Management {
    pub fn new() -> Self {
        Self
    }

    fn next_contract_id(&self, ctx: &InvocationContext) -> Result<i32, NativeError> {
        let key = node_state::keys::native_storage(ids::MANAGEMENT_ID, b"next_id");
        let id = match ctx.storage.get(&key) {
            Ok(bytes) => i32::from_be_bytes(
                bytes
                    .try_into()
                    .map_err(|_| NativeError::InvalidArgument("corrupt contract id counter".into()))?,
            ),
            Err(node_storage::StorageError::NotFound) => 1,
            Err(e) => return Err(e.into()),
        };
        ctx.storage.put(&key, &(id + 1).to_be_bytes())?;
        Ok(id)
    }

    fn deploy(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let script = args
            .first()
            .and_then(|v| v.as_bytes())
            .ok_or_else(|| NativeError::InvalidArgument("nef script".into()))?;
        let manifest_json = args
            .get(1)
            .and_then(|v| v.as_bytes())
            .ok_or_else(|| NativeError::InvalidArgument("manifest".into()))?;
        let manifest: ContractManifest =
            serde_json::from_slice(manifest_json).map_err(|e| NativeError::InvalidArgument(e.to_string()))?;

        let sender = ctx.calling_script_hash;
        let checksum = nef_checksum(script);
        let hash = compute_contract_hash(&sender, checksum, &manifest.name);

        let state = ChainState::new(ctx.storage);
        if state.contract_state(&hash)?.is_some() {
            return Err(NativeError::ContractAlreadyExists);
        }
        let id = self.next_contract_id(ctx)?;
        let contract = ContractState {
            id,
            update_counter: 0,
            hash,
            nef: NefFile {
                compiler: "neo-rust".to_string(),
                source: String::new(),
                script: script.to_vec(),
                checksum,
            },
            manifest,
        };
        state.put_contract_state(&hash, &contract)?;
        Ok(NativeValue::Hash160(hash))
    }

    fn update(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let hash = args
            .first()
            .and_then(|v| v.as_hash160())
            .ok_or_else(|| NativeError::InvalidArgument("hash".into()))?;
        if !ctx.check_witness(&hash) {
            return Err(NativeError::WitnessCheckFailed(hash));
        }
        let state = ChainState::new(ctx.storage);
        let mut contract = state.contract_state(&hash)?.ok_or(NativeError::ContractNotFound)?;
        if let Some(script) = args.get(1).and_then(|v| v.as_bytes()) {
            contract.nef.checksum = nef_checksum(script);
            contract.nef.script = script.to_vec();
        }
        if let Some(manifest_json) = args.get(2).and_then(|v| v.as_bytes()) {
            contract.manifest =
                serde_json::from_slice(manifest_json).map_err(|e| NativeError::InvalidArgument(e.to_string()))?;
        }
        contract.update_counter += 1;
        state.put_contract_state(&hash, &contract)?;
        Ok(NativeValue::Null)
    }

    fn destroy(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let hash = args
            .first()
            .and_then(|v| v.as_hash160())
            .ok_or_else(|| NativeError::InvalidArgument("hash".into()))?;
        if !ctx.check_witness(&hash) {
            return Err(NativeError::WitnessCheckFailed(hash));
        }
        ChainState::new(ctx.storage).delete_contract_state(&hash)?;
        Ok(NativeValue::Null)
    }
}

impl Default for Management {
    fn default() -> Self {
        Self::new()
    }
}

/// Combines sender, NEF checksum and manifest name the same way the
/// protocol's reference `GetContractHash` does, so redeploying the same
/// source from the same sender never collides with an unrelated contract.
fn compute_contract_hash(sender: &UInt160, nef_checksum: u32, name: &str) -> UInt160 {
    let mut buf = Vec::with_capacity(20 + 4 + name.len());
    buf.extend_from_slice(sender.as_bytes());
    buf.extend_from_slice(&nef_checksum.to_le_bytes());
    buf.extend_from_slice(name.as_bytes());
    node_crypto::hash160(&buf)
}

fn nef_checksum(script: &[u8]) -> u32 {
    node_crypto::hash160(script)
        .0
        .iter()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as u32))
}

impl NativeContract for Management {
    fn id(&self) -> i32 {
        ids::MANAGEMENT_ID
    }

    fn hash(&self) -> UInt160 {
        ids::contract_hash(self.name())
    }

    fn name(&self) -> &'static str {
        "ContractManagement"
    }

    fn invoke(
        &self,
        ctx: &InvocationContext,
        method: &str,
        args: &[NativeValue],
    ) -> Result<NativeValue, NativeError> {
        match method {
            "deploy" => self.deploy(ctx, args),
            "update" => self.update(ctx, args),
            "destroy" => self.destroy(ctx, args),
            "getContract" => {
                let hash = args
                    .first()
                    .and_then(|v| v.as_hash160())
                    .ok_or_else(|| NativeError::InvalidArgument("hash".into()))?;
                match ChainState::new(ctx.storage).contract_state(&hash)? {
                    Some(c) => Ok(NativeValue::Bytes(
                        serde_json::to_vec(&c).map_err(|e| NativeError::InvalidArgument(e.to_string()))?,
                    )),
                    None => Ok(NativeValue::Null),
                }
            }
            "getContractHashes" => {
                let hashes = ChainState::new(ctx.storage)
                    .all_contracts()?
                    .into_iter()
                    .map(|c| NativeValue::Hash160(c.hash))
                    .collect();
                Ok(NativeValue::Array(hashes))
            }
            "hasMethod" => {
                let hash = args
                    .first()
                    .and_then(|v| v.as_hash160())
                    .ok_or_else(|| NativeError::InvalidArgument("hash".into()))?;
                let method_name = args
                    .get(1)
                    .and_then(|v| v.as_string())
                    .ok_or_else(|| NativeError::InvalidArgument("method name".into()))?;
                let param_count = args.get(2).and_then(|v| v.as_u16()).unwrap_or(0);
                let found = ChainState::new(ctx.storage)
                    .contract_state(&hash)?
                    .map(|c| c.method(&method_name, param_count).is_some())
                    .unwrap_or(false);
                Ok(NativeValue::Bool(found))
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
            calling_script_hash: UInt160([1u8; 20]),
            block_primary: UInt160::ZERO,
            witnesses: &[],
        }
    }

    fn manifest_bytes(name: &str) -> Vec<u8> {
        let manifest = ContractManifest {
            name: name.to_string(),
            ..Default::default()
        };
        serde_json::to_vec(&manifest).unwrap()
    }

    #[test]
    fn deploy_then_get_contract_round_trips() {
        let storage = MemoryStorage::new();
        let management = Management::new();
        let c = ctx(&storage);
        let result = management
            .invoke(
                &c,
                "deploy",
                &[
                    NativeValue::Bytes(vec![0x51, 0x52]),
                    NativeValue::Bytes(manifest_bytes("Example")),
                ],
            )
            .unwrap();
        let hash = result.as_hash160().unwrap();
        let fetched = management.invoke(&c, "getContract", &[NativeValue::Hash160(hash)]).unwrap();
        assert!(matches!(fetched, NativeValue::Bytes(_)));
    }

    #[test]
    fn deploying_same_manifest_twice_for_same_sender_fails() {
        let storage = MemoryStorage::new();
        let management = Management::new();
        let c = ctx(&storage);
        let args = vec![NativeValue::Bytes(vec![1, 2, 3]), NativeValue::Bytes(manifest_bytes("Dup"))];
        management.invoke(&c, "deploy", &args).unwrap();
        assert!(matches!(
            management.invoke(&c, "deploy", &args),
            Err(NativeError::ContractAlreadyExists)
        ));
    }

    #[test]
    fn destroy_without_witness_is_rejected() {
        let storage = MemoryStorage::new();
        let management = Management::new();
        let c = ctx(&storage);
        let result = management
            .invoke(
                &c,
                "deploy",
                &[NativeValue::Bytes(vec![1]), NativeValue::Bytes(manifest_bytes("NoWitness"))],
            )
            .unwrap();
        let hash = result.as_hash160().unwrap();
        assert!(matches!(
            management.invoke(&c, "destroy", &[NativeValue::Hash160(hash)]),
            Err(NativeError::WitnessCheckFailed(_))
        ));
    }
}
