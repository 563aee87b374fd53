//! NameService: register/renew/resolve for the domain records used by
//! contracts that look up other contracts by name instead of hash.
//! Pricing and auction mechanics from the full NNS contract are out of
//! scope here; this keeps only ownership, expiry and record resolution.

use node_types::UInt160;

use crate::context::InvocationContext;
use crate::errors::NativeError;
use crate::ids;
use crate::registry::NativeContract;
use crate::value::NativeValue;

const DEFAULT_REGISTRATION_BLOCKS: u32 = 365 * 24 * 60 * 60 / 15;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
struct DomainRecord {
    owner: UInt160,
    expires_at: u32,
    text: Vec<u8>,
}

pub struct NameService;

impl NameService {
    pub fn new() -> Self {
        Self
    }

    fn domain_key(name: &str) -> Vec<u8> {
        let mut sub = b"dom:".to_vec();
        sub.extend_from_slice(name.as_bytes());
        sub
    }

    fn load(&self, ctx: &InvocationContext, name: &str) -> Result<Option<DomainRecord>, NativeError> {
        let key = node_state::keys::native_storage(ids::NAME_SERVICE_ID, &Self::domain_key(name));
        match ctx.storage.get(&key) {
            Ok(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            Err(node_storage::StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, ctx: &InvocationContext, name: &str, record: &DomainRecord) -> Result<(), NativeError> {
        let key = node_state::keys::native_storage(ids::NAME_SERVICE_ID, &Self::domain_key(name));
        ctx.storage.put(&key, &bincode::serialize(record)?)?;
        Ok(())
    }

    fn register(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let name = args.first().and_then(|v| v.as_string()).ok_or_else(|| NativeError::InvalidArgument("name".into()))?;
        let owner = args.get(1).and_then(|v| v.as_hash160()).ok_or_else(|| NativeError::InvalidArgument("owner".into()))?;
        if !ctx.check_witness(&owner) {
            return Err(NativeError::WitnessCheckFailed(owner));
        }
        if let Some(existing) = self.load(ctx, &name)? {
            if existing.expires_at > ctx.block_height {
                return Err(NativeError::ContractAlreadyExists);
            }
        }
        let record = DomainRecord {
            owner,
            expires_at: ctx.block_height + DEFAULT_REGISTRATION_BLOCKS,
            text: Vec::new(),
        };
        self.store(ctx, &name, &record)?;
        Ok(NativeValue::Bool(true))
    }

    fn renew(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let name = args.first().and_then(|v| v.as_string()).ok_or_else(|| NativeError::InvalidArgument("name".into()))?;
        let mut record = self.load(ctx, &name)?.ok_or(NativeError::ContractNotFound)?;
        if !ctx.check_witness(&record.owner) {
            return Err(NativeError::WitnessCheckFailed(record.owner));
        }
        record.expires_at += DEFAULT_REGISTRATION_BLOCKS;
        self.store(ctx, &name, &record)?;
        Ok(NativeValue::Integer(record.expires_at.into()))
    }

    fn set_record(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let name = args.first().and_then(|v| v.as_string()).ok_or_else(|| NativeError::InvalidArgument("name".into()))?;
        let text = args.get(1).and_then(|v| v.as_bytes()).ok_or_else(|| NativeError::InvalidArgument("text".into()))?;
        let mut record = self.load(ctx, &name)?.ok_or(NativeError::ContractNotFound)?;
        if !ctx.check_witness(&record.owner) {
            return Err(NativeError::WitnessCheckFailed(record.owner));
        }
        record.text = text.to_vec();
        self.store(ctx, &name, &record)?;
        Ok(NativeValue::Null)
    }

    fn resolve(&self, ctx: &InvocationContext, args: &[NativeValue]) -> Result<NativeValue, NativeError> {
        let name = args.first().and_then(|v| v.as_string()).ok_or_else(|| NativeError::InvalidArgument("name".into()))?;
        match self.load(ctx, &name)? {
            Some(record) if record.expires_at > ctx.block_height => Ok(NativeValue::Bytes(record.text)),
            _ => Ok(NativeValue::Null),
        }
    }
}

impl Default for NameService {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for NameService {
    fn id(&self) -> i32 {
        ids::NAME_SERVICE_ID
    }

    fn hash(&self) -> UInt160 {
        ids::contract_hash(self.name())
    }

    fn name(&self) -> &'static str {
        "NameService"
    }

    fn invoke(
        &self,
        ctx: &InvocationContext,
        method: &str,
        args: &[NativeValue],
    ) -> Result<NativeValue, NativeError> {
        match method {
            "register" => self.register(ctx, args),
            "renew" => self.renew(ctx, args),
            "setRecord" => self.set_record(ctx, args),
            "resolve" => self.resolve(ctx, args),
            "isAvailable" => {
                let name = args.first().and_then(|v| v.as_string()).ok_or_else(|| NativeError::InvalidArgument("name".into()))?;
                let available = match self.load(ctx, &name)? {
                    Some(record) => record.expires_at <= ctx.block_height,
                    None => true,
                };
                Ok(NativeValue::Bool(available))
            }
            other => Err(NativeError::UnknownMethod(other.to_string(), self.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_storage::MemoryStorage;

    fn ctx(storage: &MemoryStorage, height: u32, owner: UInt160, witnesses: &[UInt160]) -> InvocationContext<'_> {
        InvocationContext {
            storage,
            block_height: height,
            block_timestamp: 0,
            calling_script_hash: owner,
            block_primary: UInt160::ZERO,
            witnesses,
        }
    }

    #[test]
    fn register_then_resolve_round_trips() {
        let storage = MemoryStorage::new();
        let nns = NameService::new();
        let owner = UInt160([4u8; 20]);
        let witnesses = [owner];
        let c = ctx(&storage, 0, owner, &witnesses);
        nns.invoke(&c, "register", &[NativeValue::Bytes(b"example.neo".to_vec()), NativeValue::Hash160(owner)])
            .unwrap();
        nns.invoke(&c, "setRecord", &[NativeValue::Bytes(b"example.neo".to_vec()), NativeValue::Bytes(b"1.2.3.4".to_vec())])
            .unwrap();
        let resolved = nns.invoke(&c, "resolve", &[NativeValue::Bytes(b"example.neo".to_vec())]).unwrap();
        assert_eq!(resolved, NativeValue::Bytes(b"1.2.3.4".to_vec()));
    }

    #[test]
    fn registering_an_unexpired_domain_twice_fails() {
        let storage = MemoryStorage::new();
        let nns = NameService::new();
        let owner = UInt160([4u8; 20]);
        let witnesses = [owner];
        let c = ctx(&storage, 0, owner, &witnesses);
        let args = vec![NativeValue::Bytes(b"taken.neo".to_vec()), NativeValue::Hash160(owner)];
        nns.invoke(&c, "register", &args).unwrap();
        assert!(matches!(nns.invoke(&c, "register", &args), Err(NativeError::ContractAlreadyExists)));
    }

    #[test]
    fn expired_domain_is_available_again() {
        let storage = MemoryStorage::new();
        let nns = NameService::new();
        let owner = UInt160([4u8; 20]);
        let witnesses = [owner];
        let early = ctx(&storage, 0, owner, &witnesses);
        nns.invoke(&early, "register", &[NativeValue::Bytes(b"lapsed.neo".to_vec()), NativeValue::Hash160(owner)])
            .unwrap();
        let later = ctx(&storage, DEFAULT_REGISTRATION_BLOCKS + 1, owner, &witnesses);
        let result = nns.invoke(&later, "isAvailable", &[NativeValue::Bytes(b"lapsed.neo".to_vec())]).unwrap();
        assert_eq!(result.as_bool(), Some(true));
    }
}
