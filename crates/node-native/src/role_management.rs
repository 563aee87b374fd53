//! RoleManagement: committee-designated membership lists for named roles
//! (StateValidator, Oracle, NeoFSAlphabet, P2pNotary). Each designation
//! replaces the previous membership outright; callers read the list that
//! was active as of a given block height.

use node_types::{PublicKey, UInt160};

use crate::context::InvocationContext;
use crate::errors::NativeError;
use crate::ids;
use crate::registry::NativeContract;
use crate::value::NativeValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    StateValidator,
    Oracle,
    NeoFsAlphabet,
    P2pNotary,
}

impl Role {
    fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            4 => Some(Role::StateValidator),
            8 => Some(Role::Oracle),
            16 => Some(Role::NeoFsAlphabet),
            32 => Some(Role::P2pNotary),
            _ => None,
        }
    }

    fn tag(self) -> u8 {
        match self {
            Role::StateValidator => 4,
            Role::Oracle => 8,
            Role::NeoFsAlphabet => 16,
            Role::P2pNotary => 32,
        }
    }
}

pub struct RoleManagement;

impl RoleManagement {
    pub fn new() -> Self {
        Self
    }

    fn members_key(role: Role, height: u32) -> Vec<u8> {
        let mut sub = vec![b'r', role.tag()];
        sub.extend_from_slice(&height.to_be_bytes());
        sub
    }

    fn members_prefix(role: Role) -> Vec<u8> {
        vec![b'r', role.tag()]
    }

    /// Members in effect as of `height`: the designation with the largest
    /// activation height not exceeding `height`.
    pub fn members_at(&self, ctx: &InvocationContext, role: Role, height: u32) -> Result<Vec<PublicKey>, NativeError> {
        let prefix = node_state::keys::native_storage(ids::ROLE_MANAGEMENT_ID, &Self::members_prefix(role));
        let mut best: Option<(u32, Vec<u8>)> = None;
        for (key, value) in ctx.storage.seek(&prefix, node_storage::SeekDirection::Backward) {
            if key.len() < prefix.len() + 4 {
                continue;
            }
            let activation = u32::from_be_bytes(key[prefix.len()..prefix.len() + 4].try_into().unwrap());
            if activation <= height {
                best = Some((activation, value));
                break;
            }
        }
        match best {
            Some((_, bytes)) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn designate(&self, ctx: &InvocationContext, role: Role, members: Vec<PublicKey>) -> Result<(), NativeError> {
        if !ctx.check_witness(&ctx.calling_script_hash) {
            return Err(NativeError::WitnessCheckFailed(ctx.calling_script_hash));
        }
        let key = node_state::keys::native_storage(ids::ROLE_MANAGEMENT_ID, &Self::members_key(role, ctx.block_height + 1));
        ctx.storage.put(&key, &bincode::serialize(&members)?)?;
        Ok(())
    }
}

impl Default for RoleManagement {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for RoleManagement {
    fn id(&self) -> i32 {
        ids::ROLE_MANAGEMENT_ID
    }

    fn hash(&self) -> UInt160 {
        ids::contract_hash(self.name())
    }

    fn name(&self) -> &'static str {
        "RoleManagement"
    }

    fn invoke(
        &self,
        ctx: &InvocationContext,
        method: &str,
        args: &[NativeValue],
    ) -> Result<NativeValue, NativeError> {
        match method {
            "getDesignatedByRole" => {
                let role = args
                    .first()
                    .and_then(|v| v.as_u32())
                    .and_then(|t| Role::from_u8(t as u8))
                    .ok_or_else(|| NativeError::InvalidArgument("role".into()))?;
                let height = args.get(1).and_then(|v| v.as_u32()).unwrap_or(ctx.block_height);
                let members = self.members_at(ctx, role, height)?;
                Ok(NativeValue::Array(members.into_iter().map(NativeValue::PublicKey).collect()))
            }
            "designateAsRole" => {
                let role = args
                    .first()
                    .and_then(|v| v.as_u32())
                    .and_then(|t| Role::from_u8(t as u8))
                    .ok_or_else(|| NativeError::InvalidArgument("role".into()))?;
                let members = args
                    .get(1)
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| NativeError::InvalidArgument("members".into()))?
                    .iter()
                    .map(|v| v.as_public_key().ok_or_else(|| NativeError::InvalidArgument("public key".into())))
                    .collect::<Result<Vec<_>, _>>()?;
                self.designate(ctx, role, members)?;
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

    fn ctx(storage: &MemoryStorage, height: u32, signer: UInt160, witnesses: &[UInt160]) -> InvocationContext<'_> {
        InvocationContext {
            storage,
            block_height: height,
            block_timestamp: 0,
            calling_script_hash: signer,
            block_primary: UInt160::ZERO,
            witnesses,
        }
    }

    fn sample_key(seed: u8) -> PublicKey {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        bytes[1] = seed;
        PublicKey::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn designation_takes_effect_next_block_and_is_readable_by_height() {
        let storage = MemoryStorage::new();
        let roles = RoleManagement::new();
        let signer = UInt160([1u8; 20]);
        let witnesses = [signer];
        let c = ctx(&storage, 10, signer, &witnesses);
        let key = sample_key(9);
        roles
            .invoke(
                &c,
                "designateAsRole",
                &[NativeValue::Integer(Role::Oracle.tag().into()), NativeValue::Array(vec![NativeValue::PublicKey(key)])],
            )
            .unwrap();

        let before = roles.members_at(&c, Role::Oracle, 10).unwrap();
        assert!(before.is_empty());

        let after = roles.members_at(&c, Role::Oracle, 11).unwrap();
        assert_eq!(after, vec![key]);
    }

    #[test]
    fn designate_without_witness_is_rejected() {
        let storage = MemoryStorage::new();
        let roles = RoleManagement::new();
        let c = ctx(&storage, 0, UInt160::ZERO, &[]);
        let result = roles.invoke(
            &c,
            "designateAsRole",
            &[NativeValue::Integer(Role::Oracle.tag().into()), NativeValue::Array(vec![])],
        );
        assert!(matches!(result, Err(NativeError::WitnessCheckFailed(_))));
    }
}
