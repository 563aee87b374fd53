//! Dispatch table routing `System.Contract.CallNative` to the built-in
//! contract implementations, and the block-persist hooks the blockchain
//! pipeline invokes around every block.

use std::collections::HashMap;

use node_types::UInt160;

use crate::context::InvocationContext;
use crate::errors::NativeError;
use crate::value::NativeValue;

pub trait NativeContract: Send + Sync {
    fn id(&self) -> i32;
    fn hash(&self) -> UInt160;
    fn name(&self) -> &'static str;
    fn invoke(
        &self,
        ctx: &InvocationContext,
        method: &str,
        args: &[NativeValue],
    ) -> Result<NativeValue, NativeError>;

    /// Synthetic execution before any transaction in the block runs.
    fn on_persist(&self, _ctx: &InvocationContext) -> Result<(), NativeError> {
        Ok(())
    }

    /// Synthetic execution after every transaction in the block has run.
    fn post_persist(&self, _ctx: &InvocationContext) -> Result<(), NativeError> {
        Ok(())
    }
}

/// Holds every built-in contract; `on_persist`/`post_persist` run in
/// registration order, which is the id order used by `standard()`.
pub struct NativeRegistry {
    contracts: Vec<Box<dyn NativeContract>>,
    by_hash: HashMap<UInt160, usize>,
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self {
            contracts: Vec::new(),
            by_hash: HashMap::new(),
        }
    }

    pub fn register(&mut self, contract: Box<dyn NativeContract>) {
        let index = self.contracts.len();
        self.by_hash.insert(contract.hash(), index);
        self.contracts.push(contract);
    }

    pub fn get(&self, hash: &UInt160) -> Option<&dyn NativeContract> {
        self.by_hash.get(hash).map(|&i| self.contracts[i].as_ref())
    }

    pub fn dispatch(
        &self,
        hash: &UInt160,
        ctx: &InvocationContext,
        method: &str,
        args: &[NativeValue],
    ) -> Result<NativeValue, NativeError> {
        self.get(hash).ok_or(NativeError::UnknownContract)?.invoke(ctx, method, args)
    }

    pub fn run_on_persist(&self, ctx: &InvocationContext) -> Result<(), NativeError> {
        for contract in &self.contracts {
            contract.on_persist(ctx)?;
        }
        Ok(())
    }

    pub fn run_post_persist(&self, ctx: &InvocationContext) -> Result<(), NativeError> {
        for contract in &self.contracts {
            contract.post_persist(ctx)?;
        }
        Ok(())
    }

    /// The full set required by the protocol, in dispatch-stable order.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::management::Management::new()));
        registry.register(Box::new(crate::std_lib::StdLib::new()));
        registry.register(Box::new(crate::crypto_lib::CryptoLib::new()));
        registry.register(Box::new(crate::ledger::Ledger::new()));
        registry.register(Box::new(crate::neo_token::NeoToken::new()));
        registry.register(Box::new(crate::gas_token::GasToken::new()));
        registry.register(Box::new(crate::policy::Policy::new()));
        registry.register(Box::new(crate::role_management::RoleManagement::new()));
        registry.register(Box::new(crate::oracle::Oracle::new()));
        registry.register(Box::new(crate::name_service::NameService::new()));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registers_all_ten_contracts_with_distinct_hashes() {
        let registry = NativeRegistry::standard();
        assert_eq!(registry.contracts.len(), 10);
        assert_eq!(registry.by_hash.len(), 10);
    }
}
