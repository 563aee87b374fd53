//! Deployed-contract state: NEF envelope, manifest, method table.

use serde::{Deserialize, Serialize};

use crate::hashes::UInt160;
use crate::pubkey::PublicKey;

/// The binary envelope of a deployed contract: header + script + checksum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NefFile {
    pub compiler: String,
    pub source: String,
    pub script: Vec<u8>,
    pub checksum: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub parameter_count: u16,
    pub return_void: bool,
    /// Instruction offset inside `NefFile::script` where the method starts.
    pub offset: u32,
    pub safe: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub name: String,
    pub parameter_count: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractGroup {
    pub public_key: PublicKey,
    pub signature: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPermission {
    /// `None` contract hash means "any contract".
    pub contract: Option<UInt160>,
    /// Empty means "any method".
    pub methods: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContractManifest {
    pub name: String,
    pub groups: Vec<ContractGroup>,
    pub supported_standards: Vec<String>,
    pub methods: Vec<MethodDescriptor>,
    pub events: Vec<EventDescriptor>,
    pub permissions: Vec<ContractPermission>,
    pub trusts: Vec<UInt160>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractState {
    /// Monotonic per network; negative ids are reserved for native contracts.
    pub id: i32,
    pub update_counter: u16,
    pub hash: UInt160,
    pub nef: NefFile,
    pub manifest: ContractManifest,
}

impl ContractState {
    pub fn method(&self, name: &str, parameter_count: u16) -> Option<&MethodDescriptor> {
        self.manifest
            .methods
            .iter()
            .find(|m| m.name == name && m.parameter_count == parameter_count)
    }

    pub fn is_native(&self) -> bool {
        self.id < 0
    }
}
