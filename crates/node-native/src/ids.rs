//! Stable ids and hashes for the built-in contracts. Ids are negative so
//! they never collide with a deployed contract's monotonically increasing
//! positive id.

use node_types::UInt160;

pub const MANAGEMENT_ID: i32 = -1;
pub const STD_LIB_ID: i32 = -2;
pub const CRYPTO_LIB_ID: i32 = -3;
pub const LEDGER_ID: i32 = -4;
pub const NEO_TOKEN_ID: i32 = -5;
pub const GAS_TOKEN_ID: i32 = -6;
pub const POLICY_ID: i32 = -7;
pub const ROLE_MANAGEMENT_ID: i32 = -8;
pub const ORACLE_ID: i32 = -9;
pub const NAME_SERVICE_ID: i32 = -10;

/// A native contract's hash is `hash160` of its canonical name, stable for
/// as long as the name doesn't change.
pub fn contract_hash(name: &str) -> UInt160 {
    node_crypto::hash160(format!("native::{name}").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_distinct_per_name() {
        assert_eq!(contract_hash("NeoToken"), contract_hash("NeoToken"));
        assert_ne!(contract_hash("NeoToken"), contract_hash("GasToken"));
    }
}
