//! Account-model state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::fixed8::Fixed8;
use crate::hashes::UInt160;
use crate::pubkey::PublicKey;

/// Per-account balance and governance bookkeeping, keyed by native token
/// hash (e.g. NEO, GAS) in the surrounding DAO layer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountState {
    pub balance: Fixed8,
    pub balance_height: u32,
    pub vote_to: Option<PublicKey>,
    /// Snapshot of the committee reward-per-NEO accumulator at the last
    /// balance-changing transaction, used to compute unclaimed GAS.
    pub last_gas_per_vote: Fixed8,
}

impl AccountState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Balances for every native token tracked for one account script-hash.
#[derive(Clone, Debug, Default)]
pub struct AccountBalances(pub HashMap<UInt160, AccountState>);
