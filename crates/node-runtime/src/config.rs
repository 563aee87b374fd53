//! Unified node configuration. Mirrors the protocol/application split real
//! Neo nodes use: `protocol` fields are consensus-relevant and must match
//! across every node in the network; `storage`/`consensus_key`/`notary_key`
//! are purely local operational choices.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use node_types::PublicKey;

/// Consensus-relevant parameters. Every node on the same network must agree
/// on these or header/block validation diverges.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub magic: u32,
    pub max_transactions_per_block: usize,
    pub max_block_size: usize,
    pub mempool_capacity: usize,
    pub fee_per_byte_floor: i64,
    /// Committee members present from genesis, before any candidate has
    /// collected real votes. Seeded as synthetic candidate votes so the
    /// first `NeoToken::on_persist` elects exactly this list.
    pub standby_committee: Vec<PublicKey>,
    pub validators_count: usize,
    /// Notary committee present from genesis, designated directly into
    /// `RoleManagement` storage the same way a real designation vote would
    /// write it.
    pub standby_notaries: Vec<PublicKey>,
    pub seed_list: Vec<SocketAddr>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            magic: 0x4e454f33,
            max_transactions_per_block: node_blockchain::MAX_TRANSACTIONS_PER_BLOCK,
            max_block_size: node_blockchain::MAX_BLOCK_SIZE,
            mempool_capacity: 50_000,
            fee_per_byte_floor: 1000,
            standby_committee: Vec::new(),
            validators_count: 4,
            standby_notaries: Vec::new(),
            seed_list: Vec::new(),
        }
    }
}

/// Local storage choice.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// `true` uses an in-memory store (tests, ephemeral dev nodes); `false`
    /// opens a RocksDB instance under `data_dir`.
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data"), in_memory: false }
    }
}

/// Local network-layer tuning. Not consensus-relevant.
#[derive(Debug, Clone)]
pub struct NetworkOperationalConfig {
    pub listen_addr: SocketAddr,
    pub user_agent: String,
    pub min_peers: usize,
    pub max_peers: usize,
    pub broadcast_factor: f64,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for NetworkOperationalConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:10333".parse().unwrap(),
            user_agent: "/node-rust:0.1.0/".to_string(),
            min_peers: 4,
            max_peers: 40,
            broadcast_factor: 2.0,
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Consensus/notary participation. A node with no key configured still
/// runs both services, just never as a signer.
#[derive(Debug, Clone, Default)]
pub struct SigningConfig {
    /// Hex-encoded 32-byte secp256r1 private scalar, or `None` to run as a
    /// non-participating observer.
    pub consensus_key_hex: Option<String>,
    pub notary_key_hex: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub protocol: ProtocolConfig,
    pub storage: StorageConfig,
    pub network: NetworkOperationalConfig,
    pub signing: SigningConfig,
    pub consensus: node_consensus::ConsensusConfig,
    pub notary: node_notary::NotaryConfig,
}

impl NodeConfig {
    /// Rejects configurations that would never be able to reach consensus:
    /// an empty standby committee means no node (including a hypothetical
    /// perfectly-participating network) could ever propose a block.
    pub fn validate(&self) -> Result<(), String> {
        if self.protocol.standby_committee.is_empty() {
            return Err("protocol.standby_committee must not be empty".to_string());
        }
        if self.protocol.validators_count == 0 || self.protocol.validators_count > self.protocol.standby_committee.len() {
            return Err("protocol.validators_count must be in 1..=standby_committee.len()".to_string());
        }
        Ok(())
    }
}
