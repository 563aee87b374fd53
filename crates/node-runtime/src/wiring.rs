//! Constructs every subsystem from a `NodeConfig` and spawns the
//! long-lived tasks that keep the node running.

use std::sync::Arc;

use node_blockchain::Blockchain;
use node_bus::EventBus;
use node_crypto::Secp256r1KeyPair;
use node_mempool::Mempool;
use node_network::{NetworkConfig, Server};
use node_storage::Storage;
use tokio::sync::mpsc;

use crate::config::NodeConfig;
use crate::genesis;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to open storage: {0}")]
    Storage(#[from] node_storage::StorageError),
    #[error("genesis construction failed: {0}")]
    Genesis(#[from] genesis::GenesisError),
    #[error("block queue could not be built: {0}")]
    BlockQueue(#[from] node_block_queue::BlockQueueError),
    #[error("signing key is not valid hex-encoded secp256r1 scalar: {0}")]
    BadKey(String),
}

fn load_key(hex_scalar: &Option<String>) -> Result<Option<Secp256r1KeyPair>, StartupError> {
    let Some(hex_str) = hex_scalar else { return Ok(None) };
    let bytes = hex::decode(hex_str).map_err(|e| StartupError::BadKey(e.to_string()))?;
    let scalar: [u8; 32] = bytes.try_into().map_err(|_| StartupError::BadKey("expected 32 bytes".to_string()))?;
    let key = Secp256r1KeyPair::from_bytes(&scalar).map_err(|e| StartupError::BadKey(e.to_string()))?;
    Ok(Some(key))
}

fn open_storage(config: &crate::config::StorageConfig) -> Result<Arc<dyn Storage>, StartupError> {
    if config.in_memory {
        return Ok(Arc::new(node_storage::MemoryStorage::new()));
    }
    #[cfg(feature = "rocksdb-backend")]
    {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| StartupError::Storage(node_storage::StorageError::Io(e.to_string())))?;
        let db = node_storage::RocksDbStorage::open(&config.data_dir)?;
        return Ok(Arc::new(db));
    }
    #[cfg(not(feature = "rocksdb-backend"))]
    {
        Ok(Arc::new(node_storage::MemoryStorage::new()))
    }
}

/// Every long-lived handle the running node owns. Dropping this stops
/// nothing by itself; shutdown is cooperative through `run`.
pub struct Node {
    pub blockchain: Arc<Blockchain>,
    pub mempool: Arc<Mempool>,
    pub network: Arc<Server>,
    pub block_queue: Arc<node_block_queue::BlockQueue>,
    pub consensus: Arc<node_consensus::ConsensusService>,
    pub notary: Arc<node_notary::NotaryService>,
}

impl Node {
    pub fn start(config: NodeConfig) -> Result<Self, StartupError> {
        config.validate().map_err(StartupError::Config)?;

        let storage = open_storage(&config.storage)?;
        let bus = EventBus::new();
        let blockchain = Arc::new(Blockchain::new(storage, bus.clone()));
        genesis::ensure_genesis(&blockchain, &config.protocol)?;

        let mempool = Arc::new(Mempool::new(
            config.protocol.mempool_capacity,
            config.protocol.fee_per_byte_floor,
            bus.clone(),
        ));

        let (wake_tx, wake_rx) = mpsc::channel(16);
        let block_queue = Arc::new(node_block_queue::BlockQueue::new(
            blockchain.clone(),
            Some(mempool.clone()),
            1024,
        )?);
        tokio::spawn(node_block_queue::block_queue::run(block_queue.clone(), wake_rx));

        let network_config = NetworkConfig {
            magic: config.protocol.magic,
            listen_addr: config.network.listen_addr,
            seed_list: config.protocol.seed_list.clone(),
            user_agent: config.network.user_agent.clone(),
            min_peers: config.network.min_peers,
            max_peers: config.network.max_peers,
            broadcast_factor: config.network.broadcast_factor,
            ping_interval: config.network.ping_interval,
            ping_timeout: config.network.ping_timeout,
            write_timeout: config.network.write_timeout,
        };
        let network = Server::new(network_config, blockchain.clone(), block_queue.clone(), wake_tx.clone(), mempool.clone(), bus.clone());

        let consensus_key = load_key(&config.signing.consensus_key_hex)?;
        let consensus = node_consensus::ConsensusService::new(
            blockchain.clone(),
            mempool.clone(),
            network.clone(),
            bus.clone(),
            consensus_key,
            config.consensus.clone(),
        );

        let notary_key = load_key(&config.signing.notary_key_hex)?;
        let notary = node_notary::NotaryService::new(
            blockchain.clone(),
            mempool.clone(),
            network.clone(),
            bus.clone(),
            notary_key,
            config.notary.clone(),
        );

        Ok(Self {
            blockchain,
            mempool,
            network,
            block_queue,
            consensus,
            notary,
        })
    }

    /// Spawns the network listener, consensus and notary loops, and blocks
    /// until the process receives a shutdown signal.
    pub async fn run(self) -> anyhow::Result<()> {
        let network = self.network.clone();
        let network_task = tokio::spawn(async move { network.run().await });

        let consensus_task = tokio::spawn(self.consensus.clone().run());
        let notary_task = tokio::spawn(self.notary.clone().run());

        tokio::select! {
            result = network_task => {
                if let Ok(Err(e)) = result {
                    tracing::error!(error = %e, "network server exited");
                }
            }
            _ = consensus_task => tracing::warn!("consensus service exited"),
            _ = notary_task => tracing::warn!("notary service exited"),
            _ = tokio::signal::ctrl_c() => tracing::info!("shutdown signal received"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_types::PublicKey;

    fn key(byte: u8) -> PublicKey {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        bytes[1] = byte;
        PublicKey::from_bytes(&bytes).unwrap()
    }

    fn test_config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.protocol.standby_committee = vec![key(1), key(2), key(3), key(4)];
        config.protocol.validators_count = 4;
        config.storage.in_memory = true;
        config.network.listen_addr = "127.0.0.1:0".parse().unwrap();
        config
    }

    #[tokio::test]
    async fn start_wires_every_subsystem_and_persists_genesis() {
        let node = Node::start(test_config()).unwrap();
        assert_eq!(node.blockchain.tip_height().unwrap(), Some(0));
    }

    #[tokio::test]
    async fn start_rejects_an_empty_standby_committee() {
        let mut config = test_config();
        config.protocol.standby_committee.clear();
        assert!(Node::start(config).is_err());
    }
}
