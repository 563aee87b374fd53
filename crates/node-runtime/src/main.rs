//! Node entry point: sets up logging, builds the configuration, wires
//! every subsystem together, and runs until shutdown.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use node_runtime::config::{NodeConfig, ProtocolConfig, SigningConfig, StorageConfig};
use node_runtime::wiring::Node;

fn load_config() -> NodeConfig {
    let mut protocol = ProtocolConfig::default();
    if let Ok(raw) = std::env::var("NODE_STANDBY_COMMITTEE") {
        protocol.standby_committee = parse_key_list(&raw);
    }
    if let Ok(raw) = std::env::var("NODE_STANDBY_NOTARIES") {
        protocol.standby_notaries = parse_key_list(&raw);
    }

    let storage = StorageConfig {
        data_dir: std::env::var("NODE_DATA_DIR").map(Into::into).unwrap_or_else(|_| StorageConfig::default().data_dir),
        in_memory: std::env::var("NODE_IN_MEMORY").is_ok(),
    };

    let signing = SigningConfig {
        consensus_key_hex: std::env::var("NODE_CONSENSUS_KEY").ok(),
        notary_key_hex: std::env::var("NODE_NOTARY_KEY").ok(),
    };

    NodeConfig { protocol, storage, signing, ..NodeConfig::default() }
}

fn parse_key_list(raw: &str) -> Vec<node_types::PublicKey> {
    raw.split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|hex_str| {
            let bytes = hex::decode(hex_str.trim()).ok()?;
            node_types::PublicKey::from_bytes(&bytes).ok()
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    tracing::info!("starting node");
    let config = load_config();
    let node = Node::start(config).context("failed to start node")?;
    tracing::info!("node started, entering run loop");
    node.run().await?;
    tracing::info!("node shut down");
    Ok(())
}
