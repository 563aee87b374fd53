//! Network-layer configuration. Mirrors the `Protocol`/`Application` split
//! the node's own wiring binary builds: protocol fields (magic, peer
//! counts, broadcast factor) are consensus-relevant and shared across the
//! network; everything else here is purely local operational tuning.

use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub magic: u32,
    pub listen_addr: SocketAddr,
    pub seed_list: Vec<SocketAddr>,
    pub user_agent: String,
    pub min_peers: usize,
    pub max_peers: usize,
    /// `factor` in `1 + ceil(log_factor(peer_count))`, the broadcast
    /// fan-out base.
    pub broadcast_factor: f64,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            magic: 0x4e454f33,
            listen_addr: "0.0.0.0:10333".parse().unwrap(),
            seed_list: Vec::new(),
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
