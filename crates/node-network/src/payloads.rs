//! Command-specific payload structs. Each is bincode-encoded into a
//! frame's body by `message::encode_frame`/decoded by the peer reader loop
//! after `message::read_frame` has already validated magic and checksum.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use node_types::{BlockHeader, UInt160, UInt256, Witness};

/// Up to this many headers are returned per `Headers` response and
/// requested per `GetHeaders`/`GetBlocksByIndex` call.
pub const MAX_HEADERS_PER_MESSAGE: usize = 2000;
/// Up to this many (kind, hash) pairs travel in a single `Inv`/`GetData`.
pub const MAX_INVENTORY_PER_MESSAGE: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Capabilities {
    pub tcp_port: u16,
    pub ws_port: u16,
    pub full_node: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub magic: u32,
    pub protocol_version: u32,
    pub timestamp: u64,
    /// Chosen fresh per process; a peer advertising our own nonce, or one
    /// already in use by an in-progress connection to the same address, is
    /// a duplicate connection and gets refused rather than handshaked.
    pub nonce: u32,
    pub user_agent: String,
    pub start_height: u32,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verack;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NetworkAddress {
    pub address: SocketAddr,
    pub last_seen: u64,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Addr {
    pub addresses: Vec<NetworkAddress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvKind {
    Tx,
    Block,
    Extensible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryItem {
    pub kind: InvKind,
    pub hash: UInt256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inv {
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetData {
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotFound {
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetHeaders {
    pub index_start: u32,
    pub count: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headers {
    pub headers: Vec<BlockHeader>,
}

/// NeoGo-style extension: request a contiguous run of full blocks by
/// starting index rather than requesting headers first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetBlocksByIndex {
    pub index_start: u32,
    pub count: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ping {
    pub height: u32,
    pub nonce: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pong {
    pub height: u32,
    pub nonce: u32,
}

/// A signed, categorized payload routed by `category` to whatever handler
/// is registered for it (dBFT messages and state-root announcements both
/// travel this way; the transport layer itself never inspects `data`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extensible {
    pub category: String,
    pub valid_block_start: u32,
    pub valid_block_end: u32,
    pub sender: UInt160,
    pub data: Vec<u8>,
    pub witness: Witness,
}
