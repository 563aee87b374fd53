//! Wires the framing, handshake, discovery and priority-queue pieces
//! together into the running P2P service. One reader task and one writer
//! task per connected peer, a discovery loop, a listener, all communicating
//! through the peer table and bounded channels rather than shared
//! mutable state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use parking_lot::RwLock;
use rand::RngCore;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use node_block_queue::BlockQueue;
use node_blockchain::Blockchain;
use node_bus::{EventBus, NodeEvent};
use node_mempool::Mempool;
use node_types::{Block, Transaction};

use crate::config::NetworkConfig;
use crate::discovery::Discovery;
use crate::errors::NetworkError;
use crate::message::{read_frame, write_frame, Command};
use crate::payloads::{
    Addr, Capabilities, Extensible, GetBlocksByIndex, GetData, GetHeaders, Headers, Inv, InvKind, InventoryItem,
    NetworkAddress, NotFound, Ping, Pong, Verack, Version, MAX_HEADERS_PER_MESSAGE, MAX_INVENTORY_PER_MESSAGE,
};
use crate::peer::{peer_channel, reader_loop, writer_loop, PeerHandle, DEFAULT_QUEUE_DEPTH};

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

pub struct Server {
    config: NetworkConfig,
    nonce: u32,
    blockchain: Arc<Blockchain>,
    block_queue: Arc<BlockQueue>,
    queue_wake: mpsc::Sender<()>,
    mempool: Arc<Mempool>,
    bus: EventBus,
    discovery: Discovery,
    peers: DashMap<SocketAddr, PeerHandle>,
    seen_nonces: DashMap<u32, ()>,
    peer_nonces: DashMap<SocketAddr, u32>,
    extensible_handlers: RwLock<std::collections::HashMap<String, mpsc::Sender<Extensible>>>,
    inbound_tx: mpsc::Sender<(SocketAddr, Command, Vec<u8>)>,
    inbound_rx: parking_lot::Mutex<Option<mpsc::Receiver<(SocketAddr, Command, Vec<u8>)>>>,
}

impl Server {
    pub fn new(
        config: NetworkConfig,
        blockchain: Arc<Blockchain>,
        block_queue: Arc<BlockQueue>,
        queue_wake: mpsc::Sender<()>,
        mempool: Arc<Mempool>,
        bus: EventBus,
    ) -> Arc<Self> {
        let discovery = Discovery::new(&config.seed_list);
        let nonce = rand::thread_rng().next_u32();
        let (inbound_tx, inbound_rx) = mpsc::channel(1024);
        Arc::new(Self {
            config,
            nonce,
            blockchain,
            block_queue,
            queue_wake,
            mempool,
            bus,
            discovery,
            peers: DashMap::new(),
            seen_nonces: DashMap::new(),
            peer_nonces: DashMap::new(),
            extensible_handlers: RwLock::new(std::collections::HashMap::new()),
            inbound_tx,
            inbound_rx: parking_lot::Mutex::new(Some(inbound_rx)),
        })
    }

    pub fn register_extensible_handler(&self, category: impl Into<String>, sender: mpsc::Sender<Extensible>) {
        self.extensible_handlers.write().insert(category.into(), sender);
    }

    pub fn connected_peer_count(&self) -> usize {
        self.peers.len()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { tcp_port: self.config.listen_addr.port(), ws_port: 0, full_node: true }
    }

    fn current_height(&self) -> u32 {
        self.blockchain.tip_height().ok().flatten().unwrap_or(0)
    }

    fn version_message(&self) -> Version {
        Version {
            magic: self.config.magic,
            protocol_version: 0,
            timestamp: unix_now(),
            nonce: self.nonce,
            user_agent: self.config.user_agent.clone(),
            start_height: self.current_height(),
            capabilities: self.capabilities(),
        }
    }

    /// Runs the listener and the discovery loop until either fails;
    /// intended to be spawned once at node startup.
    pub async fn run(self: Arc<Self>) -> Result<(), NetworkError> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;

        let inbound_rx = self.inbound_rx.lock().take().expect("run() called more than once");
        let dispatch_server = self.clone();
        tokio::spawn(async move { dispatch_server.dispatch_loop(inbound_rx).await });

        let dial_server = self.clone();
        tokio::spawn(async move { dial_server.dial_loop().await });

        loop {
            let (stream, addr) = listener.accept().await?;
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_inbound_connection(stream, addr).await {
                    tracing::debug!(peer = %addr, error = %e, "inbound connection closed");
                }
            });
        }
    }

    async fn dial_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.ping_interval);
        loop {
            interval.tick().await;
            if self.discovery.needs_more_peers(self.config.min_peers) {
                let want = self.config.min_peers.saturating_sub(self.discovery.connected_count());
                for addr in self.discovery.dial_candidates(want) {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.clone().dial(addr).await {
                            tracing::debug!(peer = %addr, error = %e, "outbound dial failed");
                            server.discovery.mark_bad(addr);
                        }
                    });
                }
                if self.discovery.should_solicit_addresses(self.config.min_peers) {
                    self.broadcast(Command::GetAddr, &());
                }
            }
        }
    }

    async fn dial(self: Arc<Self>, addr: SocketAddr) -> Result<(), NetworkError> {
        if !self.discovery.mark_connecting(addr) {
            return Err(NetworkError::DuplicatePeer(addr.to_string()));
        }
        let stream = TcpStream::connect(addr).await?;
        let inbound = self.inbound_tx.clone();
        self.establish(stream, addr, true, inbound).await
    }

    async fn handle_inbound_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) -> Result<(), NetworkError> {
        if self.connected_peer_count() >= self.config.max_peers {
            return Err(NetworkError::Handshake("max peer count reached".into()));
        }
        if !self.discovery.mark_connecting(addr) {
            return Err(NetworkError::DuplicatePeer(addr.to_string()));
        }
        let inbound = self.inbound_tx.clone();
        self.establish(stream, addr, false, inbound).await
    }

    /// Runs the Version/Verack exchange in both directions, then spawns
    /// the reader and writer tasks and registers the peer. A peer only
    /// counts as connected once both sides of the handshake complete.
    async fn establish(
        self: Arc<Self>,
        mut stream: TcpStream,
        addr: SocketAddr,
        outbound: bool,
        inbound: mpsc::Sender<(SocketAddr, Command, Vec<u8>)>,
    ) -> Result<(), NetworkError> {
        let our_version = self.version_message();

        if outbound {
            write_frame(&mut stream, self.config.magic, Command::Version, &bincode::serialize(&our_version)?).await?;
        }
        let (command, payload) = read_frame(&mut stream, self.config.magic).await?;
        if command != Command::Version {
            self.discovery.mark_disconnected(&addr);
            return Err(NetworkError::Handshake("expected Version".into()));
        }
        let their_version: Version = bincode::deserialize(&payload)?;
        if their_version.nonce == self.nonce {
            self.discovery.mark_disconnected(&addr);
            return Err(NetworkError::Handshake("self-connection detected".into()));
        }
        if self.seen_nonces.insert(their_version.nonce, ()).is_some() {
            self.discovery.mark_disconnected(&addr);
            return Err(NetworkError::Handshake("duplicate peer nonce".into()));
        }
        if !outbound {
            write_frame(&mut stream, self.config.magic, Command::Version, &bincode::serialize(&our_version)?).await?;
        }

        write_frame(&mut stream, self.config.magic, Command::Verack, &bincode::serialize(&Verack)?).await?;
        let (command, _) = read_frame(&mut stream, self.config.magic).await?;
        if command != Command::Verack {
            self.discovery.mark_disconnected(&addr);
            self.seen_nonces.remove(&their_version.nonce);
            return Err(NetworkError::Handshake("expected Verack".into()));
        }

        let (read_half, write_half) = stream.into_split();
        let (handle, receivers) = peer_channel(addr, DEFAULT_QUEUE_DEPTH);
        let cancel_rx = receivers_cancel(&receivers);
        self.peers.insert(addr, handle);
        self.peer_nonces.insert(addr, their_version.nonce);
        self.bus.publish(NodeEvent::PeerConnected { address: addr.to_string() });

        let magic = self.config.magic;
        tokio::spawn(reader_loop(read_half, magic, addr, inbound, cancel_rx));
        tokio::spawn(writer_loop(write_half, magic, receivers));

        if their_version.start_height > self.current_height() {
            self.request_headers_from_tip(&addr);
        }

        Ok(())
    }

    fn disconnect_peer(&self, addr: &SocketAddr) {
        if let Some((_, handle)) = self.peers.remove(addr) {
            handle.disconnect();
        }
        if let Some((_, nonce)) = self.peer_nonces.remove(addr) {
            self.seen_nonces.remove(&nonce);
        }
        self.discovery.mark_disconnected(addr);
        self.bus.publish(NodeEvent::PeerDisconnected { address: addr.to_string() });
    }

    fn send_to(&self, addr: &SocketAddr, command: Command, payload: &impl Serialize) -> Result<(), NetworkError> {
        let bytes = bincode::serialize(payload)?;
        match self.peers.get(addr) {
            Some(peer) => peer.send(command, bytes),
            None => Ok(()),
        }
    }

    /// Fans a message out to a random, logarithmically-sized subset of
    /// connected peers rather than everyone.
    fn broadcast(&self, command: Command, payload: &impl Serialize) {
        let Ok(bytes) = bincode::serialize(payload) else { return };
        let handles: Vec<PeerHandle> = self.peers.iter().map(|e| e.value().clone()).collect();
        for peer in crate::broadcast::choose_fanout_peers(&handles, self.config.broadcast_factor) {
            let _ = peer.send(command, bytes.clone());
        }
    }

    pub fn broadcast_inv(&self, items: Vec<InventoryItem>) {
        for chunk in items.chunks(MAX_INVENTORY_PER_MESSAGE) {
            self.broadcast(Command::Inv, &Inv { items: chunk.to_vec() });
        }
    }

    /// Fans an already-signed consensus/state-root payload out to peers.
    /// The transport layer never inspects `ext.data`; it only routes by
    /// `ext.category` on the receiving end via `register_extensible_handler`.
    pub fn broadcast_extensible(&self, ext: Extensible) {
        self.broadcast(Command::Extensible, &ext);
    }

    fn request_headers_from_tip(&self, addr: &SocketAddr) {
        let start = self.current_height().saturating_add(1);
        let _ = self.send_to(addr, Command::GetHeaders, &GetHeaders { index_start: start, count: MAX_HEADERS_PER_MESSAGE as u16 });
    }

    async fn dispatch_loop(self: Arc<Self>, mut inbound: mpsc::Receiver<(SocketAddr, Command, Vec<u8>)>) {
        while let Some((from, command, payload)) = inbound.recv().await {
            if let Err(e) = self.handle_message(from, command, payload) {
                tracing::debug!(peer = %from, error = %e, "message handling failed, disconnecting peer");
                self.disconnect_peer(&from);
            }
        }
    }

    fn handle_message(&self, from: SocketAddr, command: Command, payload: Vec<u8>) -> Result<(), NetworkError> {
        match command {
            Command::Version | Command::Verack => Ok(()),
            Command::GetAddr => self.handle_getaddr(&from),
            Command::Addr => self.handle_addr(payload),
            Command::Inv => self.handle_inv(&from, payload),
            Command::GetData => self.handle_getdata(&from, payload),
            Command::NotFound => Ok(()),
            Command::GetHeaders => self.handle_getheaders(&from, payload),
            Command::Headers => self.handle_headers(payload),
            Command::GetBlocksByIndex => self.handle_getblocksbyindex(&from, payload),
            Command::Ping => self.handle_ping(&from, payload),
            Command::Pong => Ok(()),
            Command::Tx => self.handle_tx(payload),
            Command::Block => self.handle_block(payload),
            Command::Extensible => self.handle_extensible(payload),
        }
    }

    fn handle_getaddr(&self, from: &SocketAddr) -> Result<(), NetworkError> {
        let addresses = self
            .discovery
            .known_addresses(200)
            .into_iter()
            .map(|address| NetworkAddress { address, last_seen: unix_now(), capabilities: self.capabilities() })
            .collect();
        self.send_to(from, Command::Addr, &Addr { addresses })
    }

    fn handle_addr(&self, payload: Vec<u8>) -> Result<(), NetworkError> {
        let addr: Addr = bincode::deserialize(&payload)?;
        self.discovery.learn(addr.addresses.into_iter().map(|a| a.address), 2000);
        Ok(())
    }

    fn handle_inv(&self, from: &SocketAddr, payload: Vec<u8>) -> Result<(), NetworkError> {
        let inv: Inv = bincode::deserialize(&payload)?;
        let state = self.blockchain.chain_state();
        let mut unknown = Vec::new();
        for item in inv.items {
            let known = match item.kind {
                InvKind::Tx => self.mempool.contains(&item.hash) || state.transaction_by_hash(&item.hash)?.is_some(),
                InvKind::Block => state.block_by_hash(&item.hash)?.is_some(),
                InvKind::Extensible => false,
            };
            if !known {
                unknown.push(item);
            }
        }
        if !unknown.is_empty() {
            self.send_to(from, Command::GetData, &GetData { items: unknown })?;
        }
        Ok(())
    }

    fn handle_getdata(&self, from: &SocketAddr, payload: Vec<u8>) -> Result<(), NetworkError> {
        let req: GetData = bincode::deserialize(&payload)?;
        let state = self.blockchain.chain_state();
        let mut missing = Vec::new();
        for item in req.items {
            match item.kind {
                InvKind::Tx => {
                    let pending = self.mempool.get(&item.hash);
                    let committed = match pending {
                        Some(_) => None,
                        None => state.transaction_by_hash(&item.hash)?.map(|(tx, _, _)| tx),
                    };
                    match pending.or(committed) {
                        Some(tx) => self.send_to(from, Command::Tx, &tx)?,
                        None => missing.push(item),
                    }
                }
                InvKind::Block => match state.block_by_hash(&item.hash)? {
                    Some(block) => self.send_to(from, Command::Block, &block)?,
                    None => missing.push(item),
                },
                InvKind::Extensible => missing.push(item),
            }
        }
        if !missing.is_empty() {
            self.send_to(from, Command::NotFound, &NotFound { items: missing })?;
        }
        Ok(())
    }

    fn handle_getheaders(&self, from: &SocketAddr, payload: Vec<u8>) -> Result<(), NetworkError> {
        let req: GetHeaders = bincode::deserialize(&payload)?;
        let state = self.blockchain.chain_state();
        let count = (req.count as usize).min(MAX_HEADERS_PER_MESSAGE);
        let mut headers = Vec::with_capacity(count);
        for index in req.index_start..req.index_start.saturating_add(count as u32) {
            match state.header_by_index(index)? {
                Some(header) => headers.push(header),
                None => break,
            }
        }
        self.send_to(from, Command::Headers, &Headers { headers })
    }

    fn handle_headers(&self, payload: Vec<u8>) -> Result<(), NetworkError> {
        let headers: Headers = bincode::deserialize(&payload)?;
        tracing::debug!(count = headers.headers.len(), "received headers batch");
        Ok(())
    }

    fn handle_getblocksbyindex(&self, from: &SocketAddr, payload: Vec<u8>) -> Result<(), NetworkError> {
        let req: GetBlocksByIndex = bincode::deserialize(&payload)?;
        let state = self.blockchain.chain_state();
        let count = (req.count as usize).min(MAX_HEADERS_PER_MESSAGE);
        for index in req.index_start..req.index_start.saturating_add(count as u32) {
            let Some(header) = state.header_by_index(index)? else { break };
            let hash = node_crypto::hash256(&bincode::serialize(&header)?);
            match state.block_by_hash(&hash)? {
                Some(block) => self.send_to(from, Command::Block, &block)?,
                None => break,
            }
        }
        Ok(())
    }

    fn handle_ping(&self, from: &SocketAddr, payload: Vec<u8>) -> Result<(), NetworkError> {
        let ping: Ping = bincode::deserialize(&payload)?;
        self.send_to(from, Command::Pong, &Pong { height: self.current_height(), nonce: ping.nonce })?;
        if ping.height > self.current_height() {
            self.request_headers_from_tip(from);
        }
        Ok(())
    }

    fn handle_tx(&self, payload: Vec<u8>) -> Result<(), NetworkError> {
        let tx: Transaction = bincode::deserialize(&payload)?;
        let height = self.current_height();
        match self.mempool.try_admit(self.blockchain.storage(), tx, height) {
            Ok(hash) => {
                self.bus.publish(NodeEvent::TransactionAdmitted { hash });
                self.broadcast_inv(vec![InventoryItem { kind: InvKind::Tx, hash }]);
            }
            Err(e) => tracing::debug!(error = %e, "transaction rejected by mempool"),
        }
        Ok(())
    }

    fn handle_block(&self, payload: Vec<u8>) -> Result<(), NetworkError> {
        let block: Block = bincode::deserialize(&payload)?;
        if let Err(e) = self.block_queue.put(block) {
            tracing::debug!(error = %e, "block rejected by queue");
            return Ok(());
        }
        let _ = self.queue_wake.try_send(());
        Ok(())
    }

    fn handle_extensible(&self, payload: Vec<u8>) -> Result<(), NetworkError> {
        let ext: Extensible = bincode::deserialize(&payload)?;
        let handlers = self.extensible_handlers.read();
        if let Some(sender) = handlers.get(&ext.category) {
            let _ = sender.try_send(ext);
        }
        Ok(())
    }
}

/// `PeerReceivers` doesn't expose its cancel receiver publicly since only
/// the writer loop needs write access to it; the reader loop needs its own
/// clone of the same watch channel, obtained here before the receivers are
/// handed to the writer.
fn receivers_cancel(receivers: &crate::peer::PeerReceivers) -> tokio::sync::watch::Receiver<bool> {
    receivers.cancel_handle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_bus::EventBus;
    use node_mempool::Mempool;
    use node_storage::{MemoryStorage, Storage};

    fn test_server() -> Arc<Server> {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let bus = EventBus::new();
        let blockchain = Arc::new(Blockchain::new(storage, bus.clone()));
        let block_queue = Arc::new(BlockQueue::new(blockchain.clone(), None, 8).unwrap());
        let mempool = Arc::new(Mempool::new(1000, 0, bus.clone()));
        let (wake_tx, _wake_rx) = mpsc::channel(1);
        let mut config = NetworkConfig::default();
        config.listen_addr = "127.0.0.1:0".parse().unwrap();
        Server::new(config, blockchain, block_queue, wake_tx, mempool, bus)
    }

    #[test]
    fn fresh_server_has_no_connected_peers() {
        let server = test_server();
        assert_eq!(server.connected_peer_count(), 0);
    }

    #[test]
    fn version_message_advertises_configured_user_agent_and_nonce() {
        let server = test_server();
        let version = server.version_message();
        assert_eq!(version.user_agent, server.config.user_agent);
        assert_eq!(version.nonce, server.nonce);
        assert_eq!(version.start_height, 0);
    }

    #[test]
    fn getaddr_reply_is_empty_until_peers_are_learned() {
        let server = test_server();
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        // No peer registered for this address, so the reply is dropped
        // rather than sent, but the handler itself must not error.
        server.handle_getaddr(&addr).unwrap();
    }

    #[tokio::test]
    async fn extensible_without_a_registered_handler_is_dropped_not_errored() {
        let server = test_server();
        let ext = Extensible {
            category: "consensus".into(),
            valid_block_start: 0,
            valid_block_end: 100,
            sender: node_types::UInt160::ZERO,
            data: vec![1, 2, 3],
            witness: node_types::Witness::default(),
        };
        let payload = bincode::serialize(&ext).unwrap();
        server.handle_extensible(payload).unwrap();
    }

    #[tokio::test]
    async fn extensible_with_registered_handler_is_forwarded() {
        let server = test_server();
        let (tx, mut rx) = mpsc::channel(1);
        server.register_extensible_handler("consensus", tx);
        let ext = Extensible {
            category: "consensus".into(),
            valid_block_start: 0,
            valid_block_end: 100,
            sender: node_types::UInt160::ZERO,
            data: vec![9],
            witness: node_types::Witness::default(),
        };
        let payload = bincode::serialize(&ext).unwrap();
        server.handle_extensible(payload).unwrap();
        let received = rx.try_recv().unwrap();
        assert_eq!(received.data, vec![9]);
    }
}
