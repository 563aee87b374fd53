//! The dBFT round runner. One long-lived task drives the whole state
//! machine: it registers as the `"consensus"` category handler with the
//! P2P server, subscribes to `BlockPersisted` to know when to move to the
//! next height, and races incoming messages against a per-view timer that
//! doubles on every `ChangeView`.
//!
//! A node with no validator key still runs the loop — it just never
//! becomes primary and never sends votes — so a non-validator full node
//! can observe consensus traffic without special-casing the wiring.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use node_blockchain::Blockchain;
use node_bus::{EventBus, NodeEvent};
use node_crypto::Secp256r1KeyPair;
use node_mempool::Mempool;
use node_network::payloads::Extensible;
use node_network::Server;
use node_types::{Block, BlockHeader, PublicKey, Transaction, UInt256, Witness};

use crate::config::ConsensusConfig;
use crate::errors::ConsensusError;
use crate::messages::{BlockProposal, ConsensusMessage, ConsensusPayload};
use crate::round::Round;
use crate::validators::{self, current_validators};

const CATEGORY: &str = "consensus";

fn unix_now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

pub struct ConsensusService {
    blockchain: Arc<Blockchain>,
    mempool: Arc<Mempool>,
    network: Arc<Server>,
    bus: EventBus,
    key: Option<Secp256r1KeyPair>,
    config: ConsensusConfig,
    round: Mutex<Round>,
}

impl ConsensusService {
    pub fn new(
        blockchain: Arc<Blockchain>,
        mempool: Arc<Mempool>,
        network: Arc<Server>,
        bus: EventBus,
        key: Option<Secp256r1KeyPair>,
        config: ConsensusConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            blockchain,
            mempool,
            network,
            bus,
            key,
            config,
            round: Mutex::new(Round::new(0, 0)),
        })
    }

    fn view_timeout(&self, view: u8) -> Duration {
        let factor = 1u32.checked_shl(view.min(20) as u32).unwrap_or(u32::MAX);
        self.config.base_view_timeout.saturating_mul(factor)
    }

    fn my_public_key(&self) -> Option<PublicKey> {
        self.key.as_ref().map(|k| k.public_key())
    }

    fn my_validator_index(&self, validators: &[PublicKey]) -> Option<u8> {
        let mine = self.my_public_key()?;
        validators.iter().position(|v| *v == mine).map(|i| i as u8)
    }

    /// Runs until the P2P layer's inbound channel closes (node shutdown).
    pub async fn run(self: Arc<Self>) {
        let (tx, mut inbound) = mpsc::channel(256);
        self.network.register_extensible_handler(CATEGORY, tx);
        let mut events = self.bus.subscribe();

        let start_height = self.blockchain.tip_height().ok().flatten().map(|h| h + 1).unwrap_or(0);
        self.begin_height(start_height);

        let mut timeout = Box::pin(tokio::time::sleep(self.view_timeout(0)));
        loop {
            tokio::select! {
                maybe_ext = inbound.recv() => {
                    match maybe_ext {
                        Some(ext) => self.handle_extensible(ext).await,
                        None => break,
                    }
                }
                event = events.recv() => {
                    match event {
                        Some(NodeEvent::BlockPersisted { height, .. }) => {
                            self.begin_height(height + 1);
                            timeout.as_mut().reset(tokio::time::Instant::now() + self.view_timeout(0));
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
                _ = &mut timeout => {
                    let new_view = self.on_timeout().await;
                    timeout.as_mut().reset(tokio::time::Instant::now() + self.view_timeout(new_view));
                }
            }
        }
    }

    fn begin_height(&self, height: u32) {
        let validators = match current_validators(self.blockchain.storage()) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "could not load validator set, consensus idle this height");
                return;
            }
        };
        {
            let mut round = self.round.lock();
            *round = Round::new(height, validators.len());
        }
        if validators.is_empty() {
            return;
        }
        self.maybe_propose(height, 0, &validators);
    }

    /// A node's timer firing always means "try to move to the next view",
    /// regardless of whether it already sent a `ChangeView` for it — the
    /// request is idempotent and a duplicate just doesn't move the count.
    async fn on_timeout(&self) -> u8 {
        let (height, view, validators) = {
            let round = self.round.lock();
            (round.height, round.view, round.validator_count)
        };
        if validators == 0 || round_is_finalized(&self.round) {
            return view;
        }
        let target = view.saturating_add(1);
        tracing::debug!(height, view, target, "view timed out, requesting change-view");
        self.cast_change_view(height, view, target);
        target
    }

    fn cast_change_view(&self, height: u32, view: u8, target: u8) {
        let Some(index) = self.my_validator_index_for(height) else { return };
        {
            let mut round = self.round.lock();
            if round.height == height {
                round.change_views.insert(index, target);
            }
        }
        let ext = self.sign_and_wrap(ConsensusPayload::ChangeView { new_view: target }, height, view, index);
        self.network.broadcast_extensible(ext);
    }

    fn my_validator_index_for(&self, height: u32) -> Option<u8> {
        if height == 0 {
            return None;
        }
        let validators = current_validators(self.blockchain.storage()).ok()?;
        self.my_validator_index(&validators)
    }

    fn maybe_propose(&self, height: u32, view: u8, validators: &[PublicKey]) {
        let Some(my_index) = self.my_validator_index(validators) else { return };
        let primary = validators::primary_index(height, view, validators.len());
        if primary != my_index {
            return;
        }
        let proposal = self.build_proposal(height, view, validators);
        {
            let mut round = self.round.lock();
            if round.height == height && round.view == view {
                round.proposal = Some(proposal.clone());
            }
        }
        let ext = self.sign_and_wrap(ConsensusPayload::PrepareRequest { proposal }, height, view, my_index);
        tracing::debug!(height, view, "broadcasting prepare request as primary");
        self.network.broadcast_extensible(ext);
    }

    fn build_proposal(&self, height: u32, view: u8, validators: &[PublicKey]) -> BlockProposal {
        let txs = self.mempool.propose(self.config.max_transactions_per_proposal);
        let tx_hashes: Vec<UInt256> = txs
            .iter()
            .map(|tx| node_crypto::hash256(&bincode::serialize(tx).expect("transaction always serializes")))
            .collect();
        let prior = self.blockchain.tip_header().ok().flatten();
        let prev_hash = prior
            .as_ref()
            .map(|h| node_crypto::hash256(&bincode::serialize(h).expect("header always serializes")))
            .unwrap_or(UInt256::ZERO);
        let prior_timestamp = prior.as_ref().map(|h| h.timestamp).unwrap_or(0);
        let header = BlockHeader {
            version: 0,
            prev_hash,
            merkle_root: node_crypto::merkle_root(&tx_hashes),
            timestamp: unix_now_millis().max(prior_timestamp + 1),
            nonce: rand::random(),
            index: height,
            primary_index: validators::primary_index(height, view, validators.len()),
            next_consensus: validators::next_consensus_hash(validators),
            witness: Witness::default(),
            state_root: None,
        };
        BlockProposal { header, tx_hashes }
    }

    fn sign_and_wrap(&self, payload: ConsensusPayload, height: u32, view: u8, validator_index: u8) -> Extensible {
        let key = self.key.as_ref().expect("caller only signs when this node holds a validator key");
        let msg = ConsensusMessage { height, view, validator_index, payload };
        let data = bincode::serialize(&msg).expect("consensus message always serializes");
        let signature = key.sign(&data);
        Extensible {
            category: CATEGORY.to_string(),
            valid_block_start: height,
            valid_block_end: height.saturating_add(1),
            sender: node_crypto::hash160(key.public_key().as_bytes()),
            data,
            witness: Witness {
                invocation_script: signature.to_vec(),
                verification_script: key.public_key().as_bytes().to_vec(),
            },
        }
    }

    async fn handle_extensible(&self, ext: Extensible) {
        if ext.category != CATEGORY {
            return;
        }
        if let Err(e) = self.dispatch(ext).await {
            tracing::debug!(error = %e, "dropped consensus message");
        }
    }

    async fn dispatch(&self, ext: Extensible) -> Result<(), ConsensusError> {
        let validators = current_validators(self.blockchain.storage())?;
        let msg: ConsensusMessage = bincode::deserialize(&ext.data)?;
        let sender = *validators
            .get(msg.validator_index as usize)
            .ok_or(ConsensusError::UnknownValidator(msg.validator_index, validators.len()))?;
        node_crypto::verify_secp256r1(&sender, &ext.data, &ext.witness.invocation_script)
            .map_err(|_| ConsensusError::BadSignature(msg.validator_index))?;

        let current_height = { self.round.lock().height };
        if msg.height < current_height {
            return Ok(());
        }
        if msg.height > current_height {
            // We're behind; ask the sender to bring us up to date on their view.
            if let Some(index) = self.my_validator_index_for(current_height.max(msg.height)) {
                let ext = self.sign_and_wrap(ConsensusPayload::RecoveryRequest, msg.height, msg.view, index);
                self.network.broadcast_extensible(ext);
            }
            return Ok(());
        }

        let signature = signature_from_witness(&ext.witness);
        match msg.payload {
            ConsensusPayload::PrepareRequest { proposal } => {
                self.on_prepare_request(msg.height, msg.view, msg.validator_index, proposal, &validators)
            }
            ConsensusPayload::PreCommit { block_hash } => {
                self.on_pre_commit(msg.height, msg.view, msg.validator_index, block_hash, signature).await
            }
            ConsensusPayload::Commit { block_hash } => {
                self.on_commit(msg.height, msg.view, msg.validator_index, block_hash, signature).await
            }
            ConsensusPayload::ChangeView { new_view } => self.on_change_view(msg.height, msg.validator_index, new_view, &validators),
            ConsensusPayload::RecoveryRequest => self.on_recovery_request(msg.height, msg.validator_index),
            ConsensusPayload::RecoveryMessage { proposal, pre_commits, commits, change_views } => {
                self.on_recovery_message(msg.height, proposal, pre_commits, commits, change_views).await
            }
        }
        Ok(())
    }

    fn on_prepare_request(&self, height: u32, view: u8, from_index: u8, proposal: BlockProposal, validators: &[PublicKey]) {
        let primary = validators::primary_index(height, view, validators.len());
        if from_index != primary {
            tracing::debug!(height, view, from_index, primary, "prepare request from non-primary, ignored");
            return;
        }
        let known = proposal.tx_hashes.iter().all(|h| self.mempool.contains(h) || self.blockchain.chain_state().transaction_by_hash(h).ok().flatten().is_some());
        if !known {
            tracing::debug!(height, view, "prepare request references unknown transactions, not voting");
            return;
        }
        let block_hash = node_crypto::hash256(&bincode::serialize(&proposal.header).expect("header always serializes"));
        {
            let mut round = self.round.lock();
            if round.height != height || round.view != view {
                return;
            }
            round.proposal = Some(proposal);
        }
        self.cast_pre_commit(height, view, block_hash);
    }

    fn cast_pre_commit(&self, height: u32, view: u8, block_hash: UInt256) {
        let Some(index) = self.my_validator_index_for(height) else { return };
        let already_sent = {
            let mut round = self.round.lock();
            if round.height != height || round.view != view || round.sent_pre_commit {
                true
            } else {
                round.sent_pre_commit = true;
                round.pre_commits.insert(index, (block_hash, [0u8; 64]));
                false
            }
        };
        if already_sent {
            return;
        }
        let ext = self.sign_and_wrap(ConsensusPayload::PreCommit { block_hash }, height, view, index);
        let signature = signature_from_witness(&ext.witness);
        {
            let mut round = self.round.lock();
            round.pre_commits.insert(index, (block_hash, signature));
        }
        self.network.broadcast_extensible(ext);
    }

    async fn on_pre_commit(&self, height: u32, view: u8, from_index: u8, block_hash: UInt256, signature: [u8; 64]) {
        let reached_quorum = {
            let mut round = self.round.lock();
            if round.height != height || round.view != view {
                return;
            }
            round.pre_commits.insert(from_index, (block_hash, signature));
            round.pre_commits_for(&block_hash).len() >= round.quorum()
        };
        if reached_quorum {
            self.cast_commit(height, view, block_hash);
        }
    }

    fn cast_commit(&self, height: u32, view: u8, block_hash: UInt256) {
        let Some(index) = self.my_validator_index_for(height) else { return };
        let should_send = {
            let mut round = self.round.lock();
            if round.height != height || round.view != view || round.sent_commit {
                false
            } else {
                round.sent_commit = true;
                true
            }
        };
        if !should_send {
            return;
        }
        let ext = self.sign_and_wrap(ConsensusPayload::Commit { block_hash }, height, view, index);
        let signature = signature_from_witness(&ext.witness);
        {
            let mut round = self.round.lock();
            round.commits.insert(index, (block_hash, signature));
        }
        self.network.broadcast_extensible(ext);
    }

    async fn on_commit(&self, height: u32, view: u8, from_index: u8, block_hash: UInt256, signature: [u8; 64]) {
        let (reached_quorum, proposal) = {
            let mut round = self.round.lock();
            if round.height != height || round.view != view || round.finalized {
                return;
            }
            round.commits.insert(from_index, (block_hash, signature));
            let reached = round.commits_for(&block_hash).len() >= round.quorum();
            (reached, round.proposal.clone())
        };
        if !reached_quorum {
            return;
        }
        let Some(proposal) = proposal else {
            tracing::debug!(height, view, "commit quorum reached without a known proposal, cannot finalize locally");
            return;
        };
        self.finalize(height, view, block_hash, proposal).await;
    }

    async fn finalize(&self, height: u32, view: u8, block_hash: UInt256, proposal: BlockProposal) {
        {
            let mut round = self.round.lock();
            if round.height != height || round.finalized {
                return;
            }
            round.finalized = true;
        }
        let validators = match current_validators(self.blockchain.storage()) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "could not reload validators to finalize block");
                return;
            }
        };
        let commit_sigs: Vec<[u8; 64]> = {
            let round = self.round.lock();
            round.commits_for(&block_hash).into_iter().map(|(_, sig)| sig).collect()
        };
        let mut header = proposal.header.clone();
        header.witness = Witness {
            invocation_script: bincode::serialize(&commit_sigs).expect("signature list always serializes"),
            verification_script: validators::consensus_script(&validators),
        };
        let transactions = match self.collect_transactions(&proposal.tx_hashes) {
            Some(txs) => txs,
            None => {
                tracing::warn!(height, view, "cannot finalize: a proposed transaction is no longer available");
                return;
            }
        };
        let block = Block { header, transactions };
        if let Err(e) = self.blockchain.add_block(block, Some(self.mempool.as_ref())) {
            tracing::warn!(height, view, error = %e, "failed to persist finalized block");
            self.bus.publish(NodeEvent::ViewChanged { height, view });
        }
    }

    fn collect_transactions(&self, hashes: &[UInt256]) -> Option<Vec<Transaction>> {
        let state = self.blockchain.chain_state();
        hashes
            .iter()
            .map(|h| self.mempool.get(h).or_else(|| state.transaction_by_hash(h).ok().flatten().map(|(tx, _, _)| tx)))
            .collect()
    }

    fn on_change_view(&self, height: u32, from_index: u8, new_view: u8, validators: &[PublicKey]) {
        let should_advance = {
            let mut round = self.round.lock();
            if round.height != height {
                return;
            }
            round.change_views.insert(from_index, new_view);
            round.view < new_view && round.change_view_votes_for(new_view) >= round.quorum()
        };
        if !should_advance {
            return;
        }
        {
            let mut round = self.round.lock();
            round.enter_view(new_view);
        }
        self.bus.publish(NodeEvent::ViewChanged { height, view: new_view });
        self.maybe_propose(height, new_view, validators);
    }

    fn on_recovery_request(&self, height: u32, _requester_index: u8) {
        let Some(my_index) = self.my_validator_index_for(height) else { return };
        let (view, proposal, pre_commits, commits, change_views) = {
            let round = self.round.lock();
            if round.height != height || round.proposal.is_none() {
                return;
            }
            (
                round.view,
                round.proposal.clone(),
                round.pre_commits.iter().map(|(i, (h, s))| (*i, *h, *s)).collect(),
                round.commits.iter().map(|(i, (h, s))| (*i, *h, *s)).collect(),
                round.change_views.iter().map(|(i, v)| (*i, *v)).collect(),
            )
        };
        let ext = self.sign_and_wrap(
            ConsensusPayload::RecoveryMessage { proposal, pre_commits, commits, change_views },
            height,
            view,
            my_index,
        );
        self.network.broadcast_extensible(ext);
    }

    async fn on_recovery_message(
        &self,
        height: u32,
        proposal: Option<BlockProposal>,
        pre_commits: Vec<(u8, UInt256, [u8; 64])>,
        commits: Vec<(u8, UInt256, [u8; 64])>,
        change_views: Vec<(u8, u8)>,
    ) {
        {
            let mut round = self.round.lock();
            if round.height != height {
                return;
            }
            if round.proposal.is_none() {
                round.proposal = proposal;
            }
            for (index, hash, sig) in pre_commits {
                round.pre_commits.entry(index).or_insert((hash, sig));
            }
            for (index, hash, sig) in commits {
                round.commits.entry(index).or_insert((hash, sig));
            }
            for (index, view) in change_views {
                round.change_views.entry(index).or_insert(view);
            }
        }
        let merged = {
            let round = self.round.lock();
            round.proposal.as_ref().map(|proposal| {
                let hash = hash_of(&proposal.header);
                (round.view, hash, round.commits_for(&hash).len() >= round.quorum(), round.pre_commits_for(&hash).len() >= round.quorum())
            })
        };
        let Some((view, block_hash, quorum_commits, quorum_pre_commits)) = merged else { return };
        if quorum_commits {
            if let Some(proposal) = { self.round.lock().proposal.clone() } {
                self.finalize(height, view, block_hash, proposal).await;
            }
        } else if quorum_pre_commits {
            self.cast_commit(height, view, block_hash);
        }
    }
}

fn hash_of(header: &BlockHeader) -> UInt256 {
    node_crypto::hash256(&bincode::serialize(header).expect("header always serializes"))
}

fn signature_from_witness(witness: &Witness) -> [u8; 64] {
    let mut sig = [0u8; 64];
    let n = witness.invocation_script.len().min(64);
    sig[..n].copy_from_slice(&witness.invocation_script[..n]);
    sig
}

fn round_is_finalized(round: &Mutex<Round>) -> bool {
    round.lock().finalized
}
