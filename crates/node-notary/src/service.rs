//! Runs the notary round: accepts P2P notary requests, collects signature
//! shares from designated notary validators, and relays the completed main
//! transaction, or falls back once the fallback's valid-until-block arrives
//! without enough signatures collected.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use node_blockchain::Blockchain;
use node_bus::{EventBus, NodeEvent};
use node_crypto::Secp256r1KeyPair;
use node_mempool::Mempool;
use node_network::payloads::Extensible;
use node_network::Server;
use node_types::{PublicKey, Transaction, UInt256, Witness};

use crate::config::NotaryConfig;
use crate::errors::NotaryError;
use crate::messages::{NotaryRequest, NotarySignature};
use crate::pool::NotaryPool;
use crate::roles;

const REQUEST_CATEGORY: &str = "notary-request";
const SIGNATURE_CATEGORY: &str = "notary-signature";

pub struct NotaryService {
    blockchain: Arc<Blockchain>,
    mempool: Arc<Mempool>,
    network: Arc<Server>,
    bus: EventBus,
    key: Option<Secp256r1KeyPair>,
    pool: Mutex<NotaryPool>,
}

impl NotaryService {
    pub fn new(
        blockchain: Arc<Blockchain>,
        mempool: Arc<Mempool>,
        network: Arc<Server>,
        bus: EventBus,
        key: Option<Secp256r1KeyPair>,
        config: NotaryConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            blockchain,
            mempool,
            network,
            bus,
            key,
            pool: Mutex::new(NotaryPool::new(config.max_pending_requests)),
        })
    }

    fn tip_height(&self) -> u32 {
        self.blockchain.tip_height().ok().flatten().unwrap_or(0)
    }

    fn my_notary_index(&self, notaries: &[PublicKey]) -> Option<u8> {
        let mine = self.key.as_ref()?.public_key();
        notaries.iter().position(|n| *n == mine).map(|i| i as u8)
    }

    /// Runs until the P2P layer's inbound channels close (node shutdown).
    pub async fn run(self: Arc<Self>) {
        let (req_tx, mut requests) = mpsc::channel(256);
        let (sig_tx, mut signatures) = mpsc::channel(256);
        self.network.register_extensible_handler(REQUEST_CATEGORY, req_tx);
        self.network.register_extensible_handler(SIGNATURE_CATEGORY, sig_tx);
        let mut events = self.bus.subscribe();

        loop {
            tokio::select! {
                maybe_ext = requests.recv() => {
                    match maybe_ext {
                        Some(ext) => self.handle_request(ext),
                        None => break,
                    }
                }
                maybe_ext = signatures.recv() => {
                    match maybe_ext {
                        Some(ext) => self.handle_signature(ext),
                        None => break,
                    }
                }
                event = events.recv() => {
                    match event {
                        Some(NodeEvent::BlockPersisted { height, .. }) => self.expire_fallbacks(height),
                        Some(_) => {}
                        None => break,
                    }
                }
            }
        }
    }

    fn handle_request(&self, ext: Extensible) {
        if let Err(e) = self.process_request(ext) {
            tracing::debug!(error = %e, "dropped notary request");
        }
    }

    fn process_request(&self, ext: Extensible) -> Result<(), NotaryError> {
        let request: NotaryRequest = bincode::deserialize(&ext.data)?;
        let notaries = roles::designated_notaries(self.blockchain.storage(), self.tip_height())?;
        let expected_account = roles::notary_account_hash(&notaries);
        if !request.main_tx.signers.iter().any(|s| s.account == expected_account) {
            return Err(NotaryError::WrongNotaryAccount);
        }
        if request.fallback_tx.valid_until_block >= request.main_tx.valid_until_block {
            return Err(NotaryError::FallbackNotEarlier);
        }

        let main_hash = tx_hash(&request.main_tx);
        {
            let mut pool = self.pool.lock();
            pool.insert_request(main_hash, request.main_tx.clone(), request.fallback_tx);
        }
        self.cast_signature(main_hash, &request.main_tx, &notaries);
        self.try_complete(main_hash, &notaries);
        Ok(())
    }

    fn cast_signature(&self, main_hash: UInt256, main_tx: &Transaction, notaries: &[PublicKey]) {
        let Some(key) = self.key.as_ref() else { return };
        let Some(index) = self.my_notary_index(notaries) else { return };

        let message = bincode::serialize(main_tx).expect("transaction always serializes");
        let signature = key.sign(&message);
        {
            let mut pool = self.pool.lock();
            pool.add_signature(&main_hash, index, signature);
        }

        let payload = NotarySignature { main_hash, notary_index: index, signature };
        let data = bincode::serialize(&payload).expect("notary signature always serializes");
        let ext = Extensible {
            category: SIGNATURE_CATEGORY.to_string(),
            valid_block_start: 0,
            valid_block_end: main_tx.valid_until_block,
            sender: node_crypto::hash160(key.public_key().as_bytes()),
            data: data.clone(),
            witness: Witness {
                invocation_script: key.sign(&data).to_vec(),
                verification_script: key.public_key().as_bytes().to_vec(),
            },
        };
        self.network.broadcast_extensible(ext);
    }

    fn handle_signature(&self, ext: Extensible) {
        if let Err(e) = self.process_signature(ext) {
            tracing::debug!(error = %e, "dropped notary signature");
        }
    }

    fn process_signature(&self, ext: Extensible) -> Result<(), NotaryError> {
        let notaries = roles::designated_notaries(self.blockchain.storage(), self.tip_height())?;
        let payload: NotarySignature = bincode::deserialize(&ext.data)?;
        let sender = *notaries
            .get(payload.notary_index as usize)
            .ok_or(NotaryError::UnknownNotary(payload.notary_index))?;
        node_crypto::verify_secp256r1(&sender, &ext.data, &ext.witness.invocation_script)
            .map_err(|_| NotaryError::BadSignature(payload.notary_index))?;

        let tracked = {
            let mut pool = self.pool.lock();
            pool.add_signature(&payload.main_hash, payload.notary_index, payload.signature).is_some()
        };
        if tracked {
            self.try_complete(payload.main_hash, &notaries);
        }
        Ok(())
    }

    /// Assembles the notary committee's multisig witness once enough
    /// signature shares are in and submits the main transaction to the
    /// mempool, from which it relays like any other transaction.
    fn try_complete(&self, main_hash: UInt256, notaries: &[PublicKey]) {
        let quorum = roles::quorum(notaries.len());
        let ready = {
            let pool = self.pool.lock();
            pool.get(&main_hash)
                .filter(|req| !req.relayed && req.signatures.len() >= quorum)
                .map(|req| (req.main_tx.clone(), req.signatures.values().copied().collect::<Vec<_>>()))
        };
        let Some((mut main_tx, sigs)) = ready else { return };

        let account_hash = roles::notary_account_hash(notaries);
        let completed_witness = Witness {
            invocation_script: bincode::serialize(&sigs).expect("signature list always serializes"),
            verification_script: roles::notary_account_script(notaries),
        };
        match main_tx.witnesses.iter_mut().find(|w| node_crypto::hash160(&w.verification_script) == account_hash) {
            Some(witness) => *witness = completed_witness,
            None => main_tx.witnesses.push(completed_witness),
        }

        let height = self.tip_height();
        match self.mempool.try_admit(self.blockchain.storage(), main_tx, height) {
            Ok(_) => {
                self.pool.lock().mark_relayed(&main_hash);
                tracing::debug!(%main_hash, "notary request relayed to mempool");
            }
            Err(e) => tracing::warn!(%main_hash, error = %e, "completed notary transaction rejected by mempool"),
        }
    }

    fn expire_fallbacks(&self, height: u32) {
        let due = { self.pool.lock().expire(height) };
        for fallback in due {
            match self.mempool.try_admit(self.blockchain.storage(), fallback, height) {
                Ok(hash) => tracing::debug!(%hash, "notary fallback transaction submitted"),
                Err(e) => tracing::warn!(error = %e, "notary fallback transaction rejected by mempool"),
            }
        }
    }
}

fn tx_hash(tx: &Transaction) -> UInt256 {
    node_crypto::hash256(&bincode::serialize(tx).expect("transaction always serializes"))
}
