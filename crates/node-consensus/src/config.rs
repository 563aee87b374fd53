use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Timeout for view 0; doubles with every subsequent view.
    pub base_view_timeout: Duration,
    /// Upper bound on transactions pulled from the mempool per proposal;
    /// well under `node_blockchain::MAX_TRANSACTIONS_PER_BLOCK`, which is
    /// a hard structural ceiling rather than a target batch size.
    pub max_transactions_per_proposal: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            base_view_timeout: Duration::from_secs(15),
            max_transactions_per_proposal: 500,
        }
    }
}
