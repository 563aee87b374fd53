#[derive(Debug, Clone)]
pub struct NotaryConfig {
    /// In-flight requests tracked at once; the oldest still-pending request
    /// is evicted to make room once this is reached.
    pub max_pending_requests: usize,
}

impl Default for NotaryConfig {
    fn default() -> Self {
        Self { max_pending_requests: 1000 }
    }
}
