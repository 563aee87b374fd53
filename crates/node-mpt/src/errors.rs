use node_types::UInt256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MptError {
    #[error("node {0} referenced by hash not found in storage")]
    NodeNotFound(UInt256),
    #[error("corrupt trie node encoding: {0}")]
    Corrupt(String),
}
