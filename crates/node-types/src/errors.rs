//! The five error kinds shared by every crate that needs to
//! classify a failure for logging/propagation purposes.

use std::fmt;

use thiserror::Error;

/// Broad classification used to decide recovery strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    ConsensusViolation,
    ResourceExhaustion,
    TransientIo,
    Programming,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::ConsensusViolation => "consensus_violation",
            ErrorKind::ResourceExhaustion => "resource_exhaustion",
            ErrorKind::TransientIo => "transient_io",
            ErrorKind::Programming => "programming",
        };
        write!(f, "{s}")
    }
}

/// A classified error carrying a stable machine-readable code: errors are
/// surfaced with a kind, a stable machine-readable code, and a
/// human-readable cause chain.
#[derive(Debug, Error)]
#[error("[{kind}/{code}] {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, code, message)
    }

    pub fn consensus_violation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConsensusViolation, code, message)
    }

    pub fn resource_exhaustion(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceExhaustion, code, message)
    }

    pub fn transient_io(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientIo, code, message)
    }

    pub fn programming(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Programming, code, message)
    }
}
