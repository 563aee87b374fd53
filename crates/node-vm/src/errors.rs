//! VM fault taxonomy. Every variant here corresponds to a script-level
//! `FAULT` outcome: the invoking transaction/contract call fails but the
//! surrounding block/consensus round is unaffected.

use node_types::errors::{ClassifiedError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("stack underflow: needed {needed} item(s), had {available}")]
    StackUnderflow { needed: usize, available: usize },

    #[error("invocation stack depth {depth} exceeds limit {limit}")]
    InvocationStackOverflow { depth: usize, limit: usize },

    #[error("cannot cast {from} to {to}")]
    InvalidCast { from: &'static str, to: &'static str },

    #[error("integer encoding too large: {bytes} bytes (limit 32)")]
    IntegerTooLarge { bytes: usize },

    #[error("unknown opcode byte 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("jump target {target} out of script bounds (len {len})")]
    InvalidJumpTarget { target: i64, len: usize },

    #[error("division by zero")]
    DivideByZero,

    #[error("out of gas: needed {needed}, had {available}")]
    OutOfGas { needed: i64, available: i64 },

    #[error("item limit exceeded: {count} > {limit}")]
    ItemLimitExceeded { count: usize, limit: usize },

    #[error("serialization depth {depth} exceeds limit {limit}")]
    SerializationDepthExceeded { depth: usize, limit: usize },

    #[error("item of type {0} is not serializable")]
    NotSerializable(&'static str),

    #[error("unhandled exception: {0}")]
    UnhandledException(String),

    #[error("ASSERT opcode evaluated to false")]
    AssertionFailed,

    #[error("explicit ABORT opcode reached")]
    Aborted,

    #[error("unknown syscall hash {0:#010x}")]
    UnknownSyscall(u32),

    #[error("syscall not permitted under current call flags: {0}")]
    CallFlagViolation(&'static str),

    #[error("call depth {depth} exceeds limit {limit}")]
    CallDepthExceeded { depth: usize, limit: usize },
}

impl From<VmError> for ClassifiedError {
    fn from(e: VmError) -> Self {
        let kind = match &e {
            VmError::OutOfGas { .. }
            | VmError::InvocationStackOverflow { .. }
            | VmError::CallDepthExceeded { .. }
            | VmError::ItemLimitExceeded { .. }
            | VmError::SerializationDepthExceeded { .. } => ErrorKind::ResourceExhaustion,
            _ => ErrorKind::Validation,
        };
        let message = e.to_string();
        ClassifiedError::new(kind, "vm_fault", message)
    }
}
