//! Stack-based contract execution: opcodes, typed stack items, the
//! canonical serialization forms, gas pricing, syscall dispatch, and the
//! interpreter that ties them together.

pub mod engine;
pub mod errors;
pub mod gas;
pub mod interop;
pub mod opcode;
pub mod serialize;
pub mod stack_item;

pub use engine::{ExecutionEngine, VmState, DEFAULT_GAS_LIMIT, MAX_INVOCATION_STACK_DEPTH};
pub use errors::VmError;
pub use interop::{CallFlags, FindOptions, InteropHost};
pub use opcode::OpCode;
pub use serialize::{deserialize, serialize, to_json};
pub use stack_item::StackItem;
