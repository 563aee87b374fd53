//! In-process event bus connecting the node's long-lived tasks.

pub mod bus;
pub mod events;

pub use bus::{EventBus, EventReceiver, DEFAULT_CAPACITY};
pub use events::{EvictionReason, NodeEvent};
