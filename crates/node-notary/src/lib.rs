//! P2P notary extension: accepts main/fallback transaction pairs that need
//! more signatures than their sender alone can provide, collects the
//! missing shares from the designated notary committee, and relays the
//! completed transaction (or its fallback) through the normal mempool path.

pub mod config;
pub mod errors;
pub mod messages;
pub mod pool;
pub mod roles;
pub mod service;

pub use config::NotaryConfig;
pub use errors::NotaryError;
pub use messages::{NotaryRequest, NotarySignature};
pub use service::NotaryService;
