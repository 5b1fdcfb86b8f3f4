//! # Sentinel Shared
//!
//! Common types and interfaces used across all Sentinel crates: the message
//! envelope, the agent contract, and the collaborator traits (oracle,
//! datastore, alarm notifier).

pub mod agent;
pub mod alarm;
pub mod config;
pub mod datastore;
pub mod envelope;
pub mod error;
pub mod market;
pub mod oracle;
pub mod result;

// Re-exports
pub use agent::*;
pub use alarm::*;
pub use config::*;
pub use datastore::*;
pub use envelope::*;
pub use error::*;
pub use market::*;
pub use oracle::*;
pub use result::*;
