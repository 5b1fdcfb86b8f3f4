//! # Sentinel Interceptor
//!
//! Observation layer for the agent network: bounded interaction history,
//! live observer fan-out, secret redaction and the append-only MCP log.

mod event_bus;
mod history;
mod journal;
mod oracle;
mod sanitize;
mod wire;

pub use event_bus::{BusEvent, EventBus, EventBusOptions};
pub use history::{HistoryRing, InteractionKind, InteractionRecord};
pub use journal::{Journal, JournalError};
pub use oracle::InterceptedOracle;
pub use sanitize::{mask_secret, sanitize_params};
pub use wire::{agent_type_of, McpEndpoint, McpMessage, McpMetadata};
