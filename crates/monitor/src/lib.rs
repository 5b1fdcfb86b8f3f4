//! # Sentinel Monitor
//!
//! Background alarm checks: a registry of named SQL predicates, a single
//! worker that counts their matches on an interval, and the agent that
//! exposes both to the message network.

mod agent;
mod monitor;
mod notifier;
mod registry;

pub use agent::AlarmAgent;
pub use monitor::{AlarmMonitor, CheckError, CycleReport, MonitorOptions, StopOutcome};
pub use notifier::LogNotifier;
pub use registry::AlarmRegistry;
