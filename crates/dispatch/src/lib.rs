//! # Sentinel Dispatch
//!
//! Central request routing and the wiring of the agent graph.
//!
//! - [`CentralDispatcher`]: classifies a request and routes it to exactly one specialist
//! - [`Topology`]: instantiates every agent once and wires the fixed, cyclic graph

mod central;
mod request;
mod topology;

pub use central::{CentralDispatcher, DEFAULT_ALARM_CONDITION, ROUTED_ROLES};
pub use request::{DispatchPhase, RequestType, RoutingDecision};
pub use topology::{Topology, TopologyBuilder, WiringError, CLIENT, EDGES};
