//! Agent contract, peer handles and the synchronous send path
//!
//! The topology owns every agent through an [`AgentHandle`]. Agents refer to
//! their peers through [`Peer`] / [`PeerSet`], which hold weak references
//! assigned exactly once during wiring, so the cyclic graph never leaks.

use crate::envelope::{Envelope, Message};
use crate::error::CoreError;
use crate::result::AgentResult;
use serde_json::Value;
use std::cell::RefCell;
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, warn};

/// Role of an agent in the fixed topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentRole {
    User,
    Central,
    InfoDistributor,
    DataStore,
    CoinInfo,
    Whale,
    Contract,
    TxFrequency,
    CexWithdraw,
    Wallet,
    Exchange,
    Trade,
    Alarm,
}

impl AgentRole {
    pub const ALL: [AgentRole; 13] = [
        AgentRole::User,
        AgentRole::Central,
        AgentRole::InfoDistributor,
        AgentRole::DataStore,
        AgentRole::CoinInfo,
        AgentRole::Whale,
        AgentRole::Contract,
        AgentRole::TxFrequency,
        AgentRole::CexWithdraw,
        AgentRole::Wallet,
        AgentRole::Exchange,
        AgentRole::Trade,
        AgentRole::Alarm,
    ];

    /// Registered agent name
    pub fn agent_name(&self) -> &'static str {
        match self {
            AgentRole::User => "UserAgent",
            AgentRole::Central => "CentralDispatcher",
            AgentRole::InfoDistributor => "InfoDistributor",
            AgentRole::DataStore => "DataStoreAgent",
            AgentRole::CoinInfo => "CoinInfoAgent",
            AgentRole::Whale => "WhaleAgent",
            AgentRole::Contract => "ContractAgent",
            AgentRole::TxFrequency => "TxFrequencyAgent",
            AgentRole::CexWithdraw => "CexWithdrawAgent",
            AgentRole::Wallet => "WalletAgent",
            AgentRole::Exchange => "ExchangeAgent",
            AgentRole::Trade => "TradeExecutor",
            AgentRole::Alarm => "AlarmAgent",
        }
    }

    /// Agent category used in the MCP wire shape
    pub fn category(&self) -> &'static str {
        match self {
            AgentRole::Central => "central",
            AgentRole::InfoDistributor => "processor",
            AgentRole::DataStore => "data_cleaner",
            AgentRole::CoinInfo
            | AgentRole::Whale
            | AgentRole::Contract
            | AgentRole::TxFrequency
            | AgentRole::CexWithdraw => "specialist",
            AgentRole::Wallet | AgentRole::Exchange | AgentRole::Trade => "executor",
            AgentRole::Alarm => "notification",
            AgentRole::User => "user",
        }
    }

    /// Look up a role by its registered agent name
    pub fn from_agent_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.agent_name() == name)
    }
}

/// Serialized as the registered agent name
impl serde::Serialize for AgentRole {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.agent_name())
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.agent_name())
    }
}

/// Polymorphic agent with a synchronous receive contract
///
/// `receive` never panics on unexpected input: unsupported message types
/// come back as an error [`AgentResult`].
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn role(&self) -> AgentRole;

    /// Handle one envelope
    fn receive(&self, envelope: Envelope) -> AgentResult;

    /// Handle a task originating from the agent itself
    fn process(&self, task: Message) -> AgentResult {
        self.receive(Envelope::new(self.name(), task))
    }
}

/// Owning handle held by the topology
pub type AgentHandle = Arc<dyn Agent>;

/// Non-owning handle held by peers
pub type WeakHandle = Weak<dyn Agent>;

/// A single peer slot, assigned once during wiring
#[derive(Default)]
pub struct Peer {
    slot: OnceLock<WeakHandle>,
}

impl Peer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the peer. Fails if the slot was already wired.
    pub fn wire(&self, handle: &AgentHandle) -> Result<(), CoreError> {
        self.slot
            .set(Arc::downgrade(handle))
            .map_err(|_| CoreError::Wiring(format!("peer '{}' wired twice", handle.name())))
    }

    /// Resolve the peer if it is wired and still alive
    pub fn get(&self) -> Option<AgentHandle> {
        self.slot.get().and_then(Weak::upgrade)
    }

    pub fn is_wired(&self) -> bool {
        self.get().is_some()
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(agent) => write!(f, "Peer({})", agent.name()),
            None => write!(f, "Peer(unwired)"),
        }
    }
}

/// A fan-out peer list, assigned once during wiring
#[derive(Default)]
pub struct PeerSet {
    slot: OnceLock<Vec<WeakHandle>>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wire(&self, handles: &[AgentHandle]) -> Result<(), CoreError> {
        let weak = handles.iter().map(Arc::downgrade).collect();
        self.slot
            .set(weak)
            .map_err(|_| CoreError::Wiring("peer set wired twice".to_string()))
    }

    /// Live members, in wiring order
    pub fn members(&self) -> Vec<AgentHandle> {
        self.slot
            .get()
            .map(|peers| peers.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Observation hook invoked around every send and outbound API call
pub trait Tap: Send + Sync {
    /// Called before the target receives the envelope
    fn on_send(&self, target: &str, envelope: &Envelope);

    /// Called after the target returns
    fn on_reply(&self, source: &str, target: &str, result: &AgentResult);

    fn on_api_call(&self, source: &str, api: &str, endpoint: &str, params: &Value);

    fn on_api_response(&self, source: &str, api: &str, endpoint: &str, response: &Value);
}

thread_local! {
    static IN_FLIGHT: RefCell<Vec<(String, &'static str)>> = const { RefCell::new(Vec::new()) };
}

/// Marks `(target, message type)` as in flight on this thread until dropped
struct InFlight;

impl InFlight {
    fn enter(target: &str, message_type: &'static str) -> Result<Self, CoreError> {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack
                .iter()
                .any(|(agent, ty)| agent == target && *ty == message_type)
            {
                return Err(CoreError::Reentrant {
                    agent: target.to_string(),
                    message_type: message_type.to_string(),
                });
            }
            stack.push((target.to_string(), message_type));
            Ok(InFlight)
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Outbound side of an agent: builds envelopes and reports to the tap
#[derive(Clone)]
pub struct Outbox {
    sender: String,
    tap: Option<Arc<dyn Tap>>,
}

impl Outbox {
    /// Create a new outbox for `sender`
    pub fn new(sender: impl Into<String>, tap: Option<Arc<dyn Tap>>) -> Self {
        Self {
            sender: sender.into(),
            tap,
        }
    }

    /// Outbox without observation
    pub fn detached(sender: impl Into<String>) -> Self {
        Self::new(sender, None)
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Deliver `message` to `target` synchronously
    pub fn send(&self, target: &AgentHandle, message: Message) -> AgentResult {
        let target_name = target.name().to_string();
        let message_type = message.type_name();

        let _guard = match InFlight::enter(&target_name, message_type) {
            Ok(guard) => guard,
            Err(err) => {
                warn!(
                    from = %self.sender,
                    to = %target_name,
                    message_type,
                    "Refusing re-entrant send"
                );
                return err.into();
            }
        };

        let envelope = Envelope::new(&self.sender, message);
        debug!(from = %self.sender, to = %target_name, message_type, "send");

        if let Some(tap) = &self.tap {
            tap.on_send(&target_name, &envelope);
        }

        let result = target.receive(envelope);

        if let Some(tap) = &self.tap {
            tap.on_reply(&target_name, &self.sender, &result);
        }

        result
    }

    /// Deliver to a wired peer, or fail with capability unavailable
    pub fn send_to(&self, peer: &Peer, capability: &str, message: Message) -> AgentResult {
        match peer.get() {
            Some(target) => self.send(&target, message),
            None => CoreError::unavailable(capability).into(),
        }
    }

    /// Record an outbound API call
    pub fn api_call(&self, api: &str, endpoint: &str, params: &Value) {
        if let Some(tap) = &self.tap {
            tap.on_api_call(&self.sender, api, endpoint, params);
        }
    }

    /// Record the response to an outbound API call
    pub fn api_response(&self, api: &str, endpoint: &str, response: &Value) {
        if let Some(tap) = &self.tap {
            tap.on_api_response(&self.sender, api, endpoint, response);
        }
    }
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("sender", &self.sender)
            .field("tapped", &self.tap.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Echoes the message type back
    struct Echo;

    impl Agent for Echo {
        fn name(&self) -> &str {
            "CoinInfoAgent"
        }

        fn role(&self) -> AgentRole {
            AgentRole::CoinInfo
        }

        fn receive(&self, envelope: Envelope) -> AgentResult {
            match envelope.message() {
                Message::GetCoinInfo { coin } => AgentResult::success().with("coin", coin),
                other => AgentResult::unsupported(other.type_name()),
            }
        }
    }

    /// Forwards every message it receives to its peer, unchanged
    struct Bouncer {
        peer: Peer,
        outbox: Outbox,
    }

    impl Agent for Bouncer {
        fn name(&self) -> &str {
            "CentralDispatcher"
        }

        fn role(&self) -> AgentRole {
            AgentRole::Central
        }

        fn receive(&self, envelope: Envelope) -> AgentResult {
            self.outbox
                .send_to(&self.peer, "bounce", envelope.into_message())
        }
    }

    #[derive(Default)]
    struct RecordingTap {
        events: Mutex<Vec<String>>,
    }

    impl Tap for RecordingTap {
        fn on_send(&self, target: &str, envelope: &Envelope) {
            self.events
                .lock()
                .unwrap()
                .push(format!("send {}->{} {}", envelope.source_agent(), target, envelope.message_type()));
        }

        fn on_reply(&self, source: &str, target: &str, result: &AgentResult) {
            self.events
                .lock()
                .unwrap()
                .push(format!("reply {}->{} {}", source, target, result.status));
        }

        fn on_api_call(&self, source: &str, api: &str, _endpoint: &str, _params: &Value) {
            self.events.lock().unwrap().push(format!("call {} {}", source, api));
        }

        fn on_api_response(&self, source: &str, api: &str, _endpoint: &str, _response: &Value) {
            self.events.lock().unwrap().push(format!("response {} {}", source, api));
        }
    }

    // ============== Role Tests ==============

    #[test]
    fn test_role_names_round_trip() {
        for role in AgentRole::ALL {
            assert_eq!(AgentRole::from_agent_name(role.agent_name()), Some(role));
        }
        assert_eq!(AgentRole::Trade.category(), "executor");
    }

    // ============== Peer Tests ==============

    #[test]
    fn test_peer_wires_once() {
        let echo: AgentHandle = Arc::new(Echo);
        let peer = Peer::new();

        assert!(!peer.is_wired());
        peer.wire(&echo).unwrap();
        assert!(peer.is_wired());
        assert!(matches!(peer.wire(&echo), Err(CoreError::Wiring(_))));
    }

    #[test]
    fn test_peer_does_not_keep_agent_alive() {
        let peer = Peer::new();
        {
            let echo: AgentHandle = Arc::new(Echo);
            peer.wire(&echo).unwrap();
        }
        assert!(peer.get().is_none());
    }

    #[test]
    fn test_peer_set_members() {
        let a: AgentHandle = Arc::new(Echo);
        let b: AgentHandle = Arc::new(Echo);
        let set = PeerSet::new();

        assert!(set.is_empty());
        set.wire(&[a, b]).unwrap();
        assert_eq!(set.len(), 2);
    }

    // ============== Outbox Tests ==============

    #[test]
    fn test_send_notifies_tap_before_and_after() {
        let tap = Arc::new(RecordingTap::default());
        let outbox = Outbox::new("UserAgent", Some(tap.clone() as Arc<dyn Tap>));
        let echo: AgentHandle = Arc::new(Echo);

        let result = outbox.send(&echo, Message::GetCoinInfo { coin: "ETH".to_string() });

        assert!(result.is_success());
        let events = tap.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], "send UserAgent->CoinInfoAgent get_coin_info");
        assert_eq!(events[1], "reply CoinInfoAgent->UserAgent success");
    }

    #[test]
    fn test_send_unsupported_is_error_result() {
        let outbox = Outbox::detached("UserAgent");
        let echo: AgentHandle = Arc::new(Echo);

        let result = outbox.send(&echo, Message::ListAlarms {});

        assert!(result.is_error());
        assert!(result.message_text().contains("unsupported message type"));
    }

    #[test]
    fn test_send_to_unwired_peer_is_capability_unavailable() {
        let outbox = Outbox::detached("CentralDispatcher");
        let result = outbox.send_to(&Peer::new(), "coin_info", Message::ListAlarms {});

        assert!(result.is_error());
        assert_eq!(result.message_text(), "capability unavailable: coin_info");
    }

    #[test]
    fn test_reentrant_send_is_refused() {
        // Both bouncers register as CentralDispatcher, so the inner hop
        // delivers list_alarms to an agent name already handling it.
        let inner: AgentHandle = Arc::new(Bouncer {
            peer: Peer::new(),
            outbox: Outbox::detached("CentralDispatcher"),
        });
        let entry = Bouncer {
            peer: Peer::new(),
            outbox: Outbox::detached("CentralDispatcher"),
        };
        entry.peer.wire(&inner).unwrap();
        let entry: AgentHandle = Arc::new(entry);

        let outer = Outbox::detached("UserAgent");
        let result = outer.send(&entry, Message::ListAlarms {});

        assert!(result.is_error());
        assert_eq!(result.get("errorKind"), Some(&serde_json::json!("reentrant_dispatch")));
    }

    #[test]
    fn test_in_flight_stack_unwinds_after_send() {
        let outbox = Outbox::detached("UserAgent");
        let echo: AgentHandle = Arc::new(Echo);

        for _ in 0..3 {
            let result = outbox.send(&echo, Message::GetCoinInfo { coin: "BTC".to_string() });
            assert!(result.is_success());
        }
        IN_FLIGHT.with(|stack| assert!(stack.borrow().is_empty()));
    }

    #[test]
    fn test_api_call_helpers_reach_tap() {
        let tap = Arc::new(RecordingTap::default());
        let outbox = Outbox::new("WalletAgent", Some(tap.clone() as Arc<dyn Tap>));

        outbox.api_call("Web3", "eth_sendTransaction", &Value::Null);
        outbox.api_response("Web3", "eth_sendTransaction", &Value::Null);

        let events = tap.events.lock().unwrap();
        assert_eq!(events.as_slice(), ["call WalletAgent Web3", "response WalletAgent Web3"]);
    }
}
