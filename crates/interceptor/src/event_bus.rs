//! EventBus - records every hop and API exchange and fans it out to observers
//!
//! Recording never fails from the caller's point of view: journal errors
//! and dead observers are logged and skipped.

use crate::history::{HistoryRing, InteractionKind, InteractionRecord};
use crate::journal::{Journal, JournalError};
use crate::sanitize::sanitize_params;
use crate::wire::McpMessage;
use serde::Serialize;
use serde_json::{json, Value};
use shared::{now_epoch_secs, AgentResult, AlarmNotifier, AlarmRecord, CoreConfig, Envelope, Tap};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Event pushed to live observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    Interaction(McpMessage),
    Alarm {
        alarm: AlarmRecord,
        #[serde(rename = "matchedRows")]
        matched_rows: i64,
    },
}

impl BusEvent {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Construction options for [`EventBus`]
#[derive(Debug, Clone)]
pub struct EventBusOptions {
    pub history_limit: usize,
    pub broadcast_delay: Duration,
    pub journal_path: Option<PathBuf>,
}

impl Default for EventBusOptions {
    fn default() -> Self {
        Self {
            history_limit: 100,
            broadcast_delay: Duration::ZERO,
            journal_path: None,
        }
    }
}

impl EventBusOptions {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            history_limit: config.event_bus_history_limit,
            broadcast_delay: config.broadcast_delay(),
            journal_path: config.history_log_path.clone(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct EventBus {
    messages: Mutex<HistoryRing>,
    api_calls: Mutex<HistoryRing>,
    observers: Mutex<BTreeMap<String, UnboundedSender<BusEvent>>>,
    journal: Option<Journal>,
    delay: Duration,
}

impl EventBus {
    /// Create a new EventBus, opening the journal if one is configured
    pub fn new(options: EventBusOptions) -> Result<Self, JournalError> {
        let journal = match &options.journal_path {
            Some(path) => Some(Journal::open(path)?),
            None => None,
        };
        Ok(Self {
            messages: Mutex::new(HistoryRing::new(options.history_limit)),
            api_calls: Mutex::new(HistoryRing::new(options.history_limit)),
            observers: Mutex::new(BTreeMap::new()),
            journal,
            delay: options.broadcast_delay,
        })
    }

    /// In-memory bus without a journal
    pub fn in_memory(history_limit: usize) -> Self {
        Self {
            messages: Mutex::new(HistoryRing::new(history_limit)),
            api_calls: Mutex::new(HistoryRing::new(history_limit)),
            observers: Mutex::new(BTreeMap::new()),
            journal: None,
            delay: Duration::ZERO,
        }
    }

    /// Record an inter-agent message
    pub fn record_message(&self, source: &str, target: &str, content: impl Into<String>) -> InteractionRecord {
        self.record(source, target, content.into(), InteractionKind::Message)
    }

    /// Record an outbound API call; credential-shaped params are masked
    pub fn record_api_call(&self, source: &str, api: &str, endpoint: &str, params: &Value) -> InteractionRecord {
        let content = json!({
            "endpoint": endpoint,
            "params": sanitize_params(params),
        });
        self.record(source, api, content.to_string(), InteractionKind::ApiCall)
    }

    /// Record the response to an API call, flowing from `api` back to `target`
    pub fn record_api_response(&self, api: &str, target: &str, endpoint: &str, response: &Value) -> InteractionRecord {
        let content = json!({
            "endpoint": endpoint,
            "response": sanitize_params(response),
        });
        self.record(api, target, content.to_string(), InteractionKind::ApiResponse)
    }

    fn record(&self, source: &str, target: &str, content: String, kind: InteractionKind) -> InteractionRecord {
        let record = InteractionRecord {
            source: source.to_string(),
            target: target.to_string(),
            content,
            kind,
            timestamp: now_epoch_secs(),
        };

        let ring = match kind {
            InteractionKind::Message => &self.messages,
            InteractionKind::ApiCall | InteractionKind::ApiResponse => &self.api_calls,
        };
        lock(ring).push(record.clone());

        let wire = McpMessage::from_record(&record);
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&wire) {
                warn!(path = %journal.path().display(), error = %e, "Failed to append interaction log");
            }
        }

        self.broadcast(BusEvent::Interaction(wire));

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        record
    }

    /// Register an observer; an existing observer with the same id is replaced
    pub fn add_observer(&self, id: impl Into<String>) -> UnboundedReceiver<BusEvent> {
        let id = id.into();
        let (tx, rx) = unbounded_channel();
        if lock(&self.observers).insert(id.clone(), tx).is_some() {
            debug!(observer = %id, "Replaced existing observer");
        }
        rx
    }

    /// Returns whether the observer was registered
    pub fn remove_observer(&self, id: &str) -> bool {
        lock(&self.observers).remove(id).is_some()
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.observers).len()
    }

    /// Push an event to every observer; dead observers are dropped
    pub fn broadcast(&self, event: BusEvent) {
        let mut observers = lock(&self.observers);
        let mut dead = Vec::new();

        for (id, sender) in observers.iter() {
            if sender.send(event.clone()).is_err() {
                dead.push(id.clone());
            }
        }

        for id in dead {
            warn!(observer = %id, "Observer disconnected, removing");
            observers.remove(&id);
        }
    }

    /// Message history, oldest first
    pub fn messages(&self) -> Vec<InteractionRecord> {
        lock(&self.messages).snapshot()
    }

    /// API call/response history, oldest first
    pub fn api_calls(&self) -> Vec<InteractionRecord> {
        lock(&self.api_calls).snapshot()
    }

    /// Most recent messages first
    pub fn recent_messages(&self, limit: usize) -> Vec<InteractionRecord> {
        lock(&self.messages).recent(limit)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::in_memory(100)
    }
}

impl Tap for EventBus {
    fn on_send(&self, target: &str, envelope: &Envelope) {
        let content = sanitize_params(&envelope.to_value()).to_string();
        self.record_message(envelope.source_agent(), target, content);
    }

    fn on_reply(&self, source: &str, target: &str, result: &AgentResult) {
        let content = sanitize_params(&result.to_value()).to_string();
        self.record_message(source, target, content);
    }

    fn on_api_call(&self, source: &str, api: &str, endpoint: &str, params: &Value) {
        self.record_api_call(source, api, endpoint, params);
    }

    fn on_api_response(&self, source: &str, api: &str, endpoint: &str, response: &Value) {
        self.record_api_response(api, source, endpoint, response);
    }
}

impl AlarmNotifier for EventBus {
    fn notify(&self, alarm: &AlarmRecord, matched_rows: i64) {
        self.broadcast(BusEvent::Alarm {
            alarm: alarm.clone(),
            matched_rows,
        });
    }
}
