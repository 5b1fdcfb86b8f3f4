//! AgentResult - Tagged result returned by every agent

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome status of a receive/process call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
    Warning,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::Error => write!(f, "error"),
            Status::Warning => write!(f, "warning"),
        }
    }
}

/// Result of an agent call: `{status, message?, ...data}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Branch-specific payload, flattened next to `status`
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl AgentResult {
    fn with_status(status: Status, message: Option<String>) -> Self {
        Self {
            status,
            message,
            data: Map::new(),
        }
    }

    /// Successful result without a message
    pub fn success() -> Self {
        Self::with_status(Status::Success, None)
    }

    /// Successful result with a message
    pub fn ok(message: impl Into<String>) -> Self {
        Self::with_status(Status::Success, Some(message.into()))
    }

    /// Error result
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_status(Status::Error, Some(message.into()))
    }

    /// Warning result
    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_status(Status::Warning, Some(message.into()))
    }

    /// Builder: attach a payload field
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.data.insert(key.into(), value);
        self
    }

    /// Attach a payload field in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.data.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// Message text, or an empty string
    pub fn message_text(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    /// Structured error for a message type the receiver does not handle
    pub fn unsupported(message_type: &str) -> Self {
        CoreError::UnsupportedMessageType(message_type.to_string()).into()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<CoreError> for AgentResult {
    fn from(err: CoreError) -> Self {
        AgentResult::error(err.to_string()).with("errorKind", err.kind())
    }
}
