//! Alarm types shared by the monitor, the event bus and the dispatcher

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alarm submission: a named SQL predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmSpec {
    pub id: String,
    pub condition: String,
    #[serde(default)]
    pub description: String,
}

impl AlarmSpec {
    pub fn new(id: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            condition: condition.into(),
            description: String::new(),
        }
    }

    /// Builder: set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Registered alarm; also the alarm wire event sent to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmRecord {
    pub id: String,
    pub description: String,
    pub condition: String,
    pub created_at: DateTime<Utc>,
    pub last_triggered: Option<DateTime<Utc>>,
    pub trigger_count: u64,
}

impl AlarmRecord {
    /// Create an untriggered record from a submission
    pub fn from_spec(spec: AlarmSpec, created_at: DateTime<Utc>) -> Self {
        Self {
            id: spec.id,
            description: spec.description,
            condition: spec.condition,
            created_at,
            last_triggered: None,
            trigger_count: 0,
        }
    }

    /// Apply one trigger. `lastTriggered` never moves backwards.
    pub fn mark_triggered(&mut self, at: DateTime<Utc>) {
        let at = match self.last_triggered {
            Some(previous) if previous > at => previous,
            _ => at,
        };
        self.last_triggered = Some(at);
        self.trigger_count += 1;
    }
}

/// Receives a notification each time an alarm fires
pub trait AlarmNotifier: Send + Sync {
    fn notify(&self, alarm: &AlarmRecord, matched_rows: i64);
}
