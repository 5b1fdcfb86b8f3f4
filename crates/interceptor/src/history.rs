//! HistoryRing - bounded interaction history

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Kind of a recorded interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Message,
    ApiCall,
    ApiResponse,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Message => "message",
            InteractionKind::ApiCall => "api_call",
            InteractionKind::ApiResponse => "api_response",
        }
    }
}

/// One observed hop or API exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub source: String,
    pub target: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    pub timestamp: f64,
}

/// Fixed-capacity FIFO of interaction records
#[derive(Debug)]
pub struct HistoryRing {
    entries: VecDeque<InteractionRecord>,
    capacity: usize,
}

impl HistoryRing {
    /// Create a new HistoryRing
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest when full
    pub fn push(&mut self, record: InteractionRecord) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    /// Most recent records first
    pub fn recent(&self, limit: usize) -> Vec<InteractionRecord> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// All records, oldest first
    pub fn snapshot(&self) -> Vec<InteractionRecord> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(100)
    }
}
