//! AlarmRegistry - named SQL predicates checked by the monitor
//!
//! One coarse lock guards every mutation. The monitor never iterates the map
//! under the lock; it takes [`AlarmRegistry::snapshot_ids`] at cycle start and
//! looks each alarm up again as it goes.

use chrono::{DateTime, Utc};
use regex::Regex;
use shared::{AlarmRecord, AlarmSpec, CoreError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Registry of alarms keyed by id
#[derive(Debug, Default)]
pub struct AlarmRegistry {
    alarms: Mutex<HashMap<String, AlarmRecord>>,
}

impl AlarmRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn alarms(&self) -> MutexGuard<'_, HashMap<String, AlarmRecord>> {
        self.alarms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Minimum shape check: a `SELECT` and a `FROM` token
    ///
    /// This rejects obvious non-queries. It does not make the SQL safe.
    pub fn validate(&self, spec: &AlarmSpec) -> Result<()> {
        if spec.id.trim().is_empty() {
            return Err(CoreError::validation("alarm id is required"));
        }
        let condition = spec.condition.trim();
        if condition.is_empty() {
            return Err(CoreError::validation("alarm condition is required"));
        }
        if !has_keyword(condition, "select") || !has_keyword(condition, "from") {
            return Err(CoreError::validation(
                "alarm condition must be a SELECT ... FROM ... query",
            ));
        }
        Ok(())
    }

    /// Register `spec`, replacing any alarm with the same id
    pub fn insert(&self, spec: AlarmSpec, now: DateTime<Utc>) -> Result<AlarmRecord> {
        self.validate(&spec)?;
        let record = AlarmRecord::from_spec(spec, now);
        self.alarms().insert(record.id.clone(), record.clone());
        Ok(record)
    }

    pub fn remove(&self, id: &str) -> Option<AlarmRecord> {
        self.alarms().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<AlarmRecord> {
        self.alarms().get(id).cloned()
    }

    /// All alarms, oldest first
    pub fn list(&self) -> Vec<AlarmRecord> {
        let mut alarms: Vec<AlarmRecord> = self.alarms().values().cloned().collect();
        alarms.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        alarms
    }

    /// Point-in-time list of ids, sorted
    pub fn snapshot_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.alarms().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Apply a trigger to the registration that was checked
    ///
    /// `None` if that alarm was removed in the meantime, or replaced by a
    /// new registration under the same id.
    pub fn record_trigger(&self, checked: &AlarmRecord, at: DateTime<Utc>) -> Option<AlarmRecord> {
        let mut alarms = self.alarms();
        let record = alarms
            .get_mut(&checked.id)
            .filter(|r| r.created_at == checked.created_at && r.condition == checked.condition)?;
        record.mark_triggered(at);
        Some(record.clone())
    }

    pub fn len(&self) -> usize {
        self.alarms().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Case-insensitive whole-word match
fn has_keyword(sql: &str, keyword: &str) -> bool {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(keyword)))
        .map(|r| r.is_match(sql))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    // ============== Validation Tests ==============

    #[test]
    fn test_condition_needs_select_and_from() {
        let registry = AlarmRegistry::new();

        assert!(registry
            .validate(&AlarmSpec::new("a1", "select * from t where x > 1"))
            .is_ok());
        assert!(registry.validate(&AlarmSpec::new("a1", "SELECT 1")).is_err());
        assert!(registry.validate(&AlarmSpec::new("a1", "DELETE FROM t")).is_err());
        assert!(registry.validate(&AlarmSpec::new("", "SELECT * FROM t")).is_err());
    }

    #[test]
    fn test_tokens_must_be_whole_words() {
        let registry = AlarmRegistry::new();
        assert!(registry
            .validate(&AlarmSpec::new("a1", "preselected fromage"))
            .is_err());
    }

    #[test]
    fn test_invalid_condition_creates_no_entry() {
        let registry = AlarmRegistry::new();
        let result = registry.insert(AlarmSpec::new("a1", "SELECT * WHERE x > 1"), Utc::now());

        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    // ============== Mutation Tests ==============

    #[test]
    fn test_insert_and_list() {
        let registry = AlarmRegistry::new();
        registry
            .insert(AlarmSpec::new("a1", "SELECT * FROM t WHERE x>1"), Utc::now())
            .unwrap();

        let alarms = registry.list();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].id, "a1");
        assert_eq!(alarms[0].trigger_count, 0);
        assert!(alarms[0].last_triggered.is_none());
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let registry = AlarmRegistry::new();
        let now = Utc::now();
        let first = registry.insert(AlarmSpec::new("a1", "SELECT * FROM t"), now).unwrap();
        registry.record_trigger(&first, now);
        registry
            .insert(AlarmSpec::new("a1", "SELECT * FROM u"), now)
            .unwrap();

        let record = registry.get("a1").unwrap();
        assert_eq!(record.condition, "SELECT * FROM u");
        assert_eq!(record.trigger_count, 0);
    }

    #[test]
    fn test_list_is_oldest_first() {
        let registry = AlarmRegistry::new();
        let now = Utc::now();
        registry
            .insert(AlarmSpec::new("late", "SELECT * FROM t"), now)
            .unwrap();
        registry
            .insert(AlarmSpec::new("early", "SELECT * FROM t"), now - Duration::minutes(5))
            .unwrap();

        let ids: Vec<String> = registry.list().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_record_trigger_after_removal() {
        let registry = AlarmRegistry::new();
        let checked = registry
            .insert(AlarmSpec::new("a1", "SELECT * FROM t"), Utc::now())
            .unwrap();
        let ids = registry.snapshot_ids();

        registry.remove("a1");

        assert_eq!(ids, vec!["a1"]);
        assert!(registry.record_trigger(&checked, Utc::now()).is_none());
    }

    #[test]
    fn test_record_trigger_ignores_replacement() {
        let registry = AlarmRegistry::new();
        let now = Utc::now();
        let checked = registry
            .insert(AlarmSpec::new("a1", "SELECT * FROM t"), now)
            .unwrap();

        registry.remove("a1");
        registry
            .insert(AlarmSpec::new("a1", "SELECT * FROM u"), now + Duration::seconds(1))
            .unwrap();

        assert!(registry.record_trigger(&checked, Utc::now()).is_none());
        let current = registry.get("a1").unwrap();
        assert_eq!(current.trigger_count, 0);
        assert!(current.last_triggered.is_none());

        assert!(registry.record_trigger(&current, Utc::now()).is_some());
        assert_eq!(registry.get("a1").unwrap().trigger_count, 1);
    }
}
