//! Datastore - relational store used for alarm checks and analytics

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("datastore unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a successful query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    /// Result rows as column -> value objects
    Rows(Vec<Map<String, Value>>),
    /// Row count of a mutation
    Affected {
        #[serde(rename = "affectedRows")]
        affected_rows: u64,
    },
}

impl QueryOutcome {
    pub fn rows(&self) -> &[Map<String, Value>] {
        match self {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Affected { .. } => &[],
        }
    }

    /// Integer value of `column` in the first row
    pub fn first_i64(&self, column: &str) -> Option<i64> {
        self.rows().first()?.get(column)?.as_i64()
    }
}

/// `ExecuteQuery(sql, params?)`
pub trait Datastore: Send + Sync {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryOutcome, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_i64() {
        let mut row = Map::new();
        row.insert("count".to_string(), json!(3));
        let outcome = QueryOutcome::Rows(vec![row]);

        assert_eq!(outcome.first_i64("count"), Some(3));
        assert_eq!(outcome.first_i64("missing"), None);
    }

    #[test]
    fn test_affected_serializes_camel_case() {
        let outcome = QueryOutcome::Affected { affected_rows: 2 };
        assert_eq!(serde_json::to_value(&outcome).unwrap(), json!({"affectedRows": 2}));
        assert_eq!(outcome.first_i64("count"), None);
    }
}
