//! SqliteDatastore - analytics store backing alarm checks and `sql_query`

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Number, Value};
use shared::{Datastore, QueryOutcome, StoreError};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS coin_info (
    symbol TEXT PRIMARY KEY,
    name TEXT,
    contract TEXT,
    price REAL,
    market_cap REAL,
    volume_24h REAL,
    change_24h REAL,
    last_updated INTEGER
);
CREATE TABLE IF NOT EXISTS whale_transactions (
    tx_hash TEXT PRIMARY KEY,
    from_address TEXT,
    to_address TEXT,
    value REAL,
    coin TEXT,
    block_number INTEGER,
    timestamp INTEGER
);
CREATE TABLE IF NOT EXISTS cex_withdrawals (
    tx_hash TEXT PRIMARY KEY,
    from_address TEXT,
    to_address TEXT,
    value REAL,
    timestamp INTEGER
);
CREATE TABLE IF NOT EXISTS contract_activities (
    tx_hash TEXT PRIMARY KEY,
    contract_address TEXT,
    from_address TEXT,
    value REAL,
    timestamp INTEGER,
    block_number INTEGER
);
CREATE TABLE IF NOT EXISTS frequent_addresses (
    address TEXT PRIMARY KEY,
    transaction_count INTEGER,
    first_seen INTEGER,
    last_seen INTEGER
);
";

/// Names of the tables created on open
pub const TABLES: &[&str] = &[
    "coin_info",
    "whale_transactions",
    "cex_withdrawals",
    "contract_activities",
    "frequent_addresses",
];

pub struct SqliteDatastore {
    conn: Mutex<Connection>,
}

impl SqliteDatastore {
    /// Open (or create) a database file and ensure the schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(unavailable)?;
        Self::with_connection(conn)
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(unavailable)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn query_error(e: rusqlite::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
    }
}

impl Datastore for SqliteDatastore {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryOutcome, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;

        let mut stmt = conn.prepare(sql).map_err(query_error)?;
        let bound: Vec<SqlValue> = params.iter().map(to_sql).collect();

        if stmt.column_count() == 0 {
            let affected = stmt.execute(params_from_iter(bound)).map_err(query_error)?;
            debug!(affected, "sql mutation");
            return Ok(QueryOutcome::Affected {
                affected_rows: affected as u64,
            });
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(bound)).map_err(query_error)?;
        let mut out = Vec::new();

        while let Some(row) = rows.next().map_err(query_error)? {
            let mut object = Map::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                let value = row.get_ref(i).map_err(query_error)?;
                object.insert(column.clone(), to_json(value));
            }
            out.push(object);
        }

        Ok(QueryOutcome::Rows(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_tables_exist() {
        let store = SqliteDatastore::in_memory().unwrap();

        for table in TABLES {
            let outcome = store
                .execute(&format!("SELECT COUNT(*) AS count FROM {}", table), &[])
                .unwrap();
            assert_eq!(outcome.first_i64("count"), Some(0));
        }
    }

    #[test]
    fn test_insert_reports_affected_rows() {
        let store = SqliteDatastore::in_memory().unwrap();

        let outcome = store
            .execute(
                "INSERT INTO whale_transactions (tx_hash, value) VALUES (?, ?)",
                &[json!("0x1"), json!(25000.5)],
            )
            .unwrap();

        assert_eq!(outcome, QueryOutcome::Affected { affected_rows: 1 });
    }

    #[test]
    fn test_rows_as_json_objects() {
        let store = SqliteDatastore::in_memory().unwrap();
        store
            .execute(
                "INSERT INTO coin_info (symbol, name, price) VALUES (?, ?, ?)",
                &[json!("ETH"), json!("Ethereum"), json!(3000)],
            )
            .unwrap();

        let outcome = store
            .execute("SELECT symbol, price, market_cap FROM coin_info", &[])
            .unwrap();

        let rows = outcome.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["symbol"], "ETH");
        assert_eq!(rows[0]["price"], json!(3000.0));
        assert!(rows[0]["market_cap"].is_null());
    }

    #[test]
    fn test_bad_sql_is_query_error() {
        let store = SqliteDatastore::in_memory().unwrap();
        let err = store.execute("SELECT * FROM missing_table", &[]).unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
    }

    #[test]
    fn test_open_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentinel.db");

        {
            let store = SqliteDatastore::open(&path).unwrap();
            store
                .execute("INSERT INTO frequent_addresses (address, transaction_count) VALUES ('0xa', 7)", &[])
                .unwrap();
        }

        let store = SqliteDatastore::open(&path).unwrap();
        let outcome = store
            .execute("SELECT transaction_count FROM frequent_addresses", &[])
            .unwrap();
        assert_eq!(outcome.first_i64("transaction_count"), Some(7));
    }
}
