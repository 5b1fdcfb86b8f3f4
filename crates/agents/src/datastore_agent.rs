//! DataStoreAgent - persists processed snapshot slices and answers `sql_query`

use serde_json::{json, Value};
use shared::{
    now_epoch_secs, Agent, AgentResult, AgentRole, AddressActivity, ChainTx, CoinQuote,
    CoreError, Datastore, Envelope, Message, ProcessedData, StoreError,
};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct DataStoreAgent {
    store: Arc<dyn Datastore>,
}

impl DataStoreAgent {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// Run a query and wrap the outcome as a result
    pub fn query(&self, sql: &str, params: &[Value]) -> AgentResult {
        match self.store.execute(sql, params) {
            Ok(outcome) => AgentResult::success().with("result", outcome),
            Err(e) => {
                warn!(error = %e, "sql_query failed");
                CoreError::Store(e.to_string()).into()
            }
        }
    }

    fn store_processed(&self, data: &ProcessedData) -> AgentResult {
        let stored = match data {
            ProcessedData::CoinInfo(coins) => self.upsert_each(coins, |c| self.upsert_coin(c)),
            ProcessedData::WhaleTransactions(txs) => self.upsert_each(txs, |t| self.upsert_whale(t)),
            ProcessedData::CexWithdrawals(txs) => self.upsert_each(txs, |t| self.upsert_withdrawal(t)),
            ProcessedData::ContractActivities(txs) => self.upsert_each(txs, |t| self.upsert_contract_call(t)),
            ProcessedData::FrequentAddresses(addrs) => self.upsert_each(addrs, |a| self.upsert_address(a)),
        };

        match stored {
            Ok(count) => {
                debug!(count, "stored processed data");
                AgentResult::ok(format!("stored {} records", count)).with("stored", count)
            }
            Err(e) => CoreError::Store(e.to_string()).into(),
        }
    }

    fn upsert_each<T>(
        &self,
        items: &[T],
        upsert: impl Fn(&T) -> Result<bool, StoreError>,
    ) -> Result<usize, StoreError> {
        let mut count = 0;
        for item in items {
            if upsert(item)? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn upsert_coin(&self, coin: &CoinQuote) -> Result<bool, StoreError> {
        self.store.execute(
            "INSERT OR REPLACE INTO coin_info \
             (symbol, name, contract, price, market_cap, volume_24h, change_24h, last_updated) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            &[
                json!(coin.symbol),
                json!(coin.name),
                json!(coin.contract),
                json!(coin.price),
                json!(coin.market_cap),
                json!(coin.volume_24h),
                json!(coin.change_24h),
                json!(now_epoch_secs() as i64),
            ],
        )?;
        Ok(true)
    }

    fn upsert_whale(&self, tx: &ChainTx) -> Result<bool, StoreError> {
        if tx.hash.is_empty() {
            return Ok(false);
        }
        self.store.execute(
            "INSERT OR REPLACE INTO whale_transactions \
             (tx_hash, from_address, to_address, value, coin, block_number, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            &[
                json!(tx.hash),
                json!(tx.from),
                json!(tx.to),
                json!(tx.value),
                json!(tx.coin.as_deref().unwrap_or("ETH")),
                json!(tx.block_number),
                json!(tx.timestamp),
            ],
        )?;
        Ok(true)
    }

    fn upsert_withdrawal(&self, tx: &ChainTx) -> Result<bool, StoreError> {
        if tx.hash.is_empty() {
            return Ok(false);
        }
        self.store.execute(
            "INSERT OR REPLACE INTO cex_withdrawals \
             (tx_hash, from_address, to_address, value, timestamp) VALUES (?, ?, ?, ?, ?)",
            &[
                json!(tx.hash),
                json!(tx.from),
                json!(tx.to),
                json!(tx.value),
                json!(tx.timestamp),
            ],
        )?;
        Ok(true)
    }

    fn upsert_contract_call(&self, tx: &ChainTx) -> Result<bool, StoreError> {
        if tx.hash.is_empty() {
            return Ok(false);
        }
        self.store.execute(
            "INSERT OR REPLACE INTO contract_activities \
             (tx_hash, contract_address, from_address, value, timestamp, block_number) \
             VALUES (?, ?, ?, ?, ?, ?)",
            &[
                json!(tx.hash),
                json!(tx.to),
                json!(tx.from),
                json!(tx.value),
                json!(tx.timestamp),
                json!(tx.block_number),
            ],
        )?;
        Ok(true)
    }

    /// `first_seen` survives updates
    fn upsert_address(&self, activity: &AddressActivity) -> Result<bool, StoreError> {
        if activity.address.is_empty() {
            return Ok(false);
        }
        self.store.execute(
            "INSERT INTO frequent_addresses (address, transaction_count, first_seen, last_seen) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(address) DO UPDATE SET \
             transaction_count = excluded.transaction_count, last_seen = excluded.last_seen",
            &[
                json!(activity.address),
                json!(activity.transaction_count),
                json!(activity.first_seen),
                json!(activity.last_seen),
            ],
        )?;
        Ok(true)
    }
}

impl Agent for DataStoreAgent {
    fn name(&self) -> &str {
        AgentRole::DataStore.agent_name()
    }

    fn role(&self) -> AgentRole {
        AgentRole::DataStore
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.message() {
            Message::ProcessedData(data) => self.store_processed(data),
            Message::SqlQuery { query, params } => {
                if query.trim().is_empty() {
                    return CoreError::validation("empty SQL query").into();
                }
                self.query(query, params)
            }
            other => AgentResult::unsupported(other.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteDatastore;

    fn agent() -> DataStoreAgent {
        DataStoreAgent::new(Arc::new(SqliteDatastore::in_memory().unwrap()))
    }

    fn tx(hash: &str, value: f64) -> ChainTx {
        ChainTx {
            hash: hash.to_string(),
            from: "0xa".to_string(),
            to: "0xb".to_string(),
            value,
            coin: None,
            block_number: 1,
            timestamp: 100,
        }
    }

    #[test]
    fn test_whale_transactions_are_stored() {
        let agent = agent();

        let result = agent.process(Message::ProcessedData(ProcessedData::WhaleTransactions(vec![
            tx("0x1", 20000.0),
            tx("", 1.0),
        ])));
        assert!(result.is_success());
        assert_eq!(result.get("stored"), Some(&json!(1)));

        let result = agent.process(Message::SqlQuery {
            query: "SELECT coin FROM whale_transactions".to_string(),
            params: vec![],
        });
        assert_eq!(result.get("result").unwrap()[0]["coin"], "ETH");
    }

    #[test]
    fn test_frequent_address_keeps_first_seen() {
        let agent = agent();
        let activity = |count, first, last| AddressActivity {
            address: "0xabc".to_string(),
            transaction_count: count,
            first_seen: first,
            last_seen: last,
        };

        agent.process(Message::ProcessedData(ProcessedData::FrequentAddresses(vec![activity(5, 10, 20)])));
        agent.process(Message::ProcessedData(ProcessedData::FrequentAddresses(vec![activity(9, 50, 60)])));

        let result = agent.query("SELECT * FROM frequent_addresses", &[]);
        let row = &result.get("result").unwrap()[0];
        assert_eq!(row["transaction_count"], 9);
        assert_eq!(row["first_seen"], 10);
        assert_eq!(row["last_seen"], 60);
    }

    #[test]
    fn test_sql_error_is_structured() {
        let result = agent().process(Message::SqlQuery {
            query: "SELECT * FROM nowhere".to_string(),
            params: vec![],
        });

        assert!(result.is_error());
        assert_eq!(result.get("errorKind"), Some(&json!("store_error")));
    }

    #[test]
    fn test_mutation_reports_affected_rows() {
        let result = agent().process(Message::SqlQuery {
            query: "INSERT INTO cex_withdrawals (tx_hash, value) VALUES (?, ?)".to_string(),
            params: vec![json!("0x9"), json!(5.0)],
        });

        assert!(result.is_success());
        assert_eq!(result.get("result"), Some(&json!({"affectedRows": 1})));
    }

    #[test]
    fn test_unsupported_type() {
        let result = agent().process(Message::ListAlarms {});
        assert!(result.is_error());
    }
}
