//! Market snapshot types shared between the info distributor and specialists

use serde::{Deserialize, Serialize};

/// Price/volume quote for a single coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinQuote {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contract: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub volume_24h: Option<f64>,
    #[serde(default)]
    pub change_24h: Option<f64>,
}

/// On-chain transfer, values already converted to whole coins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainTx {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: f64,
    #[serde(default)]
    pub coin: Option<String>,
    #[serde(default)]
    pub block_number: u64,
    #[serde(default)]
    pub timestamp: i64,
}

/// Aggregated activity for a single address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressActivity {
    pub address: String,
    pub transaction_count: u32,
    pub first_seen: i64,
    pub last_seen: i64,
}

/// Everything the info distributor fans out on a refresh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub timestamp: f64,
    #[serde(default)]
    pub eth_price_usd: Option<f64>,
    #[serde(default)]
    pub gas_price_gwei: Option<f64>,
    #[serde(default)]
    pub coins: Vec<CoinQuote>,
    #[serde(default)]
    pub transactions: Vec<ChainTx>,
    #[serde(default)]
    pub whale_transactions: Vec<ChainTx>,
    #[serde(default)]
    pub cex_withdrawals: Vec<ChainTx>,
    #[serde(default)]
    pub contract_calls: Vec<ChainTx>,
}

impl MarketSnapshot {
    pub fn coin(&self, symbol: &str) -> Option<&CoinQuote> {
        self.coins
            .iter()
            .find(|c| c.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Contract calls addressed to `contract` (case-insensitive)
    pub fn calls_to<'a>(&'a self, contract: &'a str) -> impl Iterator<Item = &'a ChainTx> + 'a {
        self.contract_calls
            .iter()
            .filter(move |tx| tx.to.eq_ignore_ascii_case(contract))
    }
}

/// Typed payload of a `processed_data` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ProcessedData {
    CoinInfo(Vec<CoinQuote>),
    WhaleTransactions(Vec<ChainTx>),
    CexWithdrawals(Vec<ChainTx>),
    ContractActivities(Vec<ChainTx>),
    FrequentAddresses(Vec<AddressActivity>),
}

impl ProcessedData {
    pub fn len(&self) -> usize {
        match self {
            ProcessedData::CoinInfo(v) => v.len(),
            ProcessedData::WhaleTransactions(v)
            | ProcessedData::CexWithdrawals(v)
            | ProcessedData::ContractActivities(v) => v.len(),
            ProcessedData::FrequentAddresses(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(to: &str) -> ChainTx {
        ChainTx {
            hash: "0x1".to_string(),
            from: "0xa".to_string(),
            to: to.to_string(),
            value: 1.0,
            coin: None,
            block_number: 1,
            timestamp: 0,
        }
    }

    #[test]
    fn test_coin_lookup_ignores_case() {
        let snapshot = MarketSnapshot {
            coins: vec![CoinQuote {
                symbol: "ETH".to_string(),
                name: "Ethereum".to_string(),
                contract: None,
                price: 3000.0,
                market_cap: None,
                volume_24h: None,
                change_24h: None,
            }],
            ..Default::default()
        };

        assert!(snapshot.coin("eth").is_some());
        assert!(snapshot.coin("BTC").is_none());
    }

    #[test]
    fn test_calls_to_filters_by_contract() {
        let snapshot = MarketSnapshot {
            contract_calls: vec![tx("0xABC"), tx("0xdef"), tx("0xabc")],
            ..Default::default()
        };

        assert_eq!(snapshot.calls_to("0xabc").count(), 2);
    }

    #[test]
    fn test_processed_data_tagging() {
        let data = ProcessedData::CexWithdrawals(vec![tx("0x1")]);
        let value = serde_json::to_value(&data).unwrap();

        assert_eq!(value["kind"], "cex_withdrawals");
        assert!(value["data"].is_array());
        assert_eq!(data.len(), 1);
    }
}
