//! Market feed - the blockchain/market API boundary

use shared::{now_epoch_secs, ChainTx, CoinQuote, MarketSnapshot};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Request(String),

    #[error("feed returned unusable data: {0}")]
    Decode(String),
}

/// Source of market snapshots
pub trait MarketFeed: Send + Sync {
    /// Name recorded as the API target on the event bus
    fn api_name(&self) -> &str {
        "BlockchainAPI"
    }

    fn endpoint(&self) -> &str;

    fn fetch(&self) -> Result<MarketSnapshot, FeedError>;
}

/// Uniswap V2 router, monitored by default
pub const UNISWAP_V2_ROUTER: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";

const BINANCE_HOT_WALLET: &str = "0x28c6c06298d514db089934071355e5743bf21d60";

/// Feed that returns a fixed snapshot, re-stamped on each fetch
#[derive(Debug, Clone)]
pub struct StaticFeed {
    snapshot: MarketSnapshot,
}

impl StaticFeed {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self { snapshot }
    }

    /// Offline sample data exercising every specialist
    pub fn sample() -> Self {
        Self::new(sample_snapshot())
    }
}

impl MarketFeed for StaticFeed {
    fn endpoint(&self) -> &str {
        "static/snapshot"
    }

    fn fetch(&self) -> Result<MarketSnapshot, FeedError> {
        let mut snapshot = self.snapshot.clone();
        snapshot.timestamp = now_epoch_secs();
        Ok(snapshot)
    }
}

fn quote(symbol: &str, name: &str, price: f64, change: f64) -> CoinQuote {
    CoinQuote {
        symbol: symbol.to_string(),
        name: name.to_string(),
        contract: None,
        price,
        market_cap: None,
        volume_24h: None,
        change_24h: Some(change),
    }
}

fn tx(n: u64, from: &str, to: &str, value: f64) -> ChainTx {
    ChainTx {
        hash: format!("0x{:064x}", n),
        from: from.to_string(),
        to: to.to_string(),
        value,
        coin: Some("ETH".to_string()),
        block_number: 19_000_000 + n,
        timestamp: 1_700_000_000 + n as i64 * 12,
    }
}

fn sample_snapshot() -> MarketSnapshot {
    let busy = "0x00000000000000000000000000000000000000b5";
    let transactions = (0..8)
        .map(|n| {
            let peer = format!("0x{:040x}", 0xa0 + n);
            if n % 2 == 0 {
                tx(n, busy, &peer, 0.5)
            } else {
                tx(n, &peer, busy, 0.25)
            }
        })
        .collect();

    MarketSnapshot {
        timestamp: 0.0,
        eth_price_usd: Some(3120.55),
        gas_price_gwei: Some(18.0),
        coins: vec![
            quote("ETH", "Ethereum", 3120.55, 2.1),
            quote("USDT", "Tether", 1.0, 0.0),
            quote("USDC", "USD Coin", 1.0, 0.01),
        ],
        transactions,
        whale_transactions: vec![
            tx(100, "0x00000000000000000000000000000000000000e1", BINANCE_HOT_WALLET, 12_500.0),
            tx(101, BINANCE_HOT_WALLET, "0x00000000000000000000000000000000000000e2", 48_000.0),
        ],
        cex_withdrawals: vec![tx(200, BINANCE_HOT_WALLET, "0x00000000000000000000000000000000000000c1", 950.0)],
        contract_calls: vec![
            tx(300, "0x00000000000000000000000000000000000000d1", UNISWAP_V2_ROUTER, 1.2),
            tx(301, "0x00000000000000000000000000000000000000d2", UNISWAP_V2_ROUTER, 0.0),
        ],
    }
}
