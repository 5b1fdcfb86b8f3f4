use super::SpecialistCore;
use shared::{
    Agent, AgentHandle, AgentResult, AgentRole, CoinQuote, Envelope, MarketSnapshot, Message,
    Oracle, ProcessedData, Tap,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Coin quotes and market overview
pub struct CoinInfoAgent {
    core: SpecialistCore,
    quotes: Mutex<HashMap<String, CoinQuote>>,
}

impl CoinInfoAgent {
    pub fn new(oracle: Arc<dyn Oracle>, tap: Option<Arc<dyn Tap>>) -> Self {
        Self {
            core: SpecialistCore::new(AgentRole::CoinInfo, oracle, tap),
            quotes: Mutex::new(HashMap::new()),
        }
    }

    pub fn wire_datastore(&self, datastore: &AgentHandle) -> shared::Result<()> {
        self.core.wire_datastore(datastore)
    }

    fn on_update(&self, snapshot: &MarketSnapshot) -> AgentResult {
        self.core.remember(snapshot);
        if let Ok(mut quotes) = self.quotes.lock() {
            for coin in &snapshot.coins {
                quotes.insert(coin.symbol.to_ascii_uppercase(), coin.clone());
            }
        }
        self.core
            .persist(ProcessedData::CoinInfo(snapshot.coins.clone()));
        AgentResult::ok("coin info updated").with("coins", snapshot.coins.len())
    }

    fn coin_info(&self, coin: &str) -> AgentResult {
        let key = coin.trim().to_ascii_uppercase();
        let quote = self
            .quotes
            .lock()
            .ok()
            .and_then(|quotes| quotes.get(&key).cloned());

        match quote {
            Some(quote) => AgentResult::success().with("coin", &key).with("coinInfo", quote),
            None => AgentResult::error(format!("no information for coin {}", key)),
        }
    }

    fn market_analysis(&self) -> AgentResult {
        let snapshot = match self.core.latest() {
            Ok(snapshot) => snapshot,
            Err(e) => return e.into(),
        };

        let coins: Vec<String> = snapshot
            .coins
            .iter()
            .map(|c| format!("{} ${:.2} ({:+.2}%)", c.symbol, c.price, c.change_24h.unwrap_or_default()))
            .collect();
        let prompt = format!(
            "Analyze the current crypto market.\n\
             ETH price (USD): {:?}\nGas price (gwei): {:?}\nCoins: {}\n\
             Describe the overall trend, ETH performance, notable coins and network congestion.\n\
             Return the analysis as <o>analysis</o>.",
            snapshot.eth_price_usd,
            snapshot.gas_price_gwei,
            coins.join(", ")
        );

        match self.core.ask(&prompt) {
            Ok(analysis) => AgentResult::success()
                .with("analysis", analysis)
                .with("coins", snapshot.coins.len()),
            Err(e) => e.into(),
        }
    }
}

impl Agent for CoinInfoAgent {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn role(&self) -> AgentRole {
        AgentRole::CoinInfo
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.message() {
            Message::InfoUpdate(snapshot) => self.on_update(snapshot),
            Message::GetCoinInfo { coin } => self.coin_info(coin),
            Message::RequestMarketAnalysis {} => self.market_analysis(),
            other => AgentResult::unsupported(other.type_name()),
        }
    }
}
