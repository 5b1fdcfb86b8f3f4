use super::SpecialistCore;
use shared::{
    Agent, AgentHandle, AgentResult, AgentRole, ChainTx, Envelope, MarketSnapshot, Message, Oracle,
    ProcessedData, Tap,
};
use std::sync::{Arc, Mutex};

const SAMPLE_SIZE: usize = 5;

/// Large transfers of tracked coins
pub struct WhaleAgent {
    core: SpecialistCore,
    tracked: Mutex<Vec<String>>,
}

fn coin_of(tx: &ChainTx) -> &str {
    tx.coin.as_deref().unwrap_or("ETH")
}

impl WhaleAgent {
    pub fn new(oracle: Arc<dyn Oracle>, tap: Option<Arc<dyn Tap>>) -> Self {
        Self {
            core: SpecialistCore::new(AgentRole::Whale, oracle, tap),
            tracked: Mutex::new(vec!["ETH".to_string()]),
        }
    }

    pub fn wire_datastore(&self, datastore: &AgentHandle) -> shared::Result<()> {
        self.core.wire_datastore(datastore)
    }

    pub fn tracked_coins(&self) -> Vec<String> {
        self.tracked.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn is_tracked(&self, coin: &str) -> bool {
        self.tracked_coins()
            .iter()
            .any(|c| c.eq_ignore_ascii_case(coin))
    }

    fn on_update(&self, snapshot: &MarketSnapshot) -> AgentResult {
        self.core.remember(snapshot);
        let relevant: Vec<ChainTx> = snapshot
            .whale_transactions
            .iter()
            .filter(|tx| self.is_tracked(coin_of(tx)))
            .cloned()
            .collect();
        let count = relevant.len();
        self.core.persist(ProcessedData::WhaleTransactions(relevant));
        AgentResult::ok("whale activity updated").with("whaleTransactions", count)
    }

    fn track(&self, coin: &str) -> AgentResult {
        let coin = coin.trim().to_ascii_uppercase();
        if coin.is_empty() {
            return shared::CoreError::validation("coin symbol is required").into();
        }
        if let Ok(mut tracked) = self.tracked.lock() {
            if !tracked.contains(&coin) {
                tracked.push(coin.clone());
            }
        }
        AgentResult::ok(format!("now tracking {}", coin)).with("trackedCoins", self.tracked_coins())
    }

    fn analyze(&self, coin: Option<&str>) -> AgentResult {
        let snapshot = match self.core.latest() {
            Ok(snapshot) => snapshot,
            Err(e) => return e.into(),
        };
        let coin = coin
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .or_else(|| self.tracked_coins().into_iter().next())
            .unwrap_or_else(|| "ETH".to_string());

        let sample: Vec<&ChainTx> = snapshot
            .whale_transactions
            .iter()
            .filter(|tx| coin_of(tx).eq_ignore_ascii_case(&coin))
            .take(SAMPLE_SIZE)
            .collect();
        if sample.is_empty() {
            return AgentResult::warning(format!("no whale transactions detected for {}", coin))
                .with("coin", &coin);
        }

        let details: Vec<String> = sample
            .iter()
            .map(|tx| format!("{} -> {}: {} {} ({})", tx.from, tx.to, tx.value, coin, tx.hash))
            .collect();
        let prompt = format!(
            "Analyze these {coin} whale transactions and infer intent.\n{}\n\
             What trend do they indicate, are the addresses known entities, what short-term \
             price impact is likely, and is this accumulation or distribution?\n\
             Return the analysis as <o>analysis</o>.",
            details.join("\n")
        );

        match self.core.ask(&prompt) {
            Ok(analysis) => AgentResult::success()
                .with("coin", &coin)
                .with("transactions", sample.len())
                .with("analysis", analysis),
            Err(e) => e.into(),
        }
    }
}

impl Agent for WhaleAgent {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Whale
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.message() {
            Message::InfoUpdate(snapshot) => self.on_update(snapshot),
            Message::TrackCoin { coin } => self.track(coin),
            Message::RequestWhaleAnalysis { coin } => self.analyze(coin.as_deref()),
            other => AgentResult::unsupported(other.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specialists::testing;
    use serde_json::json;
    use shared::{Datastore, Status};

    #[test]
    fn test_analysis_defaults_to_first_tracked_coin() {
        let agent = WhaleAgent::new(testing::oracle(), None);
        agent.process(Message::InfoUpdate(testing::snapshot()));

        let result = agent.process(Message::RequestWhaleAnalysis { coin: None });

        assert!(result.is_success());
        assert_eq!(result.get("coin"), Some(&json!("ETH")));
        assert_eq!(result.get("transactions"), Some(&json!(2)));
    }

    #[test]
    fn test_no_matching_transactions_is_warning() {
        let agent = WhaleAgent::new(testing::oracle(), None);
        agent.process(Message::InfoUpdate(testing::snapshot()));

        let result = agent.process(Message::RequestWhaleAnalysis { coin: Some("BTC".to_string()) });
        assert_eq!(result.status, Status::Warning);
    }

    #[test]
    fn test_analysis_without_snapshot_is_error() {
        let agent = WhaleAgent::new(testing::oracle(), None);
        assert!(agent.process(Message::RequestWhaleAnalysis { coin: None }).is_error());
    }

    #[test]
    fn test_track_coin_is_idempotent() {
        let agent = WhaleAgent::new(testing::oracle(), None);
        agent.process(Message::TrackCoin { coin: "usdt".to_string() });
        agent.process(Message::TrackCoin { coin: "USDT".to_string() });

        assert_eq!(agent.tracked_coins(), vec!["ETH".to_string(), "USDT".to_string()]);
    }

    #[test]
    fn test_update_persists_whale_transactions() {
        let (datastore, store) = testing::datastore();
        let agent = WhaleAgent::new(testing::oracle(), None);
        agent.wire_datastore(&datastore).unwrap();

        agent.process(Message::InfoUpdate(testing::snapshot()));

        let outcome = store
            .execute("SELECT COUNT(*) AS count FROM whale_transactions WHERE value > 10000", &[])
            .unwrap();
        assert_eq!(outcome.first_i64("count"), Some(2));
    }
}
