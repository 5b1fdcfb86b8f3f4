use super::SpecialistCore;
use shared::{
    Agent, AgentHandle, AgentResult, AgentRole, Envelope, MarketSnapshot, Message, Oracle,
    ProcessedData, Tap,
};
use std::sync::Arc;

/// Withdrawals from centralized exchange hot wallets
pub struct CexWithdrawAgent {
    core: SpecialistCore,
}

impl CexWithdrawAgent {
    pub fn new(oracle: Arc<dyn Oracle>, tap: Option<Arc<dyn Tap>>) -> Self {
        Self {
            core: SpecialistCore::new(AgentRole::CexWithdraw, oracle, tap),
        }
    }

    pub fn wire_datastore(&self, datastore: &AgentHandle) -> shared::Result<()> {
        self.core.wire_datastore(datastore)
    }

    fn on_update(&self, snapshot: &MarketSnapshot) -> AgentResult {
        self.core.remember(snapshot);
        self.core
            .persist(ProcessedData::CexWithdrawals(snapshot.cex_withdrawals.clone()));
        AgentResult::ok("withdrawals updated").with("withdrawals", snapshot.cex_withdrawals.len())
    }

    fn analyze(&self) -> AgentResult {
        let snapshot = match self.core.latest() {
            Ok(snapshot) => snapshot,
            Err(e) => return e.into(),
        };
        let withdrawals = &snapshot.cex_withdrawals;
        if withdrawals.is_empty() {
            return AgentResult::warning("no exchange withdrawals detected");
        }

        let total: f64 = withdrawals.iter().map(|tx| tx.value).sum();
        let largest = withdrawals
            .iter()
            .map(|tx| tx.value)
            .fold(0.0_f64, f64::max);
        let prompt = format!(
            "Analyze these centralized exchange withdrawals.\n\
             Count: {}\nTotal: {} ETH\nLargest: {} ETH\n\
             What do they suggest about market sentiment and holder behavior?\n\
             Return the analysis as <o>analysis</o>.",
            withdrawals.len(),
            total,
            largest
        );

        match self.core.ask(&prompt) {
            Ok(analysis) => AgentResult::success()
                .with("withdrawals", withdrawals.len())
                .with("totalValue", total)
                .with("analysis", analysis),
            Err(e) => e.into(),
        }
    }
}

impl Agent for CexWithdrawAgent {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn role(&self) -> AgentRole {
        AgentRole::CexWithdraw
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.message() {
            Message::InfoUpdate(snapshot) => self.on_update(snapshot),
            Message::RequestWithdrawAnalysis {} => self.analyze(),
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
    fn test_analysis_after_update() {
        let agent = CexWithdrawAgent::new(testing::oracle(), None);
        agent.process(Message::InfoUpdate(testing::snapshot()));

        let result = agent.process(Message::RequestWithdrawAnalysis {});
        assert!(result.is_success());
        assert_eq!(result.get("withdrawals"), Some(&json!(1)));
    }

    #[test]
    fn test_empty_slice_is_warning() {
        let agent = CexWithdrawAgent::new(testing::oracle(), None);
        let mut snapshot = testing::snapshot();
        snapshot.cex_withdrawals.clear();
        agent.process(Message::InfoUpdate(snapshot));

        let result = agent.process(Message::RequestWithdrawAnalysis {});
        assert_eq!(result.status, Status::Warning);
    }

    #[test]
    fn test_update_persists_withdrawals() {
        let (datastore, store) = testing::datastore();
        let agent = CexWithdrawAgent::new(testing::oracle(), None);
        agent.wire_datastore(&datastore).unwrap();

        agent.process(Message::InfoUpdate(testing::snapshot()));

        let outcome = store.execute("SELECT COUNT(*) AS count FROM cex_withdrawals", &[]).unwrap();
        assert_eq!(outcome.first_i64("count"), Some(1));
    }
}
