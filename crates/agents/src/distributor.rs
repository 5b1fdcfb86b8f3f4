//! InfoDistributor - pulls a market snapshot and fans it out to subscribers

use crate::feed::MarketFeed;
use serde_json::json;
use shared::{
    Agent, AgentHandle, AgentResult, AgentRole, Envelope, Message, Outbox, PeerSet, Tap,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct InfoDistributor {
    outbox: Outbox,
    feed: Arc<dyn MarketFeed>,
    subscribers: PeerSet,
}

impl InfoDistributor {
    pub fn new(feed: Arc<dyn MarketFeed>, tap: Option<Arc<dyn Tap>>) -> Self {
        Self {
            outbox: Outbox::new(AgentRole::InfoDistributor.agent_name(), tap),
            feed,
            subscribers: PeerSet::new(),
        }
    }

    /// Wire the agents that receive `info_update`
    pub fn wire_subscribers(&self, subscribers: &[AgentHandle]) -> shared::Result<()> {
        self.subscribers.wire(subscribers)
    }

    fn refresh(&self) -> AgentResult {
        let api = self.feed.api_name().to_string();
        let endpoint = self.feed.endpoint().to_string();

        self.outbox.api_call(&api, &endpoint, &json!({}));
        let snapshot = match self.feed.fetch() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.outbox
                    .api_response(&api, &endpoint, &json!({ "error": e.to_string() }));
                warn!(error = %e, "Market feed failed");
                return AgentResult::error(format!("info refresh failed: {}", e))
                    .with("errorKind", "feed_error");
            }
        };
        self.outbox.api_response(
            &api,
            &endpoint,
            &json!({
                "coins": snapshot.coins.len(),
                "transactions": snapshot.transactions.len(),
                "whaleTransactions": snapshot.whale_transactions.len(),
                "cexWithdrawals": snapshot.cex_withdrawals.len(),
                "contractCalls": snapshot.contract_calls.len(),
            }),
        );

        let mut delivered = Vec::new();
        let mut failed = Vec::new();
        for subscriber in self.subscribers.members() {
            let result = self
                .outbox
                .send(&subscriber, Message::InfoUpdate(snapshot.clone()));
            if result.is_error() {
                warn!(
                    subscriber = subscriber.name(),
                    error = result.message_text(),
                    "Subscriber rejected info update"
                );
                failed.push(subscriber.name().to_string());
            } else {
                delivered.push(subscriber.name().to_string());
            }
        }

        info!(delivered = delivered.len(), failed = failed.len(), "Info update distributed");
        AgentResult::ok("info update distributed")
            .with("timestamp", snapshot.timestamp)
            .with("delivered", delivered)
            .with("failed", failed)
    }
}

impl Agent for InfoDistributor {
    fn name(&self) -> &str {
        self.outbox.sender()
    }

    fn role(&self) -> AgentRole {
        AgentRole::InfoDistributor
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.message() {
            Message::RequestInfoUpdate {} => self.refresh(),
            other => AgentResult::unsupported(other.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FeedError, StaticFeed};
    use interceptor::EventBus;
    use shared::MarketSnapshot;
    use std::sync::Mutex;

    struct BrokenFeed;

    impl MarketFeed for BrokenFeed {
        fn endpoint(&self) -> &str {
            "broken"
        }

        fn fetch(&self) -> Result<MarketSnapshot, FeedError> {
            Err(FeedError::Request("connection refused".to_string()))
        }
    }

    /// Counts updates; optionally rejects them
    struct Subscriber {
        role: AgentRole,
        reject: bool,
        seen: Mutex<usize>,
    }

    impl Agent for Subscriber {
        fn name(&self) -> &str {
            self.role.agent_name()
        }

        fn role(&self) -> AgentRole {
            self.role
        }

        fn receive(&self, envelope: Envelope) -> AgentResult {
            match envelope.message() {
                Message::InfoUpdate(_) if self.reject => AgentResult::error("boom"),
                Message::InfoUpdate(_) => {
                    *self.seen.lock().unwrap() += 1;
                    AgentResult::success()
                }
                other => AgentResult::unsupported(other.type_name()),
            }
        }
    }

    fn subscriber(role: AgentRole, reject: bool) -> Arc<Subscriber> {
        Arc::new(Subscriber {
            role,
            reject,
            seen: Mutex::new(0),
        })
    }

    #[test]
    fn test_refresh_fans_out_and_tolerates_failures() {
        let distributor = InfoDistributor::new(Arc::new(StaticFeed::sample()), None);
        let good = subscriber(AgentRole::Whale, false);
        let bad = subscriber(AgentRole::Contract, true);
        distributor
            .wire_subscribers(&[good.clone() as AgentHandle, bad.clone() as AgentHandle])
            .unwrap();

        let result = distributor.process(Message::RequestInfoUpdate {});

        assert!(result.is_success());
        assert_eq!(*good.seen.lock().unwrap(), 1);
        assert_eq!(result.get("failed"), Some(&json!(["ContractAgent"])));
    }

    #[test]
    fn test_feed_failure_is_error() {
        let distributor = InfoDistributor::new(Arc::new(BrokenFeed), None);
        let result = distributor.process(Message::RequestInfoUpdate {});

        assert!(result.is_error());
        assert!(result.message_text().contains("connection refused"));
    }

    #[test]
    fn test_feed_call_is_recorded() {
        let bus = Arc::new(EventBus::in_memory(10));
        let distributor =
            InfoDistributor::new(Arc::new(StaticFeed::sample()), Some(bus.clone() as Arc<dyn Tap>));

        distributor.process(Message::RequestInfoUpdate {});

        let calls = bus.api_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].source, "InfoDistributor");
        assert_eq!(calls[0].target, "BlockchainAPI");
        assert_eq!(calls[1].source, "BlockchainAPI");
    }

    #[test]
    fn test_unsupported_type() {
        let distributor = InfoDistributor::new(Arc::new(StaticFeed::sample()), None);
        assert!(distributor.process(Message::ListAlarms {}).is_error());
    }
}
