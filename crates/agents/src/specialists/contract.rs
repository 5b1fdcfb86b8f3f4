use super::SpecialistCore;
use crate::feed::UNISWAP_V2_ROUTER;
use serde::Serialize;
use shared::{
    Agent, AgentHandle, AgentResult, AgentRole, ChainTx, CoreError, Envelope, MarketSnapshot,
    Message, Oracle, ProcessedData, Tap,
};
use std::sync::{Arc, Mutex};

/// A contract on the watch list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoredContract {
    pub address: String,
    pub label: String,
}

/// Calls into monitored contracts
pub struct ContractAgent {
    core: SpecialistCore,
    monitored: Mutex<Vec<MonitoredContract>>,
}

impl ContractAgent {
    pub fn new(oracle: Arc<dyn Oracle>, tap: Option<Arc<dyn Tap>>) -> Self {
        Self {
            core: SpecialistCore::new(AgentRole::Contract, oracle, tap),
            monitored: Mutex::new(vec![MonitoredContract {
                address: UNISWAP_V2_ROUTER.to_string(),
                label: "Uniswap V2 Router".to_string(),
            }]),
        }
    }

    /// Agent with an empty watch list
    pub fn unmonitored(oracle: Arc<dyn Oracle>, tap: Option<Arc<dyn Tap>>) -> Self {
        let agent = Self::new(oracle, tap);
        if let Ok(mut monitored) = agent.monitored.lock() {
            monitored.clear();
        }
        agent
    }

    pub fn wire_datastore(&self, datastore: &AgentHandle) -> shared::Result<()> {
        self.core.wire_datastore(datastore)
    }

    pub fn monitored(&self) -> Vec<MonitoredContract> {
        self.monitored.lock().map(|m| m.clone()).unwrap_or_default()
    }

    fn on_update(&self, snapshot: &MarketSnapshot) -> AgentResult {
        self.core.remember(snapshot);
        let calls: Vec<ChainTx> = self
            .monitored()
            .iter()
            .flat_map(|contract| snapshot.calls_to(&contract.address).cloned().collect::<Vec<_>>())
            .collect();
        let count = calls.len();
        self.core.persist(ProcessedData::ContractActivities(calls));
        AgentResult::ok("contract activity updated").with("interactions", count)
    }

    fn add(&self, address: &str, label: Option<&str>) -> AgentResult {
        let address = address.trim().to_ascii_lowercase();
        if address.is_empty() {
            return CoreError::validation("contract address is required").into();
        }
        let label = label.unwrap_or("unlabeled").to_string();

        if let Ok(mut monitored) = self.monitored.lock() {
            match monitored.iter_mut().find(|c| c.address == address) {
                Some(existing) => existing.label = label,
                None => monitored.push(MonitoredContract { address, label }),
            }
        }
        AgentResult::ok("contract added to watch list").with("monitoredContracts", self.monitored())
    }

    fn remove(&self, address: &str) -> AgentResult {
        let address = address.trim().to_ascii_lowercase();
        let removed = self
            .monitored
            .lock()
            .map(|mut monitored| {
                let before = monitored.len();
                monitored.retain(|c| c.address != address);
                monitored.len() != before
            })
            .unwrap_or(false);

        if removed {
            AgentResult::ok("contract removed from watch list")
        } else {
            AgentResult::error(format!("contract {} is not monitored", address))
        }
    }

    fn analyze(&self, address: Option<&str>) -> AgentResult {
        let snapshot = match self.core.latest() {
            Ok(snapshot) => snapshot,
            Err(e) => return e.into(),
        };

        let address = match address.map(str::trim).filter(|a| !a.is_empty()) {
            Some(address) => address.to_ascii_lowercase(),
            None => match self.monitored().first() {
                Some(contract) => contract.address.clone(),
                None => {
                    return CoreError::validation(
                        "no contract address given and the watch list is empty",
                    )
                    .into()
                }
            },
        };

        let calls: Vec<&ChainTx> = snapshot.calls_to(&address).collect();
        if calls.is_empty() {
            return AgentResult::warning(format!("no recent interactions with contract {}", address))
                .with("address", &address);
        }

        let senders: Vec<&str> = calls.iter().map(|tx| tx.from.as_str()).collect();
        let volume: f64 = calls.iter().map(|tx| tx.value).sum();
        let prompt = format!(
            "Analyze activity on contract {}.\nInteractions: {}\nSenders: {}\nTotal value: {} ETH\n\
             Describe what the contract is likely used for, the usage pattern and anything unusual.\n\
             Return the analysis as <o>analysis</o>.",
            address,
            calls.len(),
            senders.join(", "),
            volume
        );

        match self.core.ask(&prompt) {
            Ok(analysis) => AgentResult::success()
                .with("address", &address)
                .with("interactions", calls.len())
                .with("analysis", analysis),
            Err(e) => e.into(),
        }
    }
}

impl Agent for ContractAgent {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Contract
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.message() {
            Message::InfoUpdate(snapshot) => self.on_update(snapshot),
            Message::AddContract { address, label } => self.add(address, label.as_deref()),
            Message::RemoveContract { address } => self.remove(address),
            Message::RequestContractAnalysis { address } => self.analyze(address.as_deref()),
            other => AgentResult::unsupported(other.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specialists::testing;
    use serde_json::json;
    use shared::Status;

    #[test]
    fn test_analysis_falls_back_to_first_monitored() {
        let agent = ContractAgent::new(testing::oracle(), None);
        agent.process(Message::InfoUpdate(testing::snapshot()));

        let result = agent.process(Message::RequestContractAnalysis { address: None });

        assert!(result.is_success());
        assert_eq!(result.get("address"), Some(&json!(UNISWAP_V2_ROUTER)));
        assert_eq!(result.get("interactions"), Some(&json!(2)));
    }

    #[test]
    fn test_analysis_with_empty_watch_list_is_error() {
        let agent = ContractAgent::unmonitored(testing::oracle(), None);
        agent.process(Message::InfoUpdate(testing::snapshot()));

        let result = agent.process(Message::RequestContractAnalysis { address: None });
        assert!(result.is_error());
        assert_eq!(result.get("errorKind"), Some(&json!("validation_error")));
    }

    #[test]
    fn test_quiet_contract_is_warning() {
        let agent = ContractAgent::new(testing::oracle(), None);
        agent.process(Message::InfoUpdate(testing::snapshot()));

        let result = agent.process(Message::RequestContractAnalysis {
            address: Some("0xdead".to_string()),
        });
        assert_eq!(result.status, Status::Warning);
    }

    #[test]
    fn test_add_and_remove() {
        let agent = ContractAgent::unmonitored(testing::oracle(), None);

        agent.process(Message::AddContract {
            address: "0xABC".to_string(),
            label: Some("token".to_string()),
        });
        assert_eq!(agent.monitored()[0].address, "0xabc");

        assert!(agent.process(Message::RemoveContract { address: "0xabc".to_string() }).is_success());
        assert!(agent.process(Message::RemoveContract { address: "0xabc".to_string() }).is_error());
    }
}
