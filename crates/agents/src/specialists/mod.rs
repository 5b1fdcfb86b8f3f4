//! Specialist agents
//!
//! Each specialist caches the latest snapshot it received through
//! `info_update`, persists its slice of it through the datastore agent and
//! answers analysis requests with help from the oracle.

mod cex_withdraw;
mod coin_info;
mod contract;
mod tx_frequency;
mod whale;

pub use cex_withdraw::CexWithdrawAgent;
pub use coin_info::CoinInfoAgent;
pub use contract::{ContractAgent, MonitoredContract};
pub use tx_frequency::{TxFrequencyAgent, DEFAULT_FREQUENCY_THRESHOLD};
pub use whale::WhaleAgent;

use shared::{
    extract_tagged, AgentHandle, AgentRole, CoreError, MarketSnapshot, Message, Oracle, Outbox,
    Peer, ProcessedData, Tap,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// State and plumbing shared by every specialist
pub(crate) struct SpecialistCore {
    outbox: Outbox,
    oracle: Arc<dyn Oracle>,
    datastore: Peer,
    latest: Mutex<Option<MarketSnapshot>>,
}

impl SpecialistCore {
    pub(crate) fn new(role: AgentRole, oracle: Arc<dyn Oracle>, tap: Option<Arc<dyn Tap>>) -> Self {
        Self {
            outbox: Outbox::new(role.agent_name(), tap),
            oracle,
            datastore: Peer::new(),
            latest: Mutex::new(None),
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.outbox.sender()
    }

    pub(crate) fn wire_datastore(&self, datastore: &AgentHandle) -> shared::Result<()> {
        self.datastore.wire(datastore)
    }

    pub(crate) fn remember(&self, snapshot: &MarketSnapshot) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(snapshot.clone());
        }
    }

    /// Latest snapshot, or an error when none has arrived yet
    pub(crate) fn latest(&self) -> shared::Result<MarketSnapshot> {
        self.latest
            .lock()
            .ok()
            .and_then(|latest| latest.clone())
            .ok_or_else(|| CoreError::validation("no market snapshot available yet"))
    }

    /// Forward a processed slice to the datastore agent, if one is wired
    pub(crate) fn persist(&self, data: ProcessedData) {
        if data.is_empty() {
            return;
        }
        match self.datastore.get() {
            Some(datastore) => {
                let result = self.outbox.send(&datastore, Message::ProcessedData(data));
                if result.is_error() {
                    warn!(agent = self.name(), error = result.message_text(), "Persisting processed data failed");
                }
            }
            None => debug!(agent = self.name(), "No datastore wired, skipping persistence"),
        }
    }

    /// Ask the oracle and unwrap the `<o>` block
    pub(crate) fn ask(&self, prompt: &str) -> shared::Result<String> {
        self.oracle
            .complete(prompt)
            .map(|reply| extract_tagged(&reply, "o"))
            .map_err(|e| CoreError::OracleDegraded(e.to_string()))
    }
}
