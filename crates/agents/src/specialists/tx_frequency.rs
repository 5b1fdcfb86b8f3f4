use super::SpecialistCore;
use shared::{
    Agent, AgentHandle, AgentResult, AgentRole, AddressActivity, CoreError, Envelope,
    MarketSnapshot, Message, Oracle, ProcessedData, Tap,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const DEFAULT_FREQUENCY_THRESHOLD: u32 = 5;

const SAMPLE_SIZE: usize = 3;

#[derive(Default)]
struct Ledger {
    seen: HashSet<String>,
    activity: HashMap<String, AddressActivity>,
}

impl Ledger {
    fn touch(&mut self, address: &str, at: i64) {
        if address.is_empty() {
            return;
        }
        let entry = self
            .activity
            .entry(address.to_string())
            .or_insert_with(|| AddressActivity {
                address: address.to_string(),
                transaction_count: 0,
                first_seen: at,
                last_seen: at,
            });
        entry.transaction_count += 1;
        entry.first_seen = entry.first_seen.min(at);
        entry.last_seen = entry.last_seen.max(at);
    }

    /// Addresses at or above `threshold`, busiest first
    fn frequent(&self, threshold: u32) -> Vec<AddressActivity> {
        let mut frequent: Vec<AddressActivity> = self
            .activity
            .values()
            .filter(|a| a.transaction_count >= threshold)
            .cloned()
            .collect();
        frequent.sort_by(|a, b| {
            b.transaction_count
                .cmp(&a.transaction_count)
                .then_with(|| a.address.cmp(&b.address))
        });
        frequent
    }
}

/// Per-address transaction counts across snapshots
pub struct TxFrequencyAgent {
    core: SpecialistCore,
    threshold: Mutex<u32>,
    ledger: Mutex<Ledger>,
}

impl TxFrequencyAgent {
    pub fn new(oracle: Arc<dyn Oracle>, tap: Option<Arc<dyn Tap>>) -> Self {
        Self {
            core: SpecialistCore::new(AgentRole::TxFrequency, oracle, tap),
            threshold: Mutex::new(DEFAULT_FREQUENCY_THRESHOLD),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn wire_datastore(&self, datastore: &AgentHandle) -> shared::Result<()> {
        self.core.wire_datastore(datastore)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
            .lock()
            .map(|t| *t)
            .unwrap_or(DEFAULT_FREQUENCY_THRESHOLD)
    }

    fn frequent(&self) -> Vec<AddressActivity> {
        let threshold = self.threshold();
        self.ledger
            .lock()
            .map(|ledger| ledger.frequent(threshold))
            .unwrap_or_default()
    }

    fn on_update(&self, snapshot: &MarketSnapshot) -> AgentResult {
        self.core.remember(snapshot);
        if let Ok(mut ledger) = self.ledger.lock() {
            for tx in &snapshot.transactions {
                // Re-delivered transactions are counted once
                if !ledger.seen.insert(tx.hash.clone()) {
                    continue;
                }
                ledger.touch(&tx.from, tx.timestamp);
                ledger.touch(&tx.to, tx.timestamp);
            }
        }

        let frequent = self.frequent();
        let count = frequent.len();
        self.core.persist(ProcessedData::FrequentAddresses(frequent));
        AgentResult::ok("transaction frequency updated").with("frequentAddresses", count)
    }

    fn set_threshold(&self, threshold: u32) -> AgentResult {
        if threshold == 0 {
            return CoreError::validation("threshold must be at least 1").into();
        }
        if let Ok(mut current) = self.threshold.lock() {
            *current = threshold;
        }
        AgentResult::ok(format!("frequency threshold set to {}", threshold)).with("threshold", threshold)
    }

    fn analyze(&self, address: Option<&str>) -> AgentResult {
        if let Err(e) = self.core.latest() {
            return e.into();
        }

        let sample: Vec<AddressActivity> = match address.map(str::trim).filter(|a| !a.is_empty()) {
            Some(address) => {
                let known = self
                    .ledger
                    .lock()
                    .ok()
                    .and_then(|ledger| ledger.activity.get(address).cloned());
                match known {
                    Some(activity) => vec![activity],
                    None => {
                        return AgentResult::warning(format!(
                            "address {} has no recorded transactions",
                            address
                        ))
                    }
                }
            }
            None => {
                let frequent = self.frequent();
                if frequent.is_empty() {
                    return AgentResult::warning("no high-frequency addresses detected");
                }
                frequent.into_iter().take(SAMPLE_SIZE).collect()
            }
        };

        let lines: Vec<String> = sample
            .iter()
            .map(|a| format!("{}: {} transactions", a.address, a.transaction_count))
            .collect();
        let prompt = format!(
            "Analyze these high-frequency addresses.\n{}\n\
             What kind of entity is each likely to be (arbitrage bot, exchange, market maker), \
             what is the pattern and is any of it suspicious?\n\
             Return the analysis as <o>analysis</o>.",
            lines.join("\n")
        );

        let addresses: Vec<String> = sample.into_iter().map(|a| a.address).collect();
        match self.core.ask(&prompt) {
            Ok(analysis) => AgentResult::success()
                .with("addresses", addresses)
                .with("analysis", analysis),
            Err(e) => e.into(),
        }
    }
}

impl Agent for TxFrequencyAgent {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn role(&self) -> AgentRole {
        AgentRole::TxFrequency
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.message() {
            Message::InfoUpdate(snapshot) => self.on_update(snapshot),
            Message::SetThreshold { threshold } => self.set_threshold(*threshold),
            Message::RequestFreqAnalysis { address } => self.analyze(address.as_deref()),
            other => AgentResult::unsupported(other.type_name()),
        }
    }
}
