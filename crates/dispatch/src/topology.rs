//! Topology - builds every agent once and wires the fixed, cyclic graph
//!
//! The topology owns all agents. Peers only hold weak handles, so dropping
//! the topology tears the whole graph down. Wiring happens once in
//! [`TopologyBuilder::build`] and never changes afterwards.

use crate::central::{CentralDispatcher, ROUTED_ROLES};
use agents::{
    oracle_from_config, CexWithdrawAgent, CoinInfoAgent, ContractAgent, DataStoreAgent,
    ExchangeAgent, InfoDistributor, MarketFeed, SqliteDatastore, StaticFeed, TradeExecutor,
    TxFrequencyAgent, UserAgent, WalletAgent, WhaleAgent,
};
use interceptor::{EventBus, EventBusOptions, InterceptedOracle, JournalError};
use monitor::{AlarmAgent, LogNotifier, MonitorOptions, StopOutcome};
use shared::{
    AgentHandle, AgentResult, AgentRole, AlarmNotifier, CoreConfig, CoreError, Datastore, Message,
    NotifyChannel, Oracle, Outbox, Request, StoreError, Tap,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Directed edges of the agent graph, `(from, to)`
///
/// `Trade -> Central` is the one back-edge: completed trades are reported
/// to the dispatcher.
pub const EDGES: &[(AgentRole, AgentRole)] = &[
    (AgentRole::User, AgentRole::Central),
    (AgentRole::Central, AgentRole::InfoDistributor),
    (AgentRole::Central, AgentRole::CoinInfo),
    (AgentRole::Central, AgentRole::Whale),
    (AgentRole::Central, AgentRole::Contract),
    (AgentRole::Central, AgentRole::TxFrequency),
    (AgentRole::Central, AgentRole::CexWithdraw),
    (AgentRole::Central, AgentRole::Alarm),
    (AgentRole::Central, AgentRole::Trade),
    (AgentRole::Central, AgentRole::DataStore),
    (AgentRole::InfoDistributor, AgentRole::CoinInfo),
    (AgentRole::InfoDistributor, AgentRole::Whale),
    (AgentRole::InfoDistributor, AgentRole::Contract),
    (AgentRole::InfoDistributor, AgentRole::TxFrequency),
    (AgentRole::InfoDistributor, AgentRole::CexWithdraw),
    (AgentRole::CoinInfo, AgentRole::DataStore),
    (AgentRole::Whale, AgentRole::DataStore),
    (AgentRole::Contract, AgentRole::DataStore),
    (AgentRole::TxFrequency, AgentRole::DataStore),
    (AgentRole::CexWithdraw, AgentRole::DataStore),
    (AgentRole::Trade, AgentRole::Exchange),
    (AgentRole::Trade, AgentRole::Wallet),
    (AgentRole::Trade, AgentRole::Central),
    (AgentRole::Alarm, AgentRole::InfoDistributor),
];

/// Sender name used for requests entering from outside the graph
pub const CLIENT: &str = "Client";

const PAPER_EXCHANGE: &str = "binance";
const PAPER_API_KEY: &str = "paper-trading-key-0000";
const PAPER_WALLET: &str = "0x000000000000000000000000000000000000dEaD";

#[derive(Debug, Error)]
pub enum WiringError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("event bus journal: {0}")]
    Journal(#[from] JournalError),

    #[error("datastore: {0}")]
    Store(#[from] StoreError),
}

/// Typed handles to the agents that were instantiated
#[derive(Default)]
struct Parts {
    user: Option<Arc<UserAgent>>,
    central: Option<Arc<CentralDispatcher>>,
    distributor: Option<Arc<InfoDistributor>>,
    datastore: Option<Arc<DataStoreAgent>>,
    coin_info: Option<Arc<CoinInfoAgent>>,
    whale: Option<Arc<WhaleAgent>>,
    contract: Option<Arc<ContractAgent>>,
    tx_frequency: Option<Arc<TxFrequencyAgent>>,
    cex_withdraw: Option<Arc<CexWithdrawAgent>>,
    wallet: Option<Arc<WalletAgent>>,
    exchange: Option<Arc<ExchangeAgent>>,
    trade: Option<Arc<TradeExecutor>>,
    alarm: Option<Arc<AlarmAgent>>,
}

impl Parts {
    fn handles(&self) -> BTreeMap<AgentRole, AgentHandle> {
        let mut handles: BTreeMap<AgentRole, AgentHandle> = BTreeMap::new();
        let mut put = |role: AgentRole, handle: Option<AgentHandle>| {
            if let Some(handle) = handle {
                handles.insert(role, handle);
            }
        };
        put(AgentRole::User, self.user.clone().map(|a| a as AgentHandle));
        put(AgentRole::Central, self.central.clone().map(|a| a as AgentHandle));
        put(AgentRole::InfoDistributor, self.distributor.clone().map(|a| a as AgentHandle));
        put(AgentRole::DataStore, self.datastore.clone().map(|a| a as AgentHandle));
        put(AgentRole::CoinInfo, self.coin_info.clone().map(|a| a as AgentHandle));
        put(AgentRole::Whale, self.whale.clone().map(|a| a as AgentHandle));
        put(AgentRole::Contract, self.contract.clone().map(|a| a as AgentHandle));
        put(AgentRole::TxFrequency, self.tx_frequency.clone().map(|a| a as AgentHandle));
        put(AgentRole::CexWithdraw, self.cex_withdraw.clone().map(|a| a as AgentHandle));
        put(AgentRole::Wallet, self.wallet.clone().map(|a| a as AgentHandle));
        put(AgentRole::Exchange, self.exchange.clone().map(|a| a as AgentHandle));
        put(AgentRole::Trade, self.trade.clone().map(|a| a as AgentHandle));
        put(AgentRole::Alarm, self.alarm.clone().map(|a| a as AgentHandle));
        handles
    }

    /// Wire every outgoing edge of `from` to the live `targets`
    fn wire_from(&self, from: AgentRole, targets: &[AgentHandle]) -> shared::Result<()> {
        if from == AgentRole::InfoDistributor {
            if let Some(distributor) = &self.distributor {
                distributor.wire_subscribers(targets)?;
            }
            return Ok(());
        }
        for target in targets {
            self.wire_edge(from, target)?;
        }
        Ok(())
    }

    fn wire_edge(&self, from: AgentRole, target: &AgentHandle) -> shared::Result<()> {
        fn on<T>(agent: &Option<Arc<T>>, wire: impl FnOnce(&T) -> shared::Result<()>) -> shared::Result<()> {
            agent.as_deref().map_or(Ok(()), wire)
        }

        match (from, target.role()) {
            (AgentRole::User, AgentRole::Central) => on(&self.user, |a| a.wire_central(target)),
            (AgentRole::Central, AgentRole::InfoDistributor) => {
                on(&self.central, |a| a.wire_distributor(target))
            }
            (AgentRole::Central, role) => on(&self.central, |a| a.wire(role, target)),
            (AgentRole::CoinInfo, AgentRole::DataStore) => {
                on(&self.coin_info, |a| a.wire_datastore(target))
            }
            (AgentRole::Whale, AgentRole::DataStore) => on(&self.whale, |a| a.wire_datastore(target)),
            (AgentRole::Contract, AgentRole::DataStore) => {
                on(&self.contract, |a| a.wire_datastore(target))
            }
            (AgentRole::TxFrequency, AgentRole::DataStore) => {
                on(&self.tx_frequency, |a| a.wire_datastore(target))
            }
            (AgentRole::CexWithdraw, AgentRole::DataStore) => {
                on(&self.cex_withdraw, |a| a.wire_datastore(target))
            }
            (AgentRole::Trade, AgentRole::Exchange) => on(&self.trade, |a| a.wire_exchange(target)),
            (AgentRole::Trade, AgentRole::Wallet) => on(&self.trade, |a| a.wire_wallet(target)),
            (AgentRole::Trade, AgentRole::Central) => on(&self.trade, |a| a.wire_central(target)),
            (AgentRole::Alarm, AgentRole::InfoDistributor) => {
                on(&self.alarm, |a| a.wire_distributor(target))
            }
            (from, to) => Err(CoreError::Wiring(format!("no edge {} -> {}", from, to))),
        }
    }
}

/// Builder for [`Topology`]
pub struct TopologyBuilder {
    config: CoreConfig,
    oracle: Option<Arc<dyn Oracle>>,
    feed: Option<Arc<dyn MarketFeed>>,
    datastore: Option<Arc<dyn Datastore>>,
    bus: Option<Arc<EventBus>>,
    skipped: BTreeSet<AgentRole>,
    paper_accounts: bool,
}

impl TopologyBuilder {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            oracle: None,
            feed: None,
            datastore: None,
            bus: None,
            skipped: BTreeSet::new(),
            paper_accounts: false,
        }
    }

    /// Use `oracle` instead of the one described by the config
    pub fn oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Use `feed` instead of the bundled sample feed
    pub fn feed(mut self, feed: Arc<dyn MarketFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Use `datastore` instead of opening SQLite
    pub fn datastore(mut self, datastore: Arc<dyn Datastore>) -> Self {
        self.datastore = Some(datastore);
        self
    }

    /// Observe through an existing bus
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Leave `role` out of the graph; edges into it stay unwired
    pub fn without(mut self, role: AgentRole) -> Self {
        self.skipped.insert(role);
        self
    }

    /// Pre-configure the paper exchange session and wallet
    pub fn with_paper_accounts(mut self) -> Self {
        self.paper_accounts = true;
        self
    }

    fn wants(&self, role: AgentRole) -> bool {
        !self.skipped.contains(&role)
    }

    pub fn build(self) -> Result<Topology, WiringError> {
        let bus = match &self.bus {
            Some(bus) => bus.clone(),
            None => Arc::new(EventBus::new(EventBusOptions::from_config(&self.config))?),
        };
        let tap: Option<Arc<dyn Tap>> = Some(bus.clone());

        let oracle = self
            .oracle
            .clone()
            .unwrap_or_else(|| oracle_from_config(&self.config.oracle));
        let oracle_for = |role: AgentRole| -> Arc<dyn Oracle> {
            Arc::new(InterceptedOracle::new(
                oracle.clone(),
                Outbox::new(role.agent_name(), tap.clone()),
            ))
        };

        let store: Arc<dyn Datastore> = match &self.datastore {
            Some(store) => store.clone(),
            None => match &self.config.database_path {
                Some(path) => Arc::new(SqliteDatastore::open(path)?),
                None => Arc::new(SqliteDatastore::in_memory()?),
            },
        };
        let feed: Arc<dyn MarketFeed> = self
            .feed
            .clone()
            .unwrap_or_else(|| Arc::new(StaticFeed::sample()));

        let mut notifiers: Vec<Arc<dyn AlarmNotifier>> = vec![Arc::new(LogNotifier)];
        if self.config.alarm_notify_channel == NotifyChannel::EventBus {
            notifiers.push(bus.clone());
        }

        let mut parts = Parts::default();
        if self.wants(AgentRole::User) {
            parts.user = Some(Arc::new(UserAgent::new(oracle_for(AgentRole::User), tap.clone())));
        }
        if self.wants(AgentRole::Central) {
            parts.central = Some(Arc::new(CentralDispatcher::new(
                oracle_for(AgentRole::Central),
                self.config.default_coin.clone(),
                tap.clone(),
            )));
        }
        if self.wants(AgentRole::InfoDistributor) {
            parts.distributor = Some(Arc::new(InfoDistributor::new(feed, tap.clone())));
        }
        if self.wants(AgentRole::DataStore) {
            parts.datastore = Some(Arc::new(DataStoreAgent::new(store.clone())));
        }
        if self.wants(AgentRole::CoinInfo) {
            parts.coin_info = Some(Arc::new(CoinInfoAgent::new(oracle_for(AgentRole::CoinInfo), tap.clone())));
        }
        if self.wants(AgentRole::Whale) {
            parts.whale = Some(Arc::new(WhaleAgent::new(oracle_for(AgentRole::Whale), tap.clone())));
        }
        if self.wants(AgentRole::Contract) {
            parts.contract = Some(Arc::new(ContractAgent::new(oracle_for(AgentRole::Contract), tap.clone())));
        }
        if self.wants(AgentRole::TxFrequency) {
            parts.tx_frequency = Some(Arc::new(TxFrequencyAgent::new(
                oracle_for(AgentRole::TxFrequency),
                tap.clone(),
            )));
        }
        if self.wants(AgentRole::CexWithdraw) {
            parts.cex_withdraw = Some(Arc::new(CexWithdrawAgent::new(
                oracle_for(AgentRole::CexWithdraw),
                tap.clone(),
            )));
        }
        if self.wants(AgentRole::Wallet) {
            let wallet = WalletAgent::new(tap.clone());
            parts.wallet = Some(Arc::new(if self.paper_accounts {
                wallet.with_wallet(PAPER_WALLET)
            } else {
                wallet
            }));
        }
        if self.wants(AgentRole::Exchange) {
            let exchange = ExchangeAgent::new(tap.clone());
            parts.exchange = Some(Arc::new(if self.paper_accounts {
                exchange.with_session(PAPER_EXCHANGE, PAPER_API_KEY)
            } else {
                exchange
            }));
        }
        if self.wants(AgentRole::Trade) {
            parts.trade = Some(Arc::new(TradeExecutor::new(tap.clone())));
        }
        if self.wants(AgentRole::Alarm) {
            parts.alarm = Some(Arc::new(AlarmAgent::new(
                store,
                notifiers,
                MonitorOptions::from_config(&self.config),
                tap.clone(),
            )));
        }

        let agents = parts.handles();
        for (from, targets) in adjacency_of(&agents) {
            let targets: Vec<AgentHandle> = targets
                .iter()
                .filter_map(|role| agents.get(role).cloned())
                .collect();
            parts.wire_from(from, &targets)?;
        }

        for (from, to) in EDGES {
            if agents.contains_key(from) && !agents.contains_key(to) {
                debug!(from = %from, to = %to, "Edge left unwired");
            }
        }
        if let Some(central) = &parts.central {
            let missing: Vec<&str> = ROUTED_ROLES
                .iter()
                .filter(|role| !central.is_wired(**role))
                .map(AgentRole::agent_name)
                .collect();
            if !missing.is_empty() {
                info!(missing = ?missing, "Central has no specialist for some routes");
            }
        }
        info!(agents = agents.len(), "Topology wired");

        Ok(Topology {
            client: Outbox::new(CLIENT, tap),
            agents,
            parts,
            bus,
        })
    }
}

/// Edges between agents that are both present
fn adjacency_of(agents: &BTreeMap<AgentRole, AgentHandle>) -> BTreeMap<AgentRole, Vec<AgentRole>> {
    let mut adjacency: BTreeMap<AgentRole, Vec<AgentRole>> = BTreeMap::new();
    for (from, to) in EDGES {
        if agents.contains_key(from) && agents.contains_key(to) {
            adjacency.entry(*from).or_default().push(*to);
        }
    }
    adjacency
}

/// The wired agent graph
pub struct Topology {
    agents: BTreeMap<AgentRole, AgentHandle>,
    parts: Parts,
    bus: Arc<EventBus>,
    client: Outbox,
}

impl Topology {
    pub fn builder(config: CoreConfig) -> TopologyBuilder {
        TopologyBuilder::new(config)
    }

    pub fn agent(&self, role: AgentRole) -> Option<&AgentHandle> {
        self.agents.get(&role)
    }

    /// Roles present in the graph
    pub fn roles(&self) -> Vec<AgentRole> {
        self.agents.keys().copied().collect()
    }

    /// Wired edges, grouped by source
    pub fn adjacency(&self) -> BTreeMap<AgentRole, Vec<AgentRole>> {
        adjacency_of(&self.agents)
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn central(&self) -> Option<&Arc<CentralDispatcher>> {
        self.parts.central.as_ref()
    }

    pub fn alarm(&self) -> Option<&Arc<AlarmAgent>> {
        self.parts.alarm.as_ref()
    }

    pub fn trade(&self) -> Option<&Arc<TradeExecutor>> {
        self.parts.trade.as_ref()
    }

    /// Deliver `message` to `role` from outside the graph
    pub fn send(&self, role: AgentRole, message: Message) -> AgentResult {
        match self.agents.get(&role) {
            Some(agent) => self.client.send(agent, message),
            None => CoreError::unavailable(role.agent_name()).into(),
        }
    }

    /// Structured request straight to the central dispatcher
    pub fn request(&self, request: Request) -> AgentResult {
        self.send(AgentRole::Central, Message::UserRequest(request))
    }

    /// Free-text query through the user agent
    pub fn ask(&self, query: impl Into<String>) -> AgentResult {
        self.send(AgentRole::User, Message::UserQuery { query: query.into() })
    }

    /// Stop background work
    pub fn shutdown(&self) -> StopOutcome {
        match &self.parts.alarm {
            Some(alarm) => alarm.monitor().stop(),
            None => StopOutcome::NotRunning,
        }
    }
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topology")
            .field("roles", &self.roles())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agents::FeedError;
    use serde_json::{json, Map, Value};
    use shared::{MarketSnapshot, ScriptedOracle, Status};

    struct DeadFeed;

    impl MarketFeed for DeadFeed {
        fn endpoint(&self) -> &str {
            "dead/snapshot"
        }

        fn fetch(&self) -> Result<MarketSnapshot, FeedError> {
            Err(FeedError::Request("connection refused".to_string()))
        }
    }

    fn builder(oracle: ScriptedOracle) -> TopologyBuilder {
        Topology::builder(CoreConfig::default())
            .oracle(Arc::new(oracle))
            .bus(Arc::new(EventBus::in_memory(1000)))
    }

    fn typed(request_type: &str, parameters: Value) -> Request {
        let parameters: Map<String, Value> = parameters.as_object().cloned().unwrap_or_default();
        Request::typed(request_type, parameters)
    }

    // ============== Wiring Tests ==============

    #[test]
    fn test_full_graph_has_every_role() {
        let topology = builder(ScriptedOracle::new()).build().unwrap();

        assert_eq!(topology.roles().len(), AgentRole::ALL.len());
        assert_eq!(topology.adjacency().values().map(Vec::len).sum::<usize>(), EDGES.len());
    }

    #[test]
    fn test_back_edge_is_present() {
        let topology = builder(ScriptedOracle::new()).build().unwrap();
        let adjacency = topology.adjacency();

        assert!(adjacency[&AgentRole::Central].contains(&AgentRole::Trade));
        assert!(adjacency[&AgentRole::Trade].contains(&AgentRole::Central));
    }

    #[test]
    fn test_without_drops_role_and_edges() {
        let topology = builder(ScriptedOracle::new())
            .without(AgentRole::CoinInfo)
            .build()
            .unwrap();

        assert!(topology.agent(AgentRole::CoinInfo).is_none());
        assert!(!topology.adjacency()[&AgentRole::Central].contains(&AgentRole::CoinInfo));
        assert!(!topology.central().unwrap().is_wired(AgentRole::CoinInfo));
        assert!(topology.central().unwrap().is_wired(AgentRole::Whale));
    }

    #[test]
    fn test_builds_from_on_disk_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig {
            database_path: Some(dir.path().join("sentinel.db")),
            history_log_path: Some(dir.path().join("interactions.jsonl")),
            ..CoreConfig::default()
        };
        let topology = Topology::builder(config)
            .oracle(Arc::new(ScriptedOracle::new()))
            .build()
            .unwrap();

        let result = topology.request(typed("coin_info", json!({"coin": "ETH"})));

        assert!(result.is_success(), "{:?}", result);
        assert!(dir.path().join("sentinel.db").exists());
        let logged = interceptor::Journal::read_all(dir.path().join("interactions.jsonl")).unwrap();
        assert!(logged.iter().any(|m| m.source.id == "CentralDispatcher"));
    }

    // ============== Request Path Tests ==============

    #[test]
    fn test_coin_info_end_to_end() {
        let topology = builder(ScriptedOracle::new()).build().unwrap();

        let result = topology.request(typed("coin_info", json!({"coin": "ETH"})));

        assert!(result.is_success(), "{:?}", result);
        assert_eq!(result.get("coinInfo").unwrap()["name"], "Ethereum");
        assert_eq!(result.get("requestType"), Some(&json!("coin_info")));
    }

    #[test]
    fn test_coin_info_without_specialist() {
        let topology = builder(ScriptedOracle::new())
            .without(AgentRole::CoinInfo)
            .build()
            .unwrap();

        let result = topology.request(typed("coin_info", json!({"coin": "ETH"})));

        assert_eq!(result.status, Status::Error);
        assert_eq!(result.get("errorKind"), Some(&json!("capability_unavailable")));
    }

    #[test]
    fn test_refresh_failure_aborts_request() {
        let topology = builder(ScriptedOracle::new())
            .feed(Arc::new(DeadFeed))
            .build()
            .unwrap();

        let result = topology.request(typed("coin_info", json!({"coin": "ETH"})));

        assert!(result.is_error());
        assert_eq!(result.get("errorKind"), Some(&json!("refresh_failed")));
    }

    #[test]
    fn test_trade_reports_back_to_central() {
        let topology = builder(ScriptedOracle::new())
            .with_paper_accounts()
            .build()
            .unwrap();

        let result = topology.request(typed(
            "trade_operation",
            json!({"symbol": "ETHUSDT", "quantity": 0.5, "price": 3000.0}),
        ));

        assert!(result.is_success(), "{:?}", result);
        assert!(result.get("orderId").is_some());
        assert!(topology.bus().messages().iter().any(|record| {
            record.source == "TradeExecutor"
                && record.target == "CentralDispatcher"
                && record.content.contains("command_execution_result")
        }));
    }

    #[test]
    fn test_exchange_key_is_masked_on_the_bus() {
        let topology = builder(ScriptedOracle::new())
            .with_paper_accounts()
            .build()
            .unwrap();

        topology.request(typed(
            "trade_operation",
            json!({"symbol": "ETHUSDT", "quantity": 1.0, "price": 3000.0}),
        ));

        let calls = topology.bus().api_calls();
        assert!(calls.iter().any(|r| r.target == "Exchange"));
        assert!(calls.iter().all(|r| !r.content.contains(PAPER_API_KEY)));
    }

    #[test]
    fn test_sql_query_over_refreshed_data() {
        let oracle = ScriptedOracle::new().on("Explain the result", "<o>Two whale transfers.</o>");
        let topology = builder(oracle).build().unwrap();

        let result = topology.request(typed(
            "sql_query",
            json!({"sql": "SELECT COUNT(*) AS n FROM whale_transactions"}),
        ));

        assert!(result.is_success(), "{:?}", result);
        assert_eq!(result.get("explanation"), Some(&json!("Two whale transfers.")));
        assert_eq!(result.get("result").unwrap()[0]["n"], 2);
    }

    #[test]
    fn test_free_text_through_user_agent() {
        let oracle = ScriptedOracle::new()
            .on("Identify the intent", r#"<o>{"request_type": "coin_info", "parameters": {"coin": "ETH"}}</o>"#)
            .on("natural-language reply", "<o>ETH is trading around $3120.</o>");
        let topology = builder(oracle).build().unwrap();

        let result = topology.ask("how is ETH doing?");

        assert!(result.is_success(), "{:?}", result);
        assert_eq!(result.get("formattedResponse"), Some(&json!("ETH is trading around $3120.")));
        assert_eq!(result.get("originalResult").unwrap()["coin"], "ETH");
    }

    #[test]
    fn test_oracle_calls_are_recorded() {
        let oracle = ScriptedOracle::new().on("Classify", "<o>market_analysis</o>").otherwise("<o>calm</o>");
        let topology = builder(oracle).build().unwrap();

        topology.request(Request::from_text("how is the market?"));

        let calls = topology.bus().api_calls();
        assert!(calls
            .iter()
            .any(|r| r.source == "CentralDispatcher" && r.target == "LLM"));
    }

    // ============== Alarm Tests ==============

    #[test]
    fn test_set_alarm_starts_monitor_and_shutdown_stops_it() {
        let topology = builder(ScriptedOracle::new()).build().unwrap();

        let result = topology.request(typed(
            "set_alarm",
            json!({"id": "whales", "condition": "SELECT * FROM whale_transactions WHERE value > 10000"}),
        ));

        assert!(result.is_success(), "{:?}", result);
        assert!(topology.alarm().unwrap().monitor().is_running());
        assert_eq!(topology.shutdown(), StopOutcome::Stopped);
        assert!(!topology.alarm().unwrap().monitor().is_running());
    }

    #[test]
    fn test_alarm_messages_from_client() {
        let topology = builder(ScriptedOracle::new()).build().unwrap();

        let result = topology.send(AgentRole::Alarm, Message::ListAlarms {});

        assert!(result.is_success());
        assert_eq!(result.get("count"), Some(&json!(0)));
    }

    #[test]
    fn test_send_to_missing_role() {
        let topology = builder(ScriptedOracle::new())
            .without(AgentRole::Alarm)
            .build()
            .unwrap();

        let result = topology.send(AgentRole::Alarm, Message::ListAlarms {});
        assert_eq!(result.get("errorKind"), Some(&json!("capability_unavailable")));
    }
}
