//! CentralDispatcher - classifies requests and routes each to one specialist
//!
//! Per request: refresh market info, classify (explicit type or oracle),
//! extract parameters when they are missing, check the target is wired, send.
//! Every failure comes back as a structured error result; nothing retries.

use crate::request::{DispatchPhase, RequestType, RoutingDecision};
use chrono::Utc;
use serde_json::{Map, Value};
use shared::{
    extract_tagged, Agent, AgentHandle, AgentResult, AgentRole, AlarmSpec, CoreError, Envelope,
    ExecutionReport, Message, Oracle, Outbox, Peer, Request, Tap, TradeParams,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Roles the dispatcher can route to
pub const ROUTED_ROLES: [AgentRole; 8] = [
    AgentRole::CoinInfo,
    AgentRole::Whale,
    AgentRole::Contract,
    AgentRole::TxFrequency,
    AgentRole::CexWithdraw,
    AgentRole::Alarm,
    AgentRole::Trade,
    AgentRole::DataStore,
];

/// Alarm used when a set_alarm request carries no condition
pub const DEFAULT_ALARM_CONDITION: &str =
    "SELECT * FROM whale_transactions WHERE value > 10000 LIMIT 1";

const TABLE_HINT: &str = "coin_info(symbol, name, contract, price, market_cap, volume_24h, \
     change_24h, last_updated), \
     whale_transactions(tx_hash, from_address, to_address, value, coin, block_number, timestamp), \
     cex_withdrawals(tx_hash, from_address, to_address, value, timestamp), \
     contract_activities(tx_hash, contract_address, from_address, value, timestamp, block_number), \
     frequent_addresses(address, transaction_count, first_seen, last_seen)";

/// A routed request: where it goes and what it carries
struct Route {
    decision: RoutingDecision,
    message: Message,
}

/// The central orchestrator
pub struct CentralDispatcher {
    outbox: Outbox,
    oracle: Arc<dyn Oracle>,
    default_coin: String,
    distributor: Peer,
    routes: BTreeMap<AgentRole, Peer>,
}

impl CentralDispatcher {
    /// Create a new dispatcher with every route unwired
    pub fn new(
        oracle: Arc<dyn Oracle>,
        default_coin: impl Into<String>,
        tap: Option<Arc<dyn Tap>>,
    ) -> Self {
        Self {
            outbox: Outbox::new(AgentRole::Central.agent_name(), tap),
            oracle,
            default_coin: default_coin.into().to_ascii_uppercase(),
            distributor: Peer::new(),
            routes: ROUTED_ROLES.iter().map(|role| (*role, Peer::new())).collect(),
        }
    }

    /// Wire the info distributor asked to refresh before each routed request
    pub fn wire_distributor(&self, distributor: &AgentHandle) -> shared::Result<()> {
        self.distributor.wire(distributor)
    }

    /// Wire the specialist serving `role`
    pub fn wire(&self, role: AgentRole, handle: &AgentHandle) -> shared::Result<()> {
        match self.routes.get(&role) {
            Some(peer) => peer.wire(handle),
            None => Err(CoreError::Wiring(format!("central does not route to {}", role))),
        }
    }

    pub fn is_wired(&self, role: AgentRole) -> bool {
        self.routes.get(&role).is_some_and(Peer::is_wired)
    }

    /// Handle one request
    pub fn dispatch(&self, request: Request) -> AgentResult {
        self.dispatch_traced(request).0
    }

    /// Handle one request and report the phases it went through
    pub fn dispatch_traced(&self, request: Request) -> (AgentResult, Vec<DispatchPhase>) {
        let mut phases = vec![DispatchPhase::Unclassified];

        if let Err(failed) = self.refresh() {
            let reason = failed.message_text().to_string();
            warn!(reason = %reason, "Request aborted before classification");
            phases.push(DispatchPhase::Failed { reason });
            return (failed, phases);
        }

        let request_type = self.classify(&request);
        phases.push(DispatchPhase::Classified(request_type));

        let result = match self.route(request_type, &request) {
            Ok(route) => {
                phases.push(DispatchPhase::Routed(route.decision));
                self.deliver(route, &request)
            }
            Err(result) => result,
        };

        let result = result.with("requestType", request_type.as_str());
        if result.is_error() {
            let reason = result.message_text().to_string();
            warn!(request_type = %request_type, reason = %reason, "Request failed");
            phases.push(DispatchPhase::Failed { reason });
        } else {
            info!(request_type = %request_type, status = %result.status, "Request completed");
            phases.push(DispatchPhase::Completed);
        }
        (result, phases)
    }

    /// An explicit type is taken as-is (off-list names are `Other`); otherwise ask the oracle
    pub fn classify(&self, request: &Request) -> RequestType {
        if let Some(explicit) = request.request_type.as_deref() {
            return RequestType::parse(explicit);
        }

        let prompt = format!(
            "Classify this request into exactly one type.\n\n\
             Request:\n{}\n\n\
             Types: market_analysis, coin_info, whale_analysis, contract_analysis, \
             transaction_analysis, set_alarm, trade_operation, sql_query, other.\n\
             Return only the type as <o>type</o>",
            request.text()
        );
        match self.oracle.complete(&prompt) {
            Ok(reply) => {
                let request_type = RequestType::parse(&extract_tagged(&reply, "o"));
                debug!(request_type = %request_type, "Request classified by oracle");
                request_type
            }
            Err(e) => {
                warn!(error = %e, "Oracle classification failed");
                RequestType::Other
            }
        }
    }

    fn route(&self, request_type: RequestType, request: &Request) -> Result<Route, AgentResult> {
        let (target_agent, message, needs_extraction) = match request_type.fixed_target() {
            Some(target) => {
                let (message, extracted) = self.fixed_message(request_type, request)?;
                (target, message, extracted)
            }
            None if request_type == RequestType::TransactionAnalysis => self.transaction_route(request),
            None => return Err(unknown_type(request)),
        };

        Ok(Route {
            decision: RoutingDecision {
                request_type,
                target_agent,
                needs_extraction,
            },
            message,
        })
    }

    /// Message for a type whose specialist does not depend on parameters
    fn fixed_message(&self, request_type: RequestType, request: &Request) -> Result<(Message, bool), AgentResult> {
        let built = match request_type {
            RequestType::MarketAnalysis => (Message::RequestMarketAnalysis {}, false),
            RequestType::CoinInfo => {
                let (coin, extracted) = self.coin(request);
                (Message::GetCoinInfo { coin }, extracted)
            }
            RequestType::WhaleAnalysis => {
                let (coin, extracted) = self.coin(request);
                (Message::RequestWhaleAnalysis { coin: Some(coin) }, extracted)
            }
            RequestType::ContractAnalysis => {
                let (address, extracted) = self.contract_address(request);
                (Message::RequestContractAnalysis { address }, extracted)
            }
            RequestType::SetAlarm => {
                let (spec, extracted) = self.alarm_spec(request);
                (Message::SetAlarm(spec), extracted)
            }
            RequestType::TradeOperation => {
                let (params, extracted) = self.trade_params(request).map_err(AgentResult::from)?;
                (Message::ExecuteTrade(params), extracted)
            }
            RequestType::SqlQuery => {
                let (query, extracted) = self.sql_text(request).map_err(AgentResult::from)?;
                (Message::SqlQuery { query, params: Vec::new() }, extracted)
            }
            RequestType::TransactionAnalysis | RequestType::Other => return Err(unknown_type(request)),
        };
        Ok(built)
    }

    fn deliver(&self, route: Route, request: &Request) -> AgentResult {
        let RoutingDecision {
            request_type,
            target_agent,
            ..
        } = route.decision;

        let Some(target) = self.routes.get(&target_agent).and_then(Peer::get) else {
            return CoreError::unavailable(request_type.as_str()).into();
        };

        let query = match &route.message {
            Message::SqlQuery { query, .. } => Some(query.clone()),
            _ => None,
        };

        let result = self.outbox.send(&target, route.message);
        match query {
            Some(query) => self.explain(result, &query, request),
            None => result,
        }
    }

    /// Ask the distributor for fresh market info; any failure aborts the request
    fn refresh(&self) -> Result<(), AgentResult> {
        let Some(distributor) = self.distributor.get() else {
            debug!("No info distributor wired, skipping refresh");
            return Ok(());
        };

        let result = self.outbox.send(&distributor, Message::RequestInfoUpdate {});
        if result.is_success() {
            return Ok(());
        }
        Err(
            AgentResult::error(format!("market info refresh failed: {}", result.message_text()))
                .with("errorKind", "refresh_failed"),
        )
    }

    /// Attach a plain-language explanation to a successful query result
    fn explain(&self, result: AgentResult, query: &str, request: &Request) -> AgentResult {
        let result = result.with("sql", query);
        if !result.is_success() {
            return result;
        }

        let prompt = format!(
            "Explain the result of this SQL query for the user.\n\n\
             Question: {}\nSQL: {}\nResult: {}\n\n\
             Keep it short and clear. Return the explanation as <o>explanation</o>",
            request.text(),
            query,
            result.get("result").cloned().unwrap_or(Value::Null)
        );
        match self.oracle.complete(&prompt) {
            Ok(reply) => result.with("explanation", extract_tagged(&reply, "o")),
            Err(e) => {
                warn!(error = %e, "Query explanation unavailable");
                result
            }
        }
    }

    // ============== Parameter Extraction ==============

    /// Ask the oracle for the `tag` block; `None` on failure or a blank reply
    fn extract(&self, prompt: &str, tag: &str) -> Option<String> {
        match self.oracle.complete(prompt) {
            Ok(reply) => Some(extract_tagged(&reply, tag)).filter(|s| !s.is_empty()),
            Err(e) => {
                warn!(error = %e, "Parameter extraction failed");
                None
            }
        }
    }

    /// Coin symbol from parameters, the oracle, or the default coin
    fn coin(&self, request: &Request) -> (String, bool) {
        if let Some(coin) = request.param_str("coin") {
            return (coin.to_ascii_uppercase(), false);
        }

        let prompt = format!(
            "Extract the cryptocurrency the user is asking about.\n\n{}\n\n\
             Return only the symbol (BTC, ETH, USDT, ...); if none is mentioned return {}.\n\
             Format: <o>SYMBOL</o>",
            request.text(),
            self.default_coin
        );
        let coin = self
            .extract(&prompt, "o")
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| c.len() <= 10 && c.chars().all(|ch| ch.is_ascii_alphanumeric()))
            .unwrap_or_else(|| self.default_coin.clone());
        (coin, true)
    }

    /// Contract address; anything not shaped like `0x...` is dropped
    fn contract_address(&self, request: &Request) -> (Option<String>, bool) {
        if let Some(address) = request.param_str("address") {
            return (Some(address.to_string()).filter(|a| is_address(a)), false);
        }

        let prompt = format!(
            "Extract the smart contract address from this request.\n\n{}\n\n\
             Return only the address (starting with 0x) as <o>address</o>",
            request.text()
        );
        (self.extract(&prompt, "o").filter(|a| is_address(a)), true)
    }

    /// `high_freq` goes to the tx-frequency agent, everything else to CEX withdrawals
    fn transaction_route(&self, request: &Request) -> (AgentRole, Message, bool) {
        let (analysis_type, mut extracted) = match request.param_str("analysis_type") {
            Some(kind) => (Some(kind.to_string()), false),
            None => {
                let prompt = format!(
                    "Does this request ask about high-frequency trading addresses or about \
                     exchange withdrawals?\n\n{}\n\n\
                     Return \"high_freq\" or \"cex_withdrawal\" as <o>type</o>",
                    request.text()
                );
                (self.extract(&prompt, "o"), true)
            }
        };

        if analysis_type.as_deref() != Some("high_freq") {
            return (AgentRole::CexWithdraw, Message::RequestWithdrawAnalysis {}, extracted);
        }

        let address = match request.param_str("address") {
            Some(address) => Some(address.to_string()),
            None => {
                let prompt = format!(
                    "Extract the specific address the user wants analyzed, if any.\n\n{}\n\n\
                     Return the address, or \"all\" when there is none, as <o>address</o>",
                    request.text()
                );
                extracted = true;
                self.extract(&prompt, "o")
            }
        };
        let address = address.filter(|a| !a.eq_ignore_ascii_case("all"));
        (AgentRole::TxFrequency, Message::RequestFreqAnalysis { address }, extracted)
    }

    /// Alarm from parameters; a missing condition is written by the oracle or defaulted
    fn alarm_spec(&self, request: &Request) -> (AlarmSpec, bool) {
        let id = request
            .param_str("id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("alarm_{}", Utc::now().timestamp()));
        let description = request
            .param_str("description")
            .unwrap_or("user alarm")
            .to_string();

        if let Some(condition) = request.param_str("condition") {
            return (AlarmSpec::new(id, condition).with_description(description), false);
        }

        let prompt = format!(
            "Write a SQL SELECT that returns rows exactly when this alert should fire.\n\n{}\n\n\
             Tables: {}\nReturn the query as <sql>query</sql>",
            request.text(),
            TABLE_HINT
        );
        let condition = self
            .extract(&prompt, "sql")
            .unwrap_or_else(|| DEFAULT_ALARM_CONDITION.to_string());
        (AlarmSpec::new(id, condition).with_description(description), true)
    }

    /// Trade parameters; target defaults to `cex` and action to `buy`
    fn trade_params(&self, request: &Request) -> shared::Result<(TradeParams, bool)> {
        let (raw, extracted) = match &request.parameters {
            Some(parameters) => (parameters.clone(), false),
            None => {
                let prompt = format!(
                    "Extract the trade the user wants to make.\n\n{}\n\n\
                     Return JSON as <o>{{\"target\": \"cex|dex\", \"action\": \"buy|sell|approve|swap\", \
                     \"symbol\": \"...\", \"quantity\": 0, \"price\": 0}}</o>",
                    request.text()
                );
                let parsed = self
                    .extract(&prompt, "o")
                    .and_then(|json| serde_json::from_str::<Map<String, Value>>(&json).ok())
                    .ok_or_else(|| CoreError::validation("missing trade parameters"))?;
                (parsed, true)
            }
        };

        let mut params: TradeParams = serde_json::from_value(Value::Object(raw))
            .map_err(|e| CoreError::validation(format!("invalid trade parameters: {}", e)))?;
        if params.target.as_deref().map_or(true, |t| t.trim().is_empty()) {
            params.target = Some("cex".to_string());
        }
        if params.action.as_deref().map_or(true, |a| a.trim().is_empty()) {
            params.action = Some("buy".to_string());
        }
        Ok((params, extracted))
    }

    /// SQL text from `sql`/`query` parameters or a `<sql>` block written by the oracle
    fn sql_text(&self, request: &Request) -> shared::Result<(String, bool)> {
        if let Some(sql) = request.param_str("sql").or_else(|| request.param_str("query")) {
            return Ok((sql.to_string(), false));
        }

        let prompt = format!(
            "Convert this request into one SQL query.\n\n{}\n\n\
             Tables: {}\nReturn the complete query as <sql>query</sql>",
            request.text(),
            TABLE_HINT
        );
        self.extract(&prompt, "sql")
            .map(|sql| (sql, true))
            .ok_or_else(|| CoreError::validation("could not derive a SQL query from the request"))
    }

    fn acknowledge(&self, report: ExecutionReport) -> AgentResult {
        info!(
            operation = %report.operation,
            action = %report.action,
            status = %report.result.status,
            "Command execution result received"
        );
        AgentResult::ok("command execution result acknowledged").with("report", report)
    }
}

fn unknown_type(request: &Request) -> AgentResult {
    let raw = request.request_type.as_deref().unwrap_or("other");
    AgentResult::error(format!("unknown request type: {}", raw))
}

fn is_address(candidate: &str) -> bool {
    candidate.len() > 2 && candidate.starts_with("0x")
}

impl Agent for CentralDispatcher {
    fn name(&self) -> &str {
        self.outbox.sender()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Central
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.into_message() {
            Message::UserRequest(request) => self.dispatch(request),
            Message::CommandExecutionResult(report) => self.acknowledge(report),
            other => AgentResult::unsupported(other.type_name()),
        }
    }
}
