//! UserAgent - natural-language front door
//!
//! Turns a free-text query into a structured [`Request`] with the oracle,
//! forwards it to central and has the oracle phrase the answer.

use serde_json::{Map, Value};
use shared::{
    extract_tagged, Agent, AgentHandle, AgentResult, AgentRole, Envelope, Message, Oracle, Outbox,
    Peer, Request, Tap,
};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct UserAgent {
    outbox: Outbox,
    oracle: Arc<dyn Oracle>,
    central: Peer,
}

impl UserAgent {
    pub fn new(oracle: Arc<dyn Oracle>, tap: Option<Arc<dyn Tap>>) -> Self {
        Self {
            outbox: Outbox::new(AgentRole::User.agent_name(), tap),
            oracle,
            central: Peer::new(),
        }
    }

    pub fn wire_central(&self, central: &AgentHandle) -> shared::Result<()> {
        self.central.wire(central)
    }

    /// Structured request for `query`; never fails
    pub fn parse_query(&self, query: &str) -> Request {
        let prompt = format!(
            "Identify the intent of this user request and convert it to a structured form.\n\
             Only classify it and extract parameters; do not judge whether it can be executed.\n\n\
             User request:\n{}\n\n\
             Request types: market_analysis, coin_info, whale_analysis, contract_analysis, \
             transaction_analysis, set_alarm, trade_operation, sql_query, other.\n\
             Parameters are the important values in the request (coin, address, amount, ...).\n\
             Return JSON as <o>{{\"request_type\": \"...\", \"parameters\": {{...}}, \
             \"additional_info\": \"...\"}}</o>",
            query
        );

        let reply = match self.oracle.complete(&prompt) {
            Ok(reply) => extract_tagged(&reply, "o"),
            Err(e) => {
                warn!(error = %e, "Oracle failed while parsing user query");
                return unparsed(query, String::new());
            }
        };

        match serde_json::from_str::<Request>(&reply) {
            Ok(mut request) => {
                request.original_query = Some(query.to_string());
                debug!(request_type = ?request.request_type, "User query parsed");
                request
            }
            Err(e) => {
                warn!(error = %e, "Oracle reply is not a structured request");
                let preview: String = reply.chars().take(100).collect();
                unparsed(query, preview)
            }
        }
    }

    fn handle_query(&self, query: &str) -> AgentResult {
        let query = query.trim();
        if query.is_empty() {
            return shared::CoreError::validation("query is empty").into();
        }

        let request = self.parse_query(query);
        let result = self
            .outbox
            .send_to(&self.central, "central", Message::UserRequest(request));
        self.format(result, query)
    }

    /// Phrase `result` for the user; the raw result comes back if that fails
    fn format(&self, result: AgentResult, query: &str) -> AgentResult {
        let raw = result.to_value();
        let prompt = format!(
            "Turn this system response into a natural-language reply.\n\n\
             Original user query: {}\nSystem response: {}\n\n\
             Write a friendly, informative reply as <o>reply</o>.",
            query, raw
        );

        match self.oracle.complete(&prompt) {
            Ok(reply) => {
                let status = result.status;
                let mut formatted = AgentResult::success()
                    .with("originalResult", raw)
                    .with("formattedResponse", extract_tagged(&reply, "o"));
                formatted.status = status;
                formatted
            }
            Err(e) => {
                warn!(error = %e, "Oracle failed while formatting the response");
                result
            }
        }
    }
}

fn unparsed(query: &str, preview: String) -> Request {
    let mut parameters = Map::new();
    parameters.insert("raw_query".to_string(), Value::String(query.to_string()));
    Request {
        request_type: Some("unknown".to_string()),
        parameters: Some(parameters),
        original_query: Some(query.to_string()),
        additional_info: Some(Value::String(preview)),
    }
}

impl Agent for UserAgent {
    fn name(&self) -> &str {
        self.outbox.sender()
    }

    fn role(&self) -> AgentRole {
        AgentRole::User
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.into_message() {
            Message::UserQuery { query } => self.handle_query(&query),
            Message::SystemResponse(response) => AgentResult::success().with("response", response),
            other => AgentResult::unsupported(other.type_name()),
        }
    }
}
