//! Envelope - the message unit exchanged between agents
//!
//! Content is a closed tagged enum ([`Message`]). Raw JSON is validated into
//! it once, at the envelope boundary, so handlers only ever see typed payloads.

use crate::alarm::AlarmSpec;
use crate::error::{CoreError, Result};
use crate::market::{MarketSnapshot, ProcessedData};
use crate::result::AgentResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A request as it arrives at the central dispatcher
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default, alias = "request_type", skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,

    #[serde(default, alias = "original_query", skip_serializing_if = "Option::is_none")]
    pub original_query: Option<String>,

    #[serde(default, alias = "additional_info", skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Value>,
}

impl Request {
    /// Free-text request with no classification
    pub fn from_text(query: impl Into<String>) -> Self {
        Self {
            original_query: Some(query.into()),
            ..Default::default()
        }
    }

    /// Pre-classified request
    pub fn typed(request_type: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            request_type: Some(request_type.into()),
            parameters: Some(parameters),
            ..Default::default()
        }
    }

    /// String parameter, ignoring blanks
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters
            .as_ref()
            .and_then(|p| p.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Text handed to the oracle for classification and extraction
    pub fn text(&self) -> String {
        match &self.original_query {
            Some(query) => query.clone(),
            None => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

/// Buy or sell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Trade request routed to the trade executor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeParams {
    /// `cex` or `dex`
    #[serde(default)]
    pub target: Option<String>,
    /// `buy`/`sell` on a CEX, `approve`/`swap` on a DEX
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub spender: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub router: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Order placed on the exchange venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderParams {
    pub symbol: String,
    pub side: OrderSide,
    #[serde(default = "default_order_type")]
    pub order_type: String,
    pub quantity: f64,
    #[serde(default)]
    pub price: Option<f64>,
}

fn default_order_type() -> String {
    "limit".to_string()
}

/// Transaction submitted through the wallet venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionParams {
    pub to: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

/// Token allowance granted through the wallet venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalParams {
    pub token: String,
    pub spender: String,
    pub amount: String,
}

/// Completion report sent from the trade executor back to central
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub operation: String,
    pub action: String,
    #[serde(default)]
    pub symbol: Option<String>,
    pub result: AgentResult,
}

/// Every message kind understood by the agent network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Message {
    UserQuery { query: String },
    UserRequest(Request),
    SystemResponse(Value),
    CommandExecutionResult(ExecutionReport),
    RequestInfoUpdate {},
    InfoUpdate(MarketSnapshot),
    ProcessedData(ProcessedData),
    SqlQuery {
        query: String,
        #[serde(default)]
        params: Vec<Value>,
    },
    GetCoinInfo { coin: String },
    RequestMarketAnalysis {},
    RequestWhaleAnalysis {
        #[serde(default)]
        coin: Option<String>,
    },
    TrackCoin { coin: String },
    RequestContractAnalysis {
        #[serde(default)]
        address: Option<String>,
    },
    AddContract {
        address: String,
        #[serde(default)]
        label: Option<String>,
    },
    RemoveContract { address: String },
    RequestFreqAnalysis {
        #[serde(default)]
        address: Option<String>,
    },
    SetThreshold { threshold: u32 },
    RequestWithdrawAnalysis {},
    SetAlarm(AlarmSpec),
    RemoveAlarm { id: String },
    ListAlarms {},
    StartMonitoring {},
    StopMonitoring {},
    ExecuteTrade(TradeParams),
    PlaceOrder(OrderParams),
    CancelOrder { order_id: String },
    GetBalance {
        #[serde(default)]
        asset: Option<String>,
    },
    SetExchange {
        exchange: String,
        api_key: String,
        #[serde(default)]
        api_secret: Option<String>,
    },
    SetWallet { address: String },
    SubmitTransaction(TransactionParams),
    ApproveToken(ApprovalParams),
}

/// Wire names of every [`Message`] variant
pub const MESSAGE_TYPES: &[&str] = &[
    "user_query",
    "user_request",
    "system_response",
    "command_execution_result",
    "request_info_update",
    "info_update",
    "processed_data",
    "sql_query",
    "get_coin_info",
    "request_market_analysis",
    "request_whale_analysis",
    "track_coin",
    "request_contract_analysis",
    "add_contract",
    "remove_contract",
    "request_freq_analysis",
    "set_threshold",
    "request_withdraw_analysis",
    "set_alarm",
    "remove_alarm",
    "list_alarms",
    "start_monitoring",
    "stop_monitoring",
    "execute_trade",
    "place_order",
    "cancel_order",
    "get_balance",
    "set_exchange",
    "set_wallet",
    "submit_transaction",
    "approve_token",
];

impl Message {
    /// Wire name of this message kind
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::UserQuery { .. } => "user_query",
            Message::UserRequest(_) => "user_request",
            Message::SystemResponse(_) => "system_response",
            Message::CommandExecutionResult(_) => "command_execution_result",
            Message::RequestInfoUpdate {} => "request_info_update",
            Message::InfoUpdate(_) => "info_update",
            Message::ProcessedData(_) => "processed_data",
            Message::SqlQuery { .. } => "sql_query",
            Message::GetCoinInfo { .. } => "get_coin_info",
            Message::RequestMarketAnalysis {} => "request_market_analysis",
            Message::RequestWhaleAnalysis { .. } => "request_whale_analysis",
            Message::TrackCoin { .. } => "track_coin",
            Message::RequestContractAnalysis { .. } => "request_contract_analysis",
            Message::AddContract { .. } => "add_contract",
            Message::RemoveContract { .. } => "remove_contract",
            Message::RequestFreqAnalysis { .. } => "request_freq_analysis",
            Message::SetThreshold { .. } => "set_threshold",
            Message::RequestWithdrawAnalysis {} => "request_withdraw_analysis",
            Message::SetAlarm(_) => "set_alarm",
            Message::RemoveAlarm { .. } => "remove_alarm",
            Message::ListAlarms {} => "list_alarms",
            Message::StartMonitoring {} => "start_monitoring",
            Message::StopMonitoring {} => "stop_monitoring",
            Message::ExecuteTrade(_) => "execute_trade",
            Message::PlaceOrder(_) => "place_order",
            Message::CancelOrder { .. } => "cancel_order",
            Message::GetBalance { .. } => "get_balance",
            Message::SetExchange { .. } => "set_exchange",
            Message::SetWallet { .. } => "set_wallet",
            Message::SubmitTransaction(_) => "submit_transaction",
            Message::ApproveToken(_) => "approve_token",
        }
    }

    /// Validate a `type` name and raw `content` into a typed message
    pub fn parse(message_type: &str, content: Value) -> Result<Self> {
        if !MESSAGE_TYPES.contains(&message_type) {
            return Err(CoreError::UnsupportedMessageType(message_type.to_string()));
        }

        let content = match content {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        let tagged = serde_json::json!({ "type": message_type, "content": content });
        serde_json::from_value(tagged).map_err(|e| {
            CoreError::validation(format!("invalid content for '{}': {}", message_type, e))
        })
    }

    /// JSON form of the content alone
    pub fn content_value(&self) -> Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("content").map(Value::take))
            .unwrap_or(Value::Null)
    }
}

/// Raw wire form: `{sourceAgent, type, content, timestamp}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    source_agent: String,
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    timestamp: Option<f64>,
}

/// Immutable message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawEnvelope", try_from = "RawEnvelope")]
pub struct Envelope {
    source_agent: String,
    message: Message,
    timestamp: f64,
}

impl Envelope {
    /// Create a new envelope stamped with the current time
    pub fn new(source_agent: impl Into<String>, message: Message) -> Self {
        Self {
            source_agent: source_agent.into(),
            message,
            timestamp: now_epoch_secs(),
        }
    }

    /// Validate a raw JSON envelope
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawEnvelope = serde_json::from_value(value)
            .map_err(|e| CoreError::validation(format!("malformed envelope: {}", e)))?;
        Self::try_from(raw)
    }

    pub fn source_agent(&self) -> &str {
        &self.source_agent
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Consume the envelope, yielding its message
    pub fn into_message(self) -> Message {
        self.message
    }

    pub fn message_type(&self) -> &'static str {
        self.message.type_name()
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<Envelope> for RawEnvelope {
    fn from(envelope: Envelope) -> Self {
        let content = envelope.message.content_value();
        Self {
            source_agent: envelope.source_agent,
            message_type: envelope.message.type_name().to_string(),
            content,
            timestamp: Some(envelope.timestamp),
        }
    }
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = CoreError;

    fn try_from(raw: RawEnvelope) -> Result<Self> {
        let message = Message::parse(&raw.message_type, raw.content)?;
        Ok(Self {
            source_agent: raw.source_agent,
            message,
            timestamp: raw.timestamp.unwrap_or_else(now_epoch_secs),
        })
    }
}

/// Seconds since the Unix epoch with microsecond precision
pub fn now_epoch_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
