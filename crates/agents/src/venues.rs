//! Paper execution venues
//!
//! Both venues validate parameters, record the API call they would make and
//! answer with a simulated receipt. Nothing leaves the process.

use serde_json::json;
use shared::{
    Agent, AgentResult, AgentRole, ApprovalParams, CoreError, Envelope, Message, OrderParams,
    OrderSide, Outbox, Tap, TransactionParams,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

const SUPPORTED_EXCHANGES: &[&str] = &["binance"];

fn simulated_tx_hash() -> String {
    format!("0x{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// On-chain wallet
pub struct WalletAgent {
    outbox: Outbox,
    active: Mutex<Option<String>>,
}

impl WalletAgent {
    pub fn new(tap: Option<Arc<dyn Tap>>) -> Self {
        Self {
            outbox: Outbox::new(AgentRole::Wallet.agent_name(), tap),
            active: Mutex::new(None),
        }
    }

    /// Builder: start with an active wallet
    pub fn with_wallet(self, address: impl Into<String>) -> Self {
        if let Ok(mut active) = self.active.lock() {
            *active = Some(address.into());
        }
        self
    }

    fn active(&self) -> shared::Result<String> {
        self.active
            .lock()
            .ok()
            .and_then(|a| a.clone())
            .ok_or_else(|| CoreError::validation("no active wallet; send set_wallet first"))
    }

    fn set_wallet(&self, address: &str) -> AgentResult {
        let address = address.trim();
        if address.is_empty() {
            return CoreError::validation("wallet address is required").into();
        }
        if let Ok(mut active) = self.active.lock() {
            *active = Some(address.to_string());
        }
        AgentResult::ok(format!("active wallet set to {}", address)).with("address", address)
    }

    fn submit(&self, params: &TransactionParams) -> AgentResult {
        let from = match self.active() {
            Ok(from) => from,
            Err(e) => return e.into(),
        };
        if params.to.trim().is_empty() {
            return CoreError::validation("transaction target is required").into();
        }

        let request = json!({
            "from": from,
            "to": params.to,
            "value": params.value,
            "data": params.data,
            "gasPrice": params.gas_price,
            "gas": params.gas_limit,
        });
        self.outbox.api_call("Web3", "eth_sendTransaction", &request);
        let tx_hash = simulated_tx_hash();
        self.outbox
            .api_response("Web3", "eth_sendTransaction", &json!({ "result": tx_hash }));

        info!(to = %params.to, tx_hash = %tx_hash, "Paper transaction submitted");
        AgentResult::ok("transaction submitted")
            .with("txHash", tx_hash)
            .with("from", from)
            .with("to", &params.to)
            .with("value", &params.value)
    }

    fn approve(&self, params: &ApprovalParams) -> AgentResult {
        let from = match self.active() {
            Ok(from) => from,
            Err(e) => return e.into(),
        };
        if params.token.trim().is_empty() || params.spender.trim().is_empty() {
            return CoreError::validation("token and spender are required").into();
        }

        let request = json!({
            "from": from,
            "to": params.token,
            "method": "approve",
            "spender": params.spender,
            "amount": params.amount,
        });
        self.outbox.api_call("Web3", "eth_sendTransaction", &request);
        let tx_hash = simulated_tx_hash();
        self.outbox
            .api_response("Web3", "eth_sendTransaction", &json!({ "result": tx_hash }));

        AgentResult::ok("approval submitted")
            .with("txHash", tx_hash)
            .with("token", &params.token)
            .with("spender", &params.spender)
            .with("amount", &params.amount)
    }

    fn balance(&self, asset: Option<&str>) -> AgentResult {
        let address = match self.active() {
            Ok(address) => address,
            Err(e) => return e.into(),
        };
        let asset = asset.unwrap_or("ETH");
        self.outbox
            .api_call("Web3", "eth_getBalance", &json!({ "address": address, "asset": asset }));
        self.outbox
            .api_response("Web3", "eth_getBalance", &json!({ "result": "0x0" }));

        AgentResult::success()
            .with("address", address)
            .with("asset", asset)
            .with("balance", 0.0)
    }
}

impl Agent for WalletAgent {
    fn name(&self) -> &str {
        self.outbox.sender()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Wallet
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.message() {
            Message::SetWallet { address } => self.set_wallet(address),
            Message::SubmitTransaction(params) => self.submit(params),
            Message::ApproveToken(params) => self.approve(params),
            Message::GetBalance { asset } => self.balance(asset.as_deref()),
            other => AgentResult::unsupported(other.type_name()),
        }
    }
}

#[derive(Clone)]
struct ExchangeSession {
    exchange: String,
    api_key: String,
    api_secret: Option<String>,
}

impl ExchangeSession {
    /// Credential fields sent with every exchange API call
    fn credentials(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut fields = serde_json::Map::new();
        fields.insert("api_key".to_string(), json!(self.api_key));
        if let Some(secret) = &self.api_secret {
            fields.insert("api_secret".to_string(), json!(secret));
        }
        fields
    }
}

/// Centralized exchange account
pub struct ExchangeAgent {
    outbox: Outbox,
    session: Mutex<Option<ExchangeSession>>,
    orders: Mutex<HashMap<String, OrderParams>>,
}

impl ExchangeAgent {
    pub fn new(tap: Option<Arc<dyn Tap>>) -> Self {
        Self {
            outbox: Outbox::new(AgentRole::Exchange.agent_name(), tap),
            session: Mutex::new(None),
            orders: Mutex::new(HashMap::new()),
        }
    }

    /// Builder: start with an active exchange session
    pub fn with_session(self, exchange: impl Into<String>, api_key: impl Into<String>) -> Self {
        if let Ok(mut session) = self.session.lock() {
            *session = Some(ExchangeSession {
                exchange: exchange.into().to_ascii_lowercase(),
                api_key: api_key.into(),
                api_secret: None,
            });
        }
        self
    }

    fn session(&self) -> shared::Result<ExchangeSession> {
        self.session
            .lock()
            .ok()
            .and_then(|s| s.clone())
            .ok_or_else(|| CoreError::validation("no active exchange; send set_exchange first"))
    }

    fn set_exchange(&self, exchange: &str, api_key: &str, api_secret: Option<&str>) -> AgentResult {
        let exchange = exchange.trim().to_ascii_lowercase();
        if exchange.is_empty() {
            return CoreError::validation("exchange name is required").into();
        }
        if api_key.trim().is_empty() || api_secret.is_some_and(|s| s.trim().is_empty()) {
            return CoreError::validation("missing API credentials").into();
        }
        if let Ok(mut session) = self.session.lock() {
            *session = Some(ExchangeSession {
                exchange: exchange.clone(),
                api_key: api_key.to_string(),
                api_secret: api_secret.map(str::to_string),
            });
        }
        AgentResult::ok(format!("active exchange set to {}", exchange)).with("exchange", exchange)
    }

    fn place(&self, params: &OrderParams) -> AgentResult {
        let session = match self.session() {
            Ok(session) => session,
            Err(e) => return e.into(),
        };
        let exchange = session.exchange.clone();
        if !SUPPORTED_EXCHANGES.contains(&exchange.as_str()) {
            return AgentResult::error(format!("unsupported exchange: {}", exchange));
        }
        if params.symbol.trim().is_empty() {
            return CoreError::validation("order symbol is required").into();
        }
        if params.quantity <= 0.0 {
            return CoreError::validation("order quantity must be positive").into();
        }
        let is_limit = params.order_type.eq_ignore_ascii_case("limit");
        if is_limit && params.price.is_none() {
            return CoreError::validation("limit orders need a price").into();
        }

        let side = match params.side {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        };
        let mut request = session.credentials();
        request.insert("symbol".to_string(), json!(params.symbol));
        request.insert("side".to_string(), json!(side));
        request.insert("type".to_string(), json!(params.order_type.to_ascii_uppercase()));
        request.insert("quantity".to_string(), json!(params.quantity));
        request.insert("price".to_string(), json!(if is_limit { params.price } else { None }));
        self.outbox
            .api_call("Exchange", "/api/v3/order", &serde_json::Value::Object(request));

        let order_id = Uuid::new_v4().to_string();
        self.outbox.api_response(
            "Exchange",
            "/api/v3/order",
            &json!({ "orderId": order_id, "status": "NEW" }),
        );
        if let Ok(mut orders) = self.orders.lock() {
            orders.insert(order_id.clone(), params.clone());
        }

        info!(exchange = %exchange, symbol = %params.symbol, side, order_id = %order_id, "Paper order placed");
        AgentResult::ok("order placed")
            .with("exchange", exchange)
            .with("orderId", order_id)
            .with("symbol", &params.symbol)
            .with("side", params.side)
            .with("quantity", params.quantity)
            .with("price", params.price)
            .with("orderStatus", "placed")
    }

    fn cancel(&self, order_id: &str) -> AgentResult {
        let session = match self.session() {
            Ok(session) => session,
            Err(e) => return e.into(),
        };
        let removed = self
            .orders
            .lock()
            .ok()
            .and_then(|mut orders| orders.remove(order_id));
        let order = match removed {
            Some(order) => order,
            None => return AgentResult::error(format!("unknown order: {}", order_id)),
        };

        let mut request = session.credentials();
        request.insert("orderId".to_string(), json!(order_id));
        request.insert("symbol".to_string(), json!(order.symbol));
        request.insert("method".to_string(), json!("DELETE"));
        self.outbox
            .api_call("Exchange", "/api/v3/order", &serde_json::Value::Object(request));
        self.outbox.api_response(
            "Exchange",
            "/api/v3/order",
            &json!({ "orderId": order_id, "status": "CANCELED" }),
        );

        AgentResult::ok("order cancelled")
            .with("exchange", session.exchange)
            .with("orderId", order_id)
            .with("symbol", order.symbol)
    }

    fn balance(&self, asset: Option<&str>) -> AgentResult {
        let session = match self.session() {
            Ok(session) => session,
            Err(e) => return e.into(),
        };
        self.outbox.api_call(
            "Exchange",
            "/api/v3/account",
            &serde_json::Value::Object(session.credentials()),
        );
        self.outbox
            .api_response("Exchange", "/api/v3/account", &json!({ "balances": [] }));

        let mut balances = serde_json::Map::new();
        balances.insert(asset.unwrap_or("USDT").to_string(), json!(0.0));
        AgentResult::success()
            .with("exchange", session.exchange)
            .with("balances", balances)
    }

    /// Number of open paper orders
    pub fn open_orders(&self) -> usize {
        self.orders.lock().map(|o| o.len()).unwrap_or_default()
    }
}

impl Agent for ExchangeAgent {
    fn name(&self) -> &str {
        self.outbox.sender()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Exchange
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.message() {
            Message::SetExchange {
                exchange,
                api_key,
                api_secret,
            } => self.set_exchange(exchange, api_key, api_secret.as_deref()),
            Message::PlaceOrder(params) => self.place(params),
            Message::CancelOrder { order_id } => self.cancel(order_id),
            Message::GetBalance { asset } => self.balance(asset.as_deref()),
            other => AgentResult::unsupported(other.type_name()),
        }
    }
}
