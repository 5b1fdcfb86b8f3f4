//! TradeExecutor - routes trade requests to an execution venue
//!
//! Successful trades are reported back to central with
//! `command_execution_result`. That back-edge is what makes the topology
//! cyclic; the re-entrancy guard in [`Outbox::send`] keeps it from looping.

use shared::{
    Agent, AgentHandle, AgentResult, AgentRole, ApprovalParams, CoreError, Envelope,
    ExecutionReport, Message, OrderParams, OrderSide, Outbox, Peer, Tap, TradeParams,
    TransactionParams,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Allowance granted when an approval names no amount (2^256 - 1)
pub const MAX_UINT256: &str =
    "115792089237316195423570985008687907853269984665640564039457584007913129639935";

pub struct TradeExecutor {
    outbox: Outbox,
    exchange: Peer,
    wallet: Peer,
    central: Peer,
}

impl TradeExecutor {
    pub fn new(tap: Option<Arc<dyn Tap>>) -> Self {
        Self {
            outbox: Outbox::new(AgentRole::Trade.agent_name(), tap),
            exchange: Peer::new(),
            wallet: Peer::new(),
            central: Peer::new(),
        }
    }

    pub fn wire_exchange(&self, exchange: &AgentHandle) -> shared::Result<()> {
        self.exchange.wire(exchange)
    }

    pub fn wire_wallet(&self, wallet: &AgentHandle) -> shared::Result<()> {
        self.wallet.wire(wallet)
    }

    /// Wire the agent that receives execution reports
    pub fn wire_central(&self, central: &AgentHandle) -> shared::Result<()> {
        self.central.wire(central)
    }

    // ============== Execution ==============

    fn execute(&self, params: &TradeParams) -> AgentResult {
        let (target, action) = match (params.target.as_deref(), params.action.as_deref()) {
            (Some(target), Some(action)) => (target.to_ascii_lowercase(), action.to_ascii_lowercase()),
            _ => return CoreError::validation("trade target and action are required").into(),
        };

        debug!(venue = %target, action = %action, "Executing trade");
        match target.as_str() {
            "cex" => self.execute_cex(&action, params),
            "dex" => self.execute_dex(&action, params),
            other => AgentResult::error(format!("unsupported trade target: {}", other)),
        }
    }

    fn execute_cex(&self, action: &str, params: &TradeParams) -> AgentResult {
        let side = match action {
            "buy" => OrderSide::Buy,
            "sell" => OrderSide::Sell,
            other => return AgentResult::error(format!("unsupported CEX action: {}", other)),
        };
        let (symbol, quantity) = match (params.symbol.as_deref(), params.quantity) {
            (Some(symbol), Some(quantity)) => (symbol.to_string(), quantity),
            _ => return CoreError::validation("CEX trades need a symbol and a quantity").into(),
        };

        let order = OrderParams {
            symbol: symbol.clone(),
            side,
            order_type: params
                .order_type
                .clone()
                .unwrap_or_else(|| "limit".to_string()),
            quantity,
            price: params.price,
        };
        let result = self
            .outbox
            .send_to(&self.exchange, "exchange", Message::PlaceOrder(order));
        self.report("cex_trade", action, Some(symbol), &result);
        result
    }

    fn execute_dex(&self, action: &str, params: &TradeParams) -> AgentResult {
        let message = match action {
            "approve" => {
                let (token, spender) = match (params.token.as_deref(), params.spender.as_deref()) {
                    (Some(token), Some(spender)) => (token.to_string(), spender.to_string()),
                    _ => return CoreError::validation("approvals need a token and a spender").into(),
                };
                Message::ApproveToken(ApprovalParams {
                    token,
                    spender,
                    amount: params
                        .amount
                        .clone()
                        .unwrap_or_else(|| MAX_UINT256.to_string()),
                })
            }
            "swap" => {
                let router = match params.router.as_deref() {
                    Some(router) => router.to_string(),
                    None => return CoreError::validation("swaps need a router address").into(),
                };
                Message::SubmitTransaction(TransactionParams {
                    to: router,
                    value: params.value.clone().unwrap_or_else(|| "0".to_string()),
                    data: params.data.clone().unwrap_or_else(|| "0x".to_string()),
                    gas_price: None,
                    gas_limit: None,
                })
            }
            other => return AgentResult::error(format!("unsupported DEX action: {}", other)),
        };

        let result = self.outbox.send_to(&self.wallet, "wallet", message);
        self.report("dex_trade", action, params.symbol.clone(), &result);
        result
    }

    /// Tell central about a completed trade
    fn report(&self, operation: &str, action: &str, symbol: Option<String>, result: &AgentResult) {
        if !result.is_success() {
            return;
        }
        let Some(central) = self.central.get() else {
            return;
        };

        info!(operation, action, "Trade executed, reporting to central");
        let report = ExecutionReport {
            operation: operation.to_string(),
            action: action.to_string(),
            symbol,
            result: result.clone(),
        };
        self.outbox
            .send(&central, Message::CommandExecutionResult(report));
    }
}

impl Agent for TradeExecutor {
    fn name(&self) -> &str {
        self.outbox.sender()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Trade
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.message() {
            Message::ExecuteTrade(params) => self.execute(params),
            other => AgentResult::unsupported(other.type_name()),
        }
    }
}
