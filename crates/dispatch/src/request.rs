//! Request classification - the closed request-type set and routing decisions
//!
//! A request moves through [`DispatchPhase`]s like a mission through the
//! game loop: it is observed, classified, routed to exactly one specialist
//! and then completes or fails. The phases are reported, never stored.

use serde::{Deserialize, Serialize};
use shared::AgentRole;

/// Every request type the dispatcher understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    MarketAnalysis,
    CoinInfo,
    WhaleAnalysis,
    ContractAnalysis,
    TransactionAnalysis,
    SetAlarm,
    TradeOperation,
    SqlQuery,
    Other,
}

impl RequestType {
    pub const ALL: [RequestType; 9] = [
        RequestType::MarketAnalysis,
        RequestType::CoinInfo,
        RequestType::WhaleAnalysis,
        RequestType::ContractAnalysis,
        RequestType::TransactionAnalysis,
        RequestType::SetAlarm,
        RequestType::TradeOperation,
        RequestType::SqlQuery,
        RequestType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::MarketAnalysis => "market_analysis",
            RequestType::CoinInfo => "coin_info",
            RequestType::WhaleAnalysis => "whale_analysis",
            RequestType::ContractAnalysis => "contract_analysis",
            RequestType::TransactionAnalysis => "transaction_analysis",
            RequestType::SetAlarm => "set_alarm",
            RequestType::TradeOperation => "trade_operation",
            RequestType::SqlQuery => "sql_query",
            RequestType::Other => "other",
        }
    }

    /// Exact member of the closed set, if `name` is one
    pub fn known(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    /// Parse a name, mapping anything outside the closed set to `Other`
    pub fn parse(name: &str) -> Self {
        Self::known(name).unwrap_or(RequestType::Other)
    }

    /// Specialist serving this type when the choice does not depend on parameters
    ///
    /// `transaction_analysis` picks between two specialists after extraction
    /// and `other` has no route.
    pub fn fixed_target(&self) -> Option<AgentRole> {
        match self {
            RequestType::MarketAnalysis | RequestType::CoinInfo => Some(AgentRole::CoinInfo),
            RequestType::WhaleAnalysis => Some(AgentRole::Whale),
            RequestType::ContractAnalysis => Some(AgentRole::Contract),
            RequestType::SetAlarm => Some(AgentRole::Alarm),
            RequestType::TradeOperation => Some(AgentRole::Trade),
            RequestType::SqlQuery => Some(AgentRole::DataStore),
            RequestType::TransactionAnalysis | RequestType::Other => None,
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a classified request goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub request_type: RequestType,
    pub target_agent: AgentRole,
    /// Parameters were missing and had to be extracted with the oracle
    pub needs_extraction: bool,
}

/// Per-request state of the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchPhase {
    Unclassified,
    Classified(RequestType),
    Routed(RoutingDecision),
    Completed,
    Failed { reason: String },
}

impl DispatchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchPhase::Completed | DispatchPhase::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============== RequestType Tests ==============

    #[test]
    fn test_parse_known_names() {
        for request_type in RequestType::ALL {
            assert_eq!(RequestType::parse(request_type.as_str()), request_type);
        }
        assert_eq!(RequestType::parse(" Coin_Info "), RequestType::CoinInfo);
    }

    #[test]
    fn test_unknown_names_become_other() {
        assert_eq!(RequestType::parse("launch_rocket"), RequestType::Other);
        assert_eq!(RequestType::parse(""), RequestType::Other);
        assert!(RequestType::known("unknown").is_none());
    }

    #[test]
    fn test_fixed_targets() {
        assert_eq!(RequestType::CoinInfo.fixed_target(), Some(AgentRole::CoinInfo));
        assert_eq!(RequestType::MarketAnalysis.fixed_target(), Some(AgentRole::CoinInfo));
        assert_eq!(RequestType::SqlQuery.fixed_target(), Some(AgentRole::DataStore));
        assert_eq!(RequestType::TransactionAnalysis.fixed_target(), None);
        assert_eq!(RequestType::Other.fixed_target(), None);
    }

    #[test]
    fn test_decision_serializes_camel_case() {
        let decision = RoutingDecision {
            request_type: RequestType::WhaleAnalysis,
            target_agent: AgentRole::Whale,
            needs_extraction: true,
        };
        let value = serde_json::to_value(decision).unwrap();

        assert_eq!(value["requestType"], "whale_analysis");
        assert_eq!(value["needsExtraction"], true);
    }
}
