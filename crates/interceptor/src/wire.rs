//! MCP wire shape used for the persisted log and observer events

use crate::history::InteractionRecord;
use serde::{Deserialize, Serialize};
use shared::AgentRole;

/// One end of an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpEndpoint {
    pub id: String,
    #[serde(rename = "type")]
    pub agent_type: String,
}

impl McpEndpoint {
    pub fn of(id: &str) -> Self {
        Self {
            id: id.to_string(),
            agent_type: agent_type_of(id).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpMetadata {
    pub priority: String,
    pub processed: bool,
}

impl Default for McpMetadata {
    fn default() -> Self {
        Self {
            priority: "normal".to_string(),
            processed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpMessage {
    pub version: String,
    pub protocol_id: String,
    pub message_id: String,
    pub timestamp: f64,
    pub source: McpEndpoint,
    pub target: McpEndpoint,
    #[serde(rename = "type")]
    pub message_type: String,
    pub content: String,
    pub metadata: McpMetadata,
}

impl McpMessage {
    /// Wrap a record with a fresh message id
    pub fn from_record(record: &InteractionRecord) -> Self {
        Self {
            version: "1.0".to_string(),
            protocol_id: "MCP".to_string(),
            message_id: uuid::Uuid::new_v4().to_string(),
            timestamp: record.timestamp,
            source: McpEndpoint::of(&record.source),
            target: McpEndpoint::of(&record.target),
            message_type: record.kind.as_str().to_string(),
            content: record.content.clone(),
            metadata: McpMetadata::default(),
        }
    }
}

/// Agent category of a registered name or a well-known external endpoint
pub fn agent_type_of(id: &str) -> &'static str {
    if let Some(role) = AgentRole::from_agent_name(id) {
        return role.category();
    }
    match id {
        "LLM" | "Web3" | "Exchange" | "BlockchainAPI" => "external_service",
        "System" => "system",
        "User" | "Client" => "user",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InteractionKind;

    #[test]
    fn test_from_record_shape() {
        let record = InteractionRecord {
            source: "CentralDispatcher".to_string(),
            target: "WhaleAgent".to_string(),
            content: "{}".to_string(),
            kind: InteractionKind::Message,
            timestamp: 1.5,
        };

        let value = serde_json::to_value(McpMessage::from_record(&record)).unwrap();

        assert_eq!(value["version"], "1.0");
        assert_eq!(value["protocolId"], "MCP");
        assert!(uuid::Uuid::parse_str(value["messageId"].as_str().unwrap()).is_ok());
        assert_eq!(value["source"]["id"], "CentralDispatcher");
        assert_eq!(value["source"]["type"], "central");
        assert_eq!(value["target"]["type"], "specialist");
        assert_eq!(value["type"], "message");
        assert_eq!(value["metadata"]["priority"], "normal");
        assert_eq!(value["metadata"]["processed"], false);
    }

    #[test]
    fn test_agent_type_of_external() {
        assert_eq!(agent_type_of("LLM"), "external_service");
        assert_eq!(agent_type_of("AlarmAgent"), "notification");
        assert_eq!(agent_type_of("Nobody"), "unknown");
    }
}
