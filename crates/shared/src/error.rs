//! Error types for Sentinel

use thiserror::Error;

/// Error raised when a required collaborator is not wired
#[derive(Debug, Error)]
#[error("capability unavailable: {capability}")]
pub struct CapabilityUnavailableError {
    pub capability: String,
}

impl CapabilityUnavailableError {
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
        }
    }
}

/// General Sentinel error type
///
/// None of these are fatal to the process. At an agent boundary they are
/// converted into an error [`crate::AgentResult`] carrying `errorKind`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    CapabilityUnavailable(#[from] CapabilityUnavailableError),

    #[error("oracle degraded: {0}")]
    OracleDegraded(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(String),

    #[error("re-entrant dispatch: '{agent}' is already handling '{message_type}'")]
    Reentrant { agent: String, message_type: String },

    #[error("wiring error: {0}")]
    Wiring(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CoreError {
    /// Stable snake_case name of the error category
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation_error",
            CoreError::CapabilityUnavailable(_) => "capability_unavailable",
            CoreError::OracleDegraded(_) => "oracle_degraded",
            CoreError::Store(_) => "store_error",
            CoreError::UnsupportedMessageType(_) => "unsupported_message_type",
            CoreError::Reentrant { .. } => "reentrant_dispatch",
            CoreError::Wiring(_) => "wiring_error",
            CoreError::Config(_) => "config_error",
            CoreError::Io(_) => "io_error",
            CoreError::Json(_) => "json_error",
            CoreError::Yaml(_) => "yaml_error",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn unavailable(capability: impl Into<String>) -> Self {
        CoreError::CapabilityUnavailable(CapabilityUnavailableError::new(capability))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_message() {
        let err = CoreError::unavailable("coin_info");
        assert_eq!(err.to_string(), "capability unavailable: coin_info");
        assert_eq!(err.kind(), "capability_unavailable");
    }

    #[test]
    fn test_unsupported_message() {
        let err = CoreError::UnsupportedMessageType("launch_rocket".to_string());
        assert!(err.to_string().starts_with("unsupported message type"));
    }

    #[test]
    fn test_reentrant_message_names_agent() {
        let err = CoreError::Reentrant {
            agent: "CentralDispatcher".to_string(),
            message_type: "user_request".to_string(),
        };
        assert!(err.to_string().contains("CentralDispatcher"));
        assert!(err.to_string().contains("user_request"));
    }
}
