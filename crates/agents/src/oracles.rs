//! Oracle implementations backed by a chat-completions service
//!
//! [`HttpOracle`] talks to any OpenAI-compatible endpoint. [`MockOracle`]
//! stands in when no endpoint or key is configured, answering every prompt
//! with the same degraded reply so callers take their fallback paths.

use serde::{Deserialize, Serialize};
use shared::{Oracle, OracleConfig, OracleError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ChatResponse {
    fn into_content(self) -> Result<String, OracleError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| OracleError::Malformed("no completion choices returned".to_string()))
    }
}

/// OpenAI-compatible chat-completions client
pub struct HttpOracle {
    http: reqwest::blocking::Client,
    url: String,
    model: String,
    api_key: String,
}

impl HttpOracle {
    /// Build a client from config; fails when the endpoint or key is missing
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| OracleError::Unconfigured("no endpoint".to_string()))?;
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                OracleError::Unconfigured(format!("{} is not set", config.api_key_env))
            })?;

        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url: completions_url(endpoint),
            model: config.model.clone(),
            api_key,
        })
    }
}

/// Append `/chat/completions` unless the endpoint already names it
fn completions_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{}/chat/completions", trimmed)
    }
}

impl Oracle for HttpOracle {
    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.2,
        };

        debug!(url = %self.url, model = %self.model, "Sending completion request");
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            warn!(%status, "Completion request rejected");
            return Err(OracleError::Transport(format!("{} - {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        let content = parsed.into_content()?;
        debug!(chars = content.len(), "Completion received");
        Ok(content)
    }
}

/// Offline oracle returning a fixed degraded reply
#[derive(Debug, Clone)]
pub struct MockOracle {
    reply: String,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            reply: "<o>oracle offline: no analysis available</o>".to_string(),
        }
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl Oracle for MockOracle {
    fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
        Ok(self.reply.clone())
    }
}

/// The HTTP oracle when configured, otherwise the offline mock
pub fn oracle_from_config(config: &OracleConfig) -> Arc<dyn Oracle> {
    match HttpOracle::from_config(config) {
        Ok(oracle) => Arc::new(oracle),
        Err(e) => {
            warn!(reason = %e, "Falling back to offline oracle");
            Arc::new(MockOracle::new())
        }
    }
}
