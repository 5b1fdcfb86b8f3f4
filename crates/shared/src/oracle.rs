//! Oracle - opaque text-completion collaborator
//!
//! The oracle may fail or return degraded output. Callers always have a
//! fallback path; nothing here is fatal.

use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport failed: {0}")]
    Transport(String),

    #[error("oracle returned malformed output: {0}")]
    Malformed(String),

    #[error("oracle not configured: {0}")]
    Unconfigured(String),
}

/// Text in, text out
pub trait Oracle: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Inner text of the first `<tag>...</tag>` block, or the whole reply trimmed
pub fn extract_tagged(response: &str, tag: &str) -> String {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    if let Some(start) = response.find(&open) {
        let body = &response[start + open.len()..];
        if let Some(end) = body.find(&close) {
            return body[..end].trim().to_string();
        }
    }
    response.trim().to_string()
}

/// Deterministic oracle answering from substring rules
///
/// The first rule whose needle occurs in the prompt wins. Without a match the
/// fallback reply is returned, or an error if there is none.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    rules: Vec<(String, String)>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: reply with `reply` when the prompt contains `needle`
    pub fn on(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((needle.into(), reply.into()));
        self
    }

    /// Builder: reply used when no rule matches
    pub fn otherwise(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// Prompts seen so far, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl Oracle for ScriptedOracle {
    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| OracleError::Transport("no scripted reply".to_string()))
    }
}
