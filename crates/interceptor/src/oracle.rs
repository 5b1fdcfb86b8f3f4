//! InterceptedOracle - records every completion as an `LLM` API exchange

use serde_json::json;
use shared::{Oracle, OracleError, Outbox};
use std::sync::Arc;

const ENDPOINT: &str = "chat/completions";

/// Oracle wrapper that reports prompts and replies through an agent's outbox
pub struct InterceptedOracle {
    inner: Arc<dyn Oracle>,
    outbox: Outbox,
}

impl InterceptedOracle {
    pub fn new(inner: Arc<dyn Oracle>, outbox: Outbox) -> Self {
        Self { inner, outbox }
    }
}

impl Oracle for InterceptedOracle {
    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        self.outbox
            .api_call("LLM", ENDPOINT, &json!({ "prompt": prompt }));

        let reply = self.inner.complete(prompt);

        let response = match &reply {
            Ok(text) => json!({ "content": text }),
            Err(e) => json!({ "error": e.to_string() }),
        };
        self.outbox.api_response("LLM", ENDPOINT, &response);

        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventBus;
    use crate::history::InteractionKind;
    use shared::{ScriptedOracle, Tap};

    #[test]
    fn test_completion_is_recorded_as_llm_exchange() {
        let bus = Arc::new(EventBus::in_memory(10));
        let outbox = Outbox::new("UserAgent", Some(bus.clone() as Arc<dyn Tap>));
        let oracle = InterceptedOracle::new(Arc::new(ScriptedOracle::new().otherwise("pong")), outbox);

        assert_eq!(oracle.complete("ping").unwrap(), "pong");

        let calls = bus.api_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].kind, InteractionKind::ApiCall);
        assert_eq!(calls[0].source, "UserAgent");
        assert_eq!(calls[0].target, "LLM");
        assert!(calls[1].content.contains("pong"));
    }

    #[test]
    fn test_failure_is_recorded_and_returned() {
        let bus = Arc::new(EventBus::in_memory(10));
        let outbox = Outbox::new("CentralDispatcher", Some(bus.clone() as Arc<dyn Tap>));
        let oracle = InterceptedOracle::new(Arc::new(ScriptedOracle::new()), outbox);

        assert!(oracle.complete("ping").is_err());
        assert!(bus.api_calls()[1].content.contains("error"));
    }
}
