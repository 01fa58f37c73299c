//! Replay gateway — serves scripted delta streams instead of calling a model.
//!
//! Each `stream_completion` call consumes the next scripted response and
//! streams its deltas from a spawned task. Requests are recorded so callers
//! can inspect the prompts a turn produced.
//!
//! Script format (JSON):
//!
//! ```json
//! {"responses": [
//!   [{"tool_calls": [{"index": 0, "name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}]}],
//!   [{"content": "It's 18°C and sunny."}, {"done": true}]
//! ]}
//! ```

use async_trait::async_trait;
use parley_core::error::ModelError;
use parley_core::model::{Delta, ModelGateway, ModelRequest, ModelStream};
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ReplayScript {
    responses: Vec<Vec<Delta>>,
}

/// A model gateway that replays a fixed script of responses in order.
pub struct ReplayGateway {
    responses: Mutex<VecDeque<Vec<Delta>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ReplayGateway {
    pub fn new(responses: Vec<Vec<Delta>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A gateway that answers once with the given text.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![vec![Delta::content(text), Delta::done()]])
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let script: ReplayScript = serde_json::from_str(json)
            .map_err(|e| ModelError::NotConfigured(format!("invalid replay script: {e}")))?;
        Ok(Self::new(script.responses))
    }

    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ModelError::NotConfigured(format!("cannot read replay script {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ModelGateway for ReplayGateway {
    fn name(&self) -> &str {
        "replay"
    }

    async fn stream_completion(&self, request: ModelRequest) -> Result<ModelStream, ModelError> {
        let calls = {
            let mut requests = self
                .requests
                .lock()
                .map_err(|e| ModelError::NotConfigured(format!("replay state poisoned: {e}")))?;
            requests.push(request);
            requests.len()
        };
        let deltas = self
            .responses
            .lock()
            .map_err(|e| ModelError::NotConfigured(format!("replay state poisoned: {e}")))?
            .pop_front()
            .ok_or(ModelError::ScriptExhausted { calls: calls - 1 })?;

        debug!(call = calls, deltas = deltas.len(), "Replaying scripted response");
        let (tx, rx) = mpsc::channel(deltas.len().max(1));
        tokio::spawn(async move {
            for delta in deltas {
                if tx.send(Ok(delta)).await.is_err() {
                    return; // receiver dropped
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> ModelRequest {
        ModelRequest {
            model: "mock".into(),
            temperature: 0.7,
            max_tokens: None,
            prompt: prompt.into(),
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn replays_in_order_and_records_requests() {
        let gateway = ReplayGateway::new(vec![
            vec![Delta::content("one")],
            vec![Delta::content("two"), Delta::done()],
        ]);

        let mut first = gateway.stream_completion(request("a")).await.unwrap();
        assert_eq!(first.recv().await.unwrap().unwrap().content.as_deref(), Some("one"));
        assert!(first.recv().await.is_none());

        let mut second = gateway.stream_completion(request("b")).await.unwrap();
        assert_eq!(second.recv().await.unwrap().unwrap().content.as_deref(), Some("two"));
        assert!(second.recv().await.unwrap().unwrap().done);

        let prompts: Vec<_> = gateway.requests().into_iter().map(|r| r.prompt).collect();
        assert_eq!(prompts, vec!["a", "b"]);
        assert_eq!(gateway.remaining(), 0);
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let gateway = ReplayGateway::single_text("hi");
        gateway.stream_completion(request("a")).await.unwrap();

        let err = gateway.stream_completion(request("b")).await.unwrap_err();
        assert!(matches!(err, ModelError::ScriptExhausted { calls: 1 }));
        assert_eq!(gateway.call_count(), 2);
    }

    #[test]
    fn parses_json_script() {
        let gateway = ReplayGateway::from_json(
            r#"{"responses": [
                [{"tool_calls": [
                    {"index": 0, "id": "c0", "name": "get_weather", "arguments": "{}"}
                ]}],
                [{"content": "done"}, {"done": true}]
            ]}"#,
        )
        .unwrap();
        assert_eq!(gateway.remaining(), 2);
    }

    #[test]
    fn rejects_invalid_script() {
        assert!(matches!(
            ReplayGateway::from_json("{\"responses\": 3}"),
            Err(ModelError::NotConfigured(_))
        ));
    }
}
