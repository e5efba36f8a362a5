//! Scripted model client for engine and runner tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::ai::client::{ModelClient, ModelRequest, ModelResponse};
use crate::ai::streaming::StreamPart;
use crate::ai::types::{AiToolCall, FinishReason};
use crate::error::{Error, Result};

pub(crate) mod scripted {
    use super::*;

    pub(crate) fn text(text: &str) -> ModelResponse {
        ModelResponse {
            text: text.to_string(),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: None,
        }
    }

    pub(crate) fn tool_calls(calls: Vec<AiToolCall>) -> ModelResponse {
        ModelResponse {
            text: String::new(),
            tool_calls: calls,
            finish_reason: FinishReason::ToolCalls,
            usage: None,
        }
    }
}

pub(crate) fn tool_call(id: &str, name: &str, arguments: Value) -> AiToolCall {
    AiToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

/// Replays canned responses in order and records every request.
pub(crate) struct ScriptedClient {
    script: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedClient {
    pub(crate) fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Triage hands off to math, math calls calc_sum(2, 3), then answers.
    pub(crate) fn two_plus_three() -> Self {
        Self::new(vec![
            scripted::tool_calls(vec![tool_call(
                "call_handoff",
                "transfer_to_mathagent",
                json!({}),
            )]),
            scripted::tool_calls(vec![tool_call("call_sum", "calc_sum", json!({"a": 2, "b": 3}))]),
            scripted::text("2 + 3 = 5"),
        ])
    }

    pub(crate) fn into_script(self) -> Vec<ModelResponse> {
        self.script.into_inner().unwrap().into()
    }

    pub(crate) fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Engine("script exhausted".into()))
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.next(request)
    }

    async fn complete_streaming(
        &self,
        request: &ModelRequest,
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>> {
        let response = self.next(request)?;
        let (tx, rx) = mpsc::unbounded_channel();
        for word in response.text.split_inclusive(' ') {
            let _ = tx.send(StreamPart::TextDelta {
                delta: word.to_string(),
            });
        }
        for tool_call in response.tool_calls {
            let _ = tx.send(StreamPart::ToolCallComplete { tool_call });
        }
        let _ = tx.send(StreamPart::Finish {
            reason: response.finish_reason,
        });
        Ok(rx)
    }
}
