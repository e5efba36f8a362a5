//! OpenAI-compatible parser for chat/completions responses

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::ai::client::ModelResponse;
use crate::ai::streaming::StreamPart;
use crate::ai::types::{AiToolCall, FinishReason, Usage};

/// Accumulates one streamed tool call until its arguments are complete
#[derive(Debug)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn complete(self) -> Result<AiToolCall> {
        let arguments = parse_tool_arguments(&self.name, &self.arguments)?;
        Ok(AiToolCall {
            id: self.id,
            name: self.name,
            arguments,
        })
    }
}

/// Tool arguments arrive as a JSON-encoded string; empty means no arguments.
fn parse_tool_arguments(name: &str, raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
        .map_err(|e| anyhow!("malformed arguments for tool call '{}': {}", name, e))
}

fn api_error(json: &Value) -> Option<String> {
    let error = json.get("error")?;
    Some(
        error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    )
}

/// Stateful parser for one streamed chat/completions response
#[derive(Debug, Default)]
pub struct OpenAIParser {
    /// Keyed by the provider's tool call index, which also fixes ordering
    tool_calls: BTreeMap<u64, ToolCallAccumulator>,
    finish_reason: Option<FinishReason>,
}

impl OpenAIParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one `data:` chunk into stream parts.
    pub fn parse_chunk(&mut self, json: &Value) -> Result<Vec<StreamPart>> {
        if let Some(message) = api_error(json) {
            return Err(anyhow!("provider error: {}", message));
        }

        let mut parts = Vec::new();

        if let Some(usage) = json.get("usage").and_then(Usage::from_openai) {
            parts.push(StreamPart::Usage { usage });
        }

        let Some(choice) = json
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
        else {
            return Ok(parts);
        };

        if let Some(delta) = choice.get("delta") {
            if let Some(text) = delta.get("content").and_then(Value::as_str) {
                if !text.is_empty() {
                    parts.push(StreamPart::TextDelta {
                        delta: text.to_string(),
                    });
                }
            }

            if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
                for call in calls {
                    if let Some(part) = self.accumulate_tool_call(call) {
                        parts.push(part);
                    }
                }
            }
        }

        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            self.finish_reason = Some(FinishReason::from_openai(reason));
        }

        Ok(parts)
    }

    fn accumulate_tool_call(&mut self, call: &Value) -> Option<StreamPart> {
        let index = call
            .get("index")
            .and_then(Value::as_u64)
            .unwrap_or(self.tool_calls.len() as u64);
        let function = call.get("function");
        let name = function
            .and_then(|f| f.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let arguments = function
            .and_then(|f| f.get("arguments"))
            .and_then(Value::as_str)
            .unwrap_or("");

        let mut started = None;
        let acc = self.tool_calls.entry(index).or_insert_with(|| {
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{}", index));
            started = Some(id.clone());
            ToolCallAccumulator {
                id,
                name: String::new(),
                arguments: String::new(),
            }
        });

        acc.name.push_str(name);
        acc.arguments.push_str(arguments);

        started.map(|id| StreamPart::ToolCallStart {
            id,
            name: acc.name.clone(),
        })
    }

    /// True once a chunk has carried a `finish_reason`
    pub fn has_finish_reason(&self) -> bool {
        self.finish_reason.is_some()
    }

    /// Complete accumulated tool calls once the stream has ended.
    ///
    /// `Finish` is emitted only for a stream known to be complete: one that
    /// carried a `finish_reason`, or one terminated by `[DONE]` (`done`), in
    /// which case the reason follows from whether tool calls were made.
    pub fn finish(&mut self, done: bool) -> Result<Vec<StreamPart>> {
        let mut parts = Vec::new();
        for (_, acc) in std::mem::take(&mut self.tool_calls) {
            parts.push(StreamPart::ToolCallComplete {
                tool_call: acc.complete()?,
            });
        }

        let reason = match self.finish_reason.take() {
            Some(reason) => Some(reason),
            None if done && !parts.is_empty() => Some(FinishReason::ToolCalls),
            None if done => Some(FinishReason::Stop),
            None => None,
        };
        if let Some(reason) = reason {
            parts.push(StreamPart::Finish { reason });
        }
        Ok(parts)
    }
}

/// Parse a non-streaming chat/completions response body.
pub fn parse_chat_completion(json: &Value) -> Result<ModelResponse> {
    if let Some(message) = api_error(json) {
        return Err(anyhow!("provider error: {}", message));
    }

    let choice = json
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| anyhow!("response has no choices"))?;
    let message = choice
        .get("message")
        .ok_or_else(|| anyhow!("response choice has no message"))?;

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for (index, call) in calls.iter().enumerate() {
            let function = call
                .get("function")
                .ok_or_else(|| anyhow!("tool call without function"))?;
            let name = function
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("tool call without name"))?
                .to_string();
            let raw_args = function
                .get("arguments")
                .and_then(Value::as_str)
                .unwrap_or("");
            tool_calls.push(AiToolCall {
                id: call
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{}", index)),
                arguments: parse_tool_arguments(&name, raw_args)?,
                name,
            });
        }
    }

    let finish_reason = choice
        .get("finish_reason")
        .and_then(Value::as_str)
        .map(FinishReason::from_openai)
        .unwrap_or(FinishReason::Stop);

    Ok(ModelResponse {
        text,
        tool_calls,
        finish_reason,
        usage: json.get("usage").and_then(Usage::from_openai),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_deltas() {
        let mut parser = OpenAIParser::new();
        let parts = parser
            .parse_chunk(&json!({"choices": [{"index": 0, "delta": {"content": "Hel"}}]}))
            .unwrap();
        assert_eq!(
            parts,
            vec![StreamPart::TextDelta {
                delta: "Hel".into()
            }]
        );

        let parts = parser
            .parse_chunk(&json!({"choices": [{"index": 0, "delta": {"content": ""}, "finish_reason": "stop"}]}))
            .unwrap();
        assert!(parts.is_empty());

        assert_eq!(
            parser.finish(false).unwrap(),
            vec![StreamPart::Finish {
                reason: FinishReason::Stop
            }]
        );
    }

    #[test]
    fn test_tool_call_accumulation() {
        let mut parser = OpenAIParser::new();
        let start = parser
            .parse_chunk(&json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "id": "call_abc", "type": "function",
                 "function": {"name": "calc_sum", "arguments": ""}}
            ]}}]}))
            .unwrap();
        assert_eq!(
            start,
            vec![StreamPart::ToolCallStart {
                id: "call_abc".into(),
                name: "calc_sum".into()
            }]
        );

        for fragment in ["{\"a\": 2", ", \"b\": 3}"] {
            let parts = parser
                .parse_chunk(&json!({"choices": [{"delta": {"tool_calls": [
                    {"index": 0, "function": {"arguments": fragment}}
                ]}}]}))
                .unwrap();
            assert!(parts.is_empty());
        }
        parser
            .parse_chunk(&json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]}))
            .unwrap();

        let parts = parser.finish(false).unwrap();
        assert_eq!(
            parts,
            vec![
                StreamPart::ToolCallComplete {
                    tool_call: AiToolCall {
                        id: "call_abc".into(),
                        name: "calc_sum".into(),
                        arguments: json!({"a": 2, "b": 3}),
                    }
                },
                StreamPart::Finish {
                    reason: FinishReason::ToolCalls
                },
            ]
        );
    }

    #[test]
    fn test_parallel_tool_calls_keep_index_order() {
        let mut parser = OpenAIParser::new();
        parser
            .parse_chunk(&json!({"choices": [{"delta": {"tool_calls": [
                {"index": 1, "id": "second", "function": {"name": "get_time", "arguments": "{}"}},
                {"index": 0, "id": "first", "function": {"name": "transfer_to_mathagent", "arguments": ""}}
            ]}}]}))
            .unwrap();

        let ids: Vec<String> = parser
            .finish(true)
            .unwrap()
            .into_iter()
            .filter_map(|p| match p {
                StreamPart::ToolCallComplete { tool_call } => Some(tool_call.id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_malformed_arguments_fail() {
        let mut parser = OpenAIParser::new();
        parser
            .parse_chunk(&json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "id": "c", "function": {"name": "calc_sum", "arguments": "{\"a\": "}}
            ]}}]}))
            .unwrap();
        assert!(parser.finish(true).is_err());
    }

    #[test]
    fn test_finish_without_reason_or_done_reports_no_finish() {
        let mut parser = OpenAIParser::new();
        parser
            .parse_chunk(&json!({"choices": [{"delta": {"content": "2 + 3 ="}}]}))
            .unwrap();
        assert!(!parser.has_finish_reason());
        assert!(parser.finish(false).unwrap().is_empty());
    }

    #[test]
    fn test_done_without_reason_infers_it() {
        let mut parser = OpenAIParser::new();
        parser
            .parse_chunk(&json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "id": "c", "function": {"name": "get_time", "arguments": "{}"}}
            ]}}]}))
            .unwrap();
        let parts = parser.finish(true).unwrap();
        assert_eq!(
            parts.last(),
            Some(&StreamPart::Finish {
                reason: FinishReason::ToolCalls
            })
        );
    }

    #[test]
    fn test_usage_chunk_and_error_chunk() {
        let mut parser = OpenAIParser::new();
        let parts = parser
            .parse_chunk(&json!({"choices": [], "usage": {"prompt_tokens": 7, "completion_tokens": 3, "total_tokens": 10}}))
            .unwrap();
        assert!(matches!(&parts[..], [StreamPart::Usage { usage }] if usage.total_tokens == 10));

        let err = parser
            .parse_chunk(&json!({"error": {"message": "Rate limit reached"}}))
            .unwrap_err();
        assert!(err.to_string().contains("Rate limit reached"));
    }

    #[test]
    fn test_parse_chat_completion_with_tool_calls() {
        let body = json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "calc_sum", "arguments": "{\"a\":2,\"b\":3}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 5, "total_tokens": 25}
        });

        let response = parse_chat_completion(&body).unwrap();
        assert_eq!(response.text, "");
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].arguments, json!({"a": 2, "b": 3}));
        assert_eq!(response.usage.unwrap().total_tokens, 25);
    }

    #[test]
    fn test_parse_chat_completion_without_choices() {
        assert!(parse_chat_completion(&json!({"choices": []})).is_err());
    }
}
