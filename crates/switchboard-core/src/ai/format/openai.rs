//! OpenAI chat/completions request format
//!
//! Converts conversation items into the provider's message list. Tool results
//! become one `tool` message per result; assistant tool calls carry their
//! arguments JSON-encoded as the API requires.

use serde_json::{json, Value};

use crate::ai::client::ModelRequest;
use crate::ai::types::{AiTool, Content, ModelMessage, Role};

pub struct OpenAIFormat;

impl OpenAIFormat {
    pub fn convert_messages(system_prompt: &str, messages: &[ModelMessage]) -> Vec<Value> {
        let mut result = Vec::with_capacity(messages.len() + 1);

        if !system_prompt.is_empty() {
            result.push(json!({"role": "system", "content": system_prompt}));
        }

        for msg in messages {
            let has_tool_results = msg
                .content
                .iter()
                .any(|c| matches!(c, Content::ToolResult { .. }));

            if has_tool_results {
                for content in &msg.content {
                    if let Content::ToolResult {
                        tool_use_id,
                        output,
                        ..
                    } = content
                    {
                        let output_str = match output {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        result.push(json!({
                            "role": "tool",
                            "tool_call_id": tool_use_id,
                            "content": output_str
                        }));
                    }
                }
                continue;
            }

            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            let text = msg.text();

            let tool_calls: Vec<Value> = msg
                .tool_uses()
                .map(|(id, name, input)| {
                    json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": input.to_string()
                        }
                    })
                })
                .collect();

            if !tool_calls.is_empty() && msg.role == Role::Assistant {
                let mut msg_obj = json!({
                    "role": "assistant",
                    "content": Value::Null,
                    "tool_calls": tool_calls
                });
                if !text.is_empty() {
                    msg_obj["content"] = json!(text);
                }
                result.push(msg_obj);
                continue;
            }

            result.push(json!({"role": role, "content": text}));
        }

        result
    }

    pub fn convert_tools(tools: &[AiTool]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema
                    }
                })
            })
            .collect()
    }

    /// Full request body for a chat/completions call
    pub fn build_request(
        model: &str,
        max_tokens: Option<usize>,
        request: &ModelRequest,
        stream: bool,
    ) -> Value {
        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(model),
            "messages": Self::convert_messages(&request.system_prompt, &request.messages),
        });

        if let Some(max_tokens) = max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = json!(Self::convert_tools(&request.tools));
        }

        if stream {
            body["stream"] = json!(true);
            body["stream_options"] = json!({"include_usage": true});
        }

        body
    }
}
