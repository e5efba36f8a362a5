//! Default completion engine
//!
//! Runs the agent loop against a `ModelClient`: ask the active agent's model,
//! execute the function tools it calls, follow the first hand-off it requests,
//! and repeat until a response carries no tool calls.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::stream::process_stream;
use super::{CompletionEngine, EngineEvent, EventEmitter, RunResult, StreamedRun};
use crate::agent::handoff::{handoff_output, handoff_tool, MULTIPLE_HANDOFFS_OUTPUT};
use crate::agent::{Agent, AgentRegistry};
use crate::ai::client::{ModelClient, ModelRequest, ModelResponse};
use crate::ai::types::{AiToolCall, Content, ConversationItem, ModelMessage, Role};
use crate::error::{Error, Result};
use crate::tools::ToolRegistry;

/// Model round trips allowed per run
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Agent loop over a model client. Cheap to clone.
#[derive(Clone)]
pub struct AgentEngine {
    client: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    agents: Arc<AgentRegistry>,
    max_turns: usize,
}

impl AgentEngine {
    pub fn new(
        client: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        agents: Arc<AgentRegistry>,
    ) -> Self {
        Self {
            client,
            tools,
            agents,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    fn request_for(&self, agent: &Agent, items: &[ConversationItem]) -> ModelRequest {
        let tools = agent
            .tools
            .iter()
            .filter_map(|name| self.tools.ai_tool(name))
            .chain(self.agents.handoff_targets(agent.id).map(|t| handoff_tool(t)))
            .collect();

        ModelRequest {
            model: agent.model.clone(),
            system_prompt: agent.instructions.clone(),
            messages: items.to_vec(),
            tools,
        }
    }

    async fn ask_model(
        &self,
        request: &ModelRequest,
        emitter: &EventEmitter,
    ) -> Result<ModelResponse> {
        if emitter.is_streaming() {
            let parts = self.client.complete_streaming(request).await?;
            process_stream(parts, emitter).await
        } else {
            self.client.complete(request).await
        }
    }

    async fn run_loop(
        &self,
        mut agent: Arc<Agent>,
        mut items: Vec<ConversationItem>,
        emitter: &EventEmitter,
    ) -> Result<RunResult> {
        for turn in 1..=self.max_turns {
            let request = self.request_for(&agent, &items);
            debug!(
                agent = %agent.name,
                turn,
                items = items.len(),
                tools = request.tools.len(),
                "Calling model"
            );

            let response = self.ask_model(&request, emitter).await?;

            let assistant = assistant_item(&response.text, &response.tool_calls);
            if !assistant.content.is_empty() {
                items.push(assistant);
            }

            if response.tool_calls.is_empty() {
                return Ok(RunResult {
                    final_output: response.text,
                    items,
                    last_agent: agent.name.clone(),
                });
            }

            let (results, next_agent) = self.execute_calls(&agent, &response.tool_calls, emitter).await?;
            items.push(ModelMessage {
                role: Role::Tool,
                content: results,
            });

            if let Some(next) = next_agent {
                info!(from = %agent.name, to = %next.name, "Hand-off");
                emitter.emit(EngineEvent::AgentUpdated {
                    agent: next.name.clone(),
                });
                agent = next;
            }
        }

        Err(Error::MaxTurnsExceeded(self.max_turns))
    }

    /// Execute one response's tool calls in order. Returns the tool results and
    /// the hand-off target, if any call requested one.
    async fn execute_calls(
        &self,
        agent: &Agent,
        calls: &[AiToolCall],
        emitter: &EventEmitter,
    ) -> Result<(Vec<Content>, Option<Arc<Agent>>)> {
        let mut results = Vec::with_capacity(calls.len());
        let mut next_agent: Option<Arc<Agent>> = None;

        for call in calls {
            emitter.emit(EngineEvent::ToolCalled {
                id: call.id.clone(),
                name: call.name.clone(),
            });

            let (output, is_error) = if agent.tools.iter().any(|t| t == &call.name) {
                let result = self
                    .tools
                    .execute(&call.name, call.arguments.clone())
                    .await
                    .ok_or_else(|| {
                        Error::Engine(format!("tool '{}' is not registered", call.name))
                    })?;
                (Value::String(result.output), result.is_error)
            } else if let Some(target) = self
                .agents
                .handoff_targets(agent.id)
                .find(|t| t.handoff_tool_name() == call.name)
            {
                if next_agent.is_some() {
                    (Value::String(MULTIPLE_HANDOFFS_OUTPUT.to_string()), false)
                } else {
                    next_agent = Some(target.clone());
                    (handoff_output(target), false)
                }
            } else {
                return Err(Error::Engine(format!(
                    "agent '{}' called unknown tool '{}'",
                    agent.name, call.name
                )));
            };

            emitter.emit(EngineEvent::ToolOutput {
                id: call.id.clone(),
                output: match &output {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
                is_error,
            });
            results.push(Content::ToolResult {
                tool_use_id: call.id.clone(),
                output,
                is_error: is_error.then_some(true),
            });
        }

        Ok((results, next_agent))
    }
}

fn assistant_item(text: &str, tool_calls: &[AiToolCall]) -> ModelMessage {
    let mut content = Vec::with_capacity(tool_calls.len() + 1);
    if !text.is_empty() {
        content.push(Content::Text {
            text: text.to_string(),
        });
    }
    content.extend(tool_calls.iter().map(|call| Content::ToolUse {
        id: call.id.clone(),
        name: call.name.clone(),
        input: call.arguments.clone(),
    }));
    ModelMessage {
        role: Role::Assistant,
        content,
    }
}

#[async_trait]
impl CompletionEngine for AgentEngine {
    async fn run(&self, agent: Arc<Agent>, input: Vec<ConversationItem>) -> Result<RunResult> {
        self.run_loop(agent, input, &EventEmitter::noop()).await
    }

    fn run_streamed(&self, agent: Arc<Agent>, input: Vec<ConversationItem>) -> StreamedRun {
        let engine = self.clone();
        StreamedRun::spawn(move |emitter| async move {
            engine.run_loop(agent, input, &emitter).await
        })
    }
}
