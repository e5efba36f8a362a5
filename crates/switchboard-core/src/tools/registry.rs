//! Tool registry for managing available tools

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ai::types::AiTool;

/// Default tool execution timeout
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Tool execution result
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Create a success result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// Create a structured error with explicit code.
    pub fn error_with_code(code: &str, msg: impl std::fmt::Display) -> Self {
        let envelope = serde_json::json!({
            "ok": false,
            "error": {
                "code": code,
                "message": msg.to_string()
            }
        });
        Self {
            output: envelope.to_string(),
            is_error: true,
        }
    }

    /// Create an invalid-parameters error.
    pub fn invalid_parameters(msg: impl std::fmt::Display) -> Self {
        Self::error_with_code("invalid_parameters", msg)
    }

    pub fn error(msg: impl std::fmt::Display) -> Self {
        Self::error_with_code("tool_error", msg)
    }
}

/// Parse tool parameters, returning a ToolResult error on failure
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolResult> {
    serde_json::from_value(params)
        .map_err(|e| ToolResult::invalid_parameters(format!("Invalid parameters: {}", e)))
}

/// Trait for tool implementations
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (id)
    fn name(&self) -> &str;

    /// Tool description for AI
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool
    async fn execute(&self, params: Value) -> ToolResult;
}

/// Name-indexed set of tools, immutable once the gateway is running.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    default_timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            default_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Registry pre-populated with the built-in tools.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        for tool in super::builtin_tools() {
            registry.register(tool);
        }
        registry
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replaced existing tool registration");
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// AI tool definition for a registered tool
    pub fn ai_tool(&self, name: &str) -> Option<AiTool> {
        self.tools.get(name).map(|t| AiTool {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.parameters_schema(),
        })
    }

    /// Execute a tool by name with timeout. `None` if the tool is unknown.
    pub async fn execute(&self, name: &str, params: Value) -> Option<ToolResult> {
        let tool = self.get(name)?;
        let start = Instant::now();

        let result = match tokio::time::timeout(self.default_timeout, tool.execute(params)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    tool = name,
                    timeout_secs = self.default_timeout.as_secs(),
                    "Tool execution timed out"
                );
                ToolResult::error_with_code(
                    "timeout",
                    format!(
                        "Tool '{}' timed out after {} seconds",
                        name,
                        self.default_timeout.as_secs()
                    ),
                )
            }
        };

        tracing::debug!(
            tool = name,
            is_error = result.is_error,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tool executed"
        );
        Some(result)
    }
}
