//! Incremental output from a streaming model call

use crate::ai::types::{AiToolCall, FinishReason, Usage};

/// One unit of a streamed model response, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    TextDelta { delta: String },
    ToolCallStart { id: String, name: String },
    ToolCallComplete { tool_call: AiToolCall },
    Usage { usage: Usage },
    Finish { reason: FinishReason },
    Error { error: String },
}
