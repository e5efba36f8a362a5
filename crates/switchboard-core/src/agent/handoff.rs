//! Hand-off conventions
//!
//! A hand-off is exposed to the model as a parameterless tool named
//! `transfer_to_<agent>`. Calling it moves the conversation to that agent.

use serde_json::{json, Value};

use super::Agent;
use crate::ai::types::AiTool;

/// System prompt prefix shared by every agent in a multi-agent graph
pub const HANDOFF_PROMPT_PREFIX: &str = "# System context\n\
You are part of a multi-agent system designed to make agent coordination and execution easy. \
It uses two primary abstractions: **Agents** and **Handoffs**. An agent encompasses \
instructions and tools and can hand off a conversation to another agent when appropriate. \
Handoffs are achieved by calling a handoff function, generally named `transfer_to_<agent_name>`. \
Transfers between agents are handled seamlessly in the background; do not mention or draw \
attention to these transfers in your conversation with the user.\n";

/// Output recorded for a hand-off call that lost to an earlier one in the
/// same model response
pub const MULTIPLE_HANDOFFS_OUTPUT: &str = "Multiple handoffs detected, ignoring this one.";

pub fn prompt_with_handoff_instructions(instructions: &str) -> String {
    format!("{}\n\n{}", HANDOFF_PROMPT_PREFIX, instructions)
}

/// `transfer_to_` + the agent name, lowercased, with every character outside
/// `[A-Za-z0-9]` replaced by `_`.
pub fn handoff_tool_name(agent_name: &str) -> String {
    let suffix: String = agent_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("transfer_to_{}", suffix)
}

/// Tool definition the model sees for a hand-off to `target`
pub fn handoff_tool(target: &Agent) -> AiTool {
    let mut description = format!(
        "Handoff to the {} agent to handle the request.",
        target.name
    );
    if let Some(extra) = &target.handoff_description {
        description.push(' ');
        description.push_str(extra);
    }

    AiTool {
        name: target.handoff_tool_name(),
        description,
        input_schema: json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false,
            "required": []
        }),
    }
}

/// Tool output recorded when a hand-off to `target` is taken
pub fn handoff_output(target: &Agent) -> Value {
    json!({ "assistant": target.name })
}
