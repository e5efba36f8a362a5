//! Completion engine
//!
//! The engine executes an agent against a conversation and reports the full
//! resulting item sequence plus the agent that ended up responsible. Hand-offs
//! happen inside the engine; callers only see the final agent.
//!
//! - `CompletionEngine` - the seam the conversation runner depends on
//! - `StreamedRun` - handle over a running streamed execution
//! - `AgentEngine` - default implementation driving a `ModelClient`

mod agent_engine;
mod run;
mod stream;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;

pub use agent_engine::{AgentEngine, DEFAULT_MAX_TURNS};
pub use run::{EventEmitter, StreamedRun};

use crate::agent::Agent;
use crate::ai::types::ConversationItem;
use crate::error::Result;

/// Outcome of a completed engine run
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    /// Text of the last assistant message
    pub final_output: String,
    /// Input items followed by everything the run produced
    pub items: Vec<ConversationItem>,
    /// Name of the agent active when the run ended
    pub last_agent: String,
}

/// Events observed while a streamed run is in progress
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    TextDelta {
        delta: String,
    },
    ToolCalled {
        id: String,
        name: String,
    },
    ToolOutput {
        id: String,
        output: String,
        is_error: bool,
    },
    AgentUpdated {
        agent: String,
    },
}

#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Run `agent` against `input` to completion.
    async fn run(&self, agent: Arc<Agent>, input: Vec<ConversationItem>) -> Result<RunResult>;

    /// Start a streamed run. Events arrive through the handle while the run
    /// progresses; dropping the handle cancels it.
    fn run_streamed(&self, agent: Arc<Agent>, input: Vec<ConversationItem>) -> StreamedRun;
}
