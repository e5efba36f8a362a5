//! Agent graph
//!
//! - `Agent` - immutable named policy (instructions, tools, hand-off targets)
//! - `AgentId` - index into the registry, used for forward references
//! - `AgentRegistry` - read-only graph built once at startup in two passes
//! - `handoff` - hand-off tool naming and the shared system prompt prefix
//! - `default_registry` - the triage/math/time graph served by default

pub mod defaults;
pub mod handoff;
pub mod registry;

use std::fmt;

pub use defaults::default_registry;
pub use handoff::{handoff_tool_name, prompt_with_handoff_instructions};
pub use registry::{AgentRegistry, AgentRegistryBuilder};

/// Index of an agent inside its `AgentRegistry`.
///
/// Only the registry builder hands these out, so an id always refers to an
/// agent declared in the same builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub(crate) usize);

impl AgentId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Declaration of an agent before its hand-off edges are known
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub name: String,
    pub instructions: String,
    pub tools: Vec<String>,
    pub handoff_description: Option<String>,
    pub model: Option<String>,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            tools: Vec::new(),
            handoff_description: None,
            model: None,
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_handoff_description(mut self, description: impl Into<String>) -> Self {
        self.handoff_description = Some(description.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A fully wired agent. Shared read-only across all sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    /// System prompt, already prefixed with the hand-off instructions
    pub instructions: String,
    /// Names of tools in the `ToolRegistry` this agent may call
    pub tools: Vec<String>,
    /// Agents this one may transfer the conversation to
    pub handoffs: Vec<AgentId>,
    pub handoff_description: Option<String>,
    /// Model override; the engine default applies when absent
    pub model: Option<String>,
}

impl Agent {
    /// Name of the tool other agents call to hand off to this one
    pub fn handoff_tool_name(&self) -> String {
        handoff_tool_name(&self.name)
    }
}
