//! Switchboard core
//!
//! Session and agent routing for the Switchboard chat gateway:
//! - `auth` - HMAC session tokens
//! - `agent` - Agent graph with hand-off edges
//! - `tools` - Function tools agents may call
//! - `ai` - Conversation types and the chat/completions client
//! - `engine` - Completion engine that runs an agent (and its hand-offs)
//! - `session` - Concurrency-safe in-memory session store
//! - `runner` - One conversational turn: load, run, commit

pub mod agent;
pub mod ai;
pub mod auth;
pub mod engine;
pub mod error;
pub mod runner;
pub mod session;
pub mod tools;

pub use agent::{Agent, AgentId, AgentRegistry};
pub use auth::TokenAuthenticator;
pub use engine::{AgentEngine, CompletionEngine, EngineEvent, RunResult, StreamedRun};
pub use error::{Error, Result};
pub use runner::{ConversationRunner, TurnEvent, TurnOutput, TurnStream};
pub use session::{SessionState, SessionStore, SessionStoreConfig};
