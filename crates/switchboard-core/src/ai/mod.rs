//! AI provider layer
//!
//! Conversation types plus an OpenAI-compatible chat/completions client used by
//! the completion engine.

pub mod client;
pub mod format;
pub mod parsers;
pub mod sse;
pub mod streaming;
pub mod types;

pub use client::{AiClient, AiClientConfig, ModelClient, ModelRequest, ModelResponse};
pub use streaming::StreamPart;
pub use types::{AiTool, AiToolCall, Content, ConversationItem, FinishReason, ModelMessage, Role, Usage};
