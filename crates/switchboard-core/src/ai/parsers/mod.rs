//! Provider response parsers

pub mod openai;

pub use openai::{parse_chat_completion, OpenAIParser};
