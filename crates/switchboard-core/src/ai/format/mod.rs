//! Request formatting for provider APIs

pub mod openai;

pub use openai::OpenAIFormat;
