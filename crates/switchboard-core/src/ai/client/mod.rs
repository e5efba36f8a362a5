//! Model client
//!
//! `ModelClient` is the seam between the completion engine and a concrete
//! provider. `AiClient` talks to any OpenAI-compatible chat/completions API.

mod config;
mod simple;
mod streaming;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use config::AiClientConfig;

use crate::ai::streaming::StreamPart;
use crate::ai::types::{AiTool, AiToolCall, FinishReason, ModelMessage, Usage};
use crate::error::Result;

/// A single model invocation
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Model override; the client default is used when absent
    pub model: Option<String>,
    pub system_prompt: String,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<AiTool>,
}

/// A complete (non-streamed) model response
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub tool_calls: Vec<AiToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Option<Usage>,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse>;

    /// Start a streamed completion. The receiver yields parts in arrival order
    /// and closes when the response ends; dropping it stops the transfer.
    async fn complete_streaming(
        &self,
        request: &ModelRequest,
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>>;
}

/// HTTP client for OpenAI-compatible chat/completions endpoints
pub struct AiClient {
    http: reqwest::Client,
    config: AiClientConfig,
    api_key: String,
}

impl AiClient {
    pub fn new(config: AiClientConfig, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeouts: {}", e);
                reqwest::Client::new()
            });
        Self {
            http,
            config,
            api_key,
        }
    }

    fn post(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.http
            .post(self.config.api_url())
            .bearer_auth(&self.api_key)
            .json(body)
    }
}

#[async_trait]
impl ModelClient for AiClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.call(request).await
    }

    async fn complete_streaming(
        &self,
        request: &ModelRequest,
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>> {
        self.call_streaming(request).await
    }
}
