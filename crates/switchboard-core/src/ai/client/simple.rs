//! Non-streaming API calls

use tracing::debug;

use super::{AiClient, ModelRequest, ModelResponse};
use crate::ai::format::OpenAIFormat;
use crate::ai::parsers::parse_chat_completion;
use crate::error::{Error, Result};

/// Turn a non-2xx response into an engine error carrying the provider's body.
pub(super) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Engine(format!("API error {}: {}", status, body)))
}

impl AiClient {
    /// One chat/completions round trip
    pub async fn call(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let body = OpenAIFormat::build_request(
            &self.config.model,
            self.config.max_tokens,
            request,
            false,
        );
        debug!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            "chat/completions request"
        );

        let response = ensure_success(self.post(&body).send().await?).await?;
        let body = response.bytes().await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;

        parse_chat_completion(&json).map_err(|e| Error::Engine(e.to_string()))
    }
}
