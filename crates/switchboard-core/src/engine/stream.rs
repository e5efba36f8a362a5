//! Stream processing for engine runs
//!
//! Consumes `StreamPart`s from `ModelClient::complete_streaming`, forwarding
//! text deltas as they arrive and accumulating the full model turn.

use std::time::Duration;

use tokio::sync::mpsc;

use super::{EngineEvent, EventEmitter};
use crate::ai::client::ModelResponse;
use crate::ai::streaming::StreamPart;
use crate::error::{Error, Result};

const STREAM_TIMEOUT: Duration = Duration::from_secs(120);

/// Drain a model stream into a `ModelResponse`, emitting text deltas live.
pub(crate) async fn process_stream(
    mut api_rx: mpsc::UnboundedReceiver<StreamPart>,
    emitter: &EventEmitter,
) -> Result<ModelResponse> {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut usage = None;
    let mut finish_reason = None;

    loop {
        let part = match tokio::time::timeout(STREAM_TIMEOUT, api_rx.recv()).await {
            Ok(Some(part)) => part,
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Engine(format!(
                    "model stream timeout: no data received for {} seconds",
                    STREAM_TIMEOUT.as_secs()
                )));
            }
        };

        match part {
            StreamPart::TextDelta { delta } => {
                text.push_str(&delta);
                emitter.emit(EngineEvent::TextDelta { delta });
            }
            StreamPart::ToolCallStart { .. } => {}
            StreamPart::ToolCallComplete { tool_call } => tool_calls.push(tool_call),
            StreamPart::Usage { usage: u } => usage = Some(u),
            StreamPart::Finish { reason } => finish_reason = Some(reason),
            StreamPart::Error { error } => return Err(Error::Engine(error)),
        }
    }

    // A stream that closes without a finish part was cut off upstream.
    let finish_reason = finish_reason
        .ok_or_else(|| Error::Engine("model stream ended before completion".into()))?;

    Ok(ModelResponse {
        text,
        tool_calls,
        finish_reason,
        usage,
    })
}
