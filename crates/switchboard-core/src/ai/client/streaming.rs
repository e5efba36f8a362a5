//! Streaming API calls
//!
//! Reads the SSE body in a background task and forwards parsed parts through
//! an unbounded channel. A read or parse failure is forwarded as an explicit
//! `StreamPart::Error` so the receiver never waits on a silently dead stream.
//! A body that ends without `[DONE]` or a `finish_reason` was cut off and is
//! reported the same way.

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::simple::ensure_success;
use super::{AiClient, ModelRequest};
use crate::ai::format::OpenAIFormat;
use crate::ai::parsers::OpenAIParser;
use crate::ai::sse::{SseBuffer, DONE_SENTINEL};
use crate::ai::streaming::StreamPart;
use crate::error::Result;

impl AiClient {
    pub async fn call_streaming(
        &self,
        request: &ModelRequest,
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>> {
        let body = OpenAIFormat::build_request(
            &self.config.model,
            self.config.max_tokens,
            request,
            true,
        );
        let response = ensure_success(self.post(&body).send().await?).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(pump_sse(response.bytes_stream(), tx));
        Ok(rx)
    }
}

async fn pump_sse<S>(stream: S, tx: mpsc::UnboundedSender<StreamPart>)
where
    S: futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
{
    tokio::pin!(stream);
    let mut buffer = SseBuffer::new();
    let mut parser = OpenAIParser::new();
    let mut chunk_count: u64 = 0;
    let mut done = false;

    'read: while let Some(chunk) = stream.next().await {
        chunk_count += 1;
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("SSE read error at chunk #{}: {}", chunk_count, e);
                let _ = tx.send(StreamPart::Error {
                    error: format!("stream read error: {}", e),
                });
                return;
            }
        };

        for payload in buffer.push(&bytes) {
            if payload == DONE_SENTINEL {
                done = true;
                break 'read;
            }
            if !forward_payload(&payload, &mut parser, &tx) {
                return;
            }
        }
    }

    if !done {
        if let Some(payload) = buffer.finish() {
            if payload == DONE_SENTINEL {
                done = true;
            } else if !forward_payload(&payload, &mut parser, &tx) {
                return;
            }
        }
    }

    if !done && !parser.has_finish_reason() {
        warn!(chunks = chunk_count, "SSE body ended without [DONE] or finish_reason");
        let _ = tx.send(StreamPart::Error {
            error: "model stream ended before completion".to_string(),
        });
        return;
    }

    match parser.finish(done) {
        Ok(parts) => {
            for part in parts {
                if tx.send(part).is_err() {
                    return;
                }
            }
        }
        Err(e) => {
            let _ = tx.send(StreamPart::Error {
                error: e.to_string(),
            });
        }
    }
    debug!("SSE stream ended after {} chunks", chunk_count);
}

/// Parse and forward one payload. Returns false when the stream must stop.
fn forward_payload(
    payload: &str,
    parser: &mut OpenAIParser,
    tx: &mpsc::UnboundedSender<StreamPart>,
) -> bool {
    let json: serde_json::Value = match serde_json::from_str(payload) {
        Ok(json) => json,
        Err(e) => {
            warn!("Skipping unparseable SSE payload: {}", e);
            return true;
        }
    };

    match parser.parse_chunk(&json) {
        Ok(parts) => parts.into_iter().all(|part| tx.send(part).is_ok()),
        Err(e) => {
            let _ = tx.send(StreamPart::Error {
                error: e.to_string(),
            });
            false
        }
    }
}
