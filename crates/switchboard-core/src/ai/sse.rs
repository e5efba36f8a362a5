//! Server-sent event line buffering
//!
//! Network chunks split SSE lines arbitrarily; `SseBuffer` reassembles them
//! and yields the payload of every complete `data:` line.

#[derive(Debug, Default)]
pub struct SseBuffer {
    pending: Vec<u8>,
}

/// Payload sentinel that terminates an OpenAI stream
pub const DONE_SENTINEL: &str = "[DONE]";

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the `data:` payloads completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(payload) = data_payload(&line[..line.len() - 1]) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.pending);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = String::from_utf8_lossy(line);
    let rest = text.strip_prefix("data:")?;
    let payload = rest.strip_prefix(' ').unwrap_or(rest);
    Some(payload.to_string())
}
