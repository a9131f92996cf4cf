//! SSE (Server-Sent Events) parser for the notification push stream.
//!
//! Each event carries one JSON payload per `data:` line. Handles format
//! variations (e.g. `data:{...}` vs `data: {...}`) and bare JSON lines.

use crate::notifications::PushMessage;

/// Longest line the decoder buffers before giving up on it.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental decoder for a chunked SSE body.
///
/// Bytes are buffered until a full line is available, so a chunk boundary
/// may fall anywhere, including inside a UTF-8 sequence. A line longer than
/// the limit is dropped up to its terminating newline.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    max_line: usize,
    discarding: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_line_limit(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_limit(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
            discarding: false,
        }
    }

    /// Feed one chunk and return the messages completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<PushMessage> {
        let chunk = if self.discarding {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.discarding = false;
                    &chunk[end + 1..]
                }
                None => return Vec::new(),
            }
        } else {
            chunk
        };

        self.buffer.extend_from_slice(chunk);
        let events = match self.buffer.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => {
                let complete: Vec<u8> = self.buffer.drain(..=last_newline).collect();
                parse_sse_events(&complete)
            }
            None => Vec::new(),
        };
        self.enforce_line_limit();
        events
    }

    /// Bytes still waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn enforce_line_limit(&mut self) {
        if self.buffer.len() <= self.max_line {
            return;
        }
        tracing::warn!(
            bytes = self.buffer.len(),
            limit = self.max_line,
            "Dropping oversized push event line"
        );
        self.buffer.clear();
        self.discarding = true;
    }
}

/// Parse every complete push message in `bytes`.
pub fn parse_sse_events(bytes: &[u8]) -> Vec<PushMessage> {
    let text = String::from_utf8_lossy(bytes);
    text.lines().filter_map(parse_sse_line).collect()
}

/// Extract a push message from a line of text.
///
/// Tries two strategies:
/// 1. Parse the line as JSON directly
/// 2. Strip SSE `data:` prefix and parse the remainder
fn parse_sse_line(line: &str) -> Option<PushMessage> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    if let Ok(message) = serde_json::from_str(line) {
        return Some(message);
    }
    let data = line.strip_prefix("data:")?.trim_start();
    match serde_json::from_str(data) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable push event");
            None
        }
    }
}
