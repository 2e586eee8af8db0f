//! Incremental Server-Sent Events (SSE) decoder for chat-completion streams.
//!
//! [`SseDecoder`] accepts raw body chunks in whatever sizes the network
//! delivers them and yields one [`StreamDelta`] per `data:` event that
//! carries `choices[0].delta.content`. Incomplete trailing lines are held
//! until the next [`feed`](SseDecoder::feed).
//!
//! Each `data:` payload must sit on a single line. A JSON payload broken by
//! a newline is two malformed payloads, both skipped. A partial line that
//! grows past [`MAX_LINE_BYTES`] before its terminator arrives is dropped
//! whole and counted as skipped.

use serde::Deserialize;
use tracing::{debug, trace};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Longest line held while waiting for its terminator.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One fragment of generated text from a single SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDelta(String);

impl StreamDelta {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Raw SSE data chunk from the chat-completions API.
#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<ChoiceDelta>,
}

#[derive(Deserialize, Debug)]
struct ChoiceDelta {
    content: Option<String>,
}

/// Stateful line splitter and `data:` payload parser.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    max_line: usize,
    /// Dropping the rest of an over-long line until its terminator.
    discarding: bool,
    done: bool,
    skipped: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that gives up on lines longer than `max_line` bytes.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
            discarding: false,
            done: false,
            skipped: 0,
        }
    }

    /// Append `chunk` and decode every line it completes.
    ///
    /// Input after the `[DONE]` sentinel is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamDelta> {
        let mut deltas = Vec::new();
        if self.done {
            return deltas;
        }
        self.buffer.extend_from_slice(chunk);

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if let Some(delta) = self.decode_line(&line) {
                deltas.push(delta);
            }
            if self.done {
                self.buffer.clear();
                break;
            }
        }

        // Anything left is the start of a line with no terminator yet.
        if self.discarding {
            self.buffer.clear();
        } else if self.buffer.len() > self.max_line {
            self.skipped += 1;
            debug!("Dropping SSE line over {} bytes", self.max_line);
            self.discarding = true;
            self.buffer.clear();
        }
        deltas
    }

    /// Decode whatever is left in the buffer as a final, unterminated line.
    pub fn finish(&mut self) -> Option<StreamDelta> {
        if self.done || self.discarding || self.buffer.is_empty() {
            self.buffer.clear();
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line)
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of `data:` payloads dropped because they did not parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<StreamDelta> {
        // Lines never contain '\n', so a multi-byte character cannot be split here.
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);

        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        let payload = line.strip_prefix(DATA_PREFIX)?;
        if payload.trim() == DONE_SENTINEL {
            trace!("SSE stream reached [DONE]");
            self.done = true;
            return None;
        }
        self.parse_payload(payload)
    }

    fn parse_payload(&mut self, payload: &str) -> Option<StreamDelta> {
        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => chunk
                .choices?
                .into_iter()
                .next()?
                .delta?
                .content
                .filter(|c| !c.is_empty())
                .map(StreamDelta),
            Err(e) => {
                self.skipped += 1;
                debug!("Skipping malformed SSE payload: {e} (data: {payload})");
                None
            }
        }
    }
}
