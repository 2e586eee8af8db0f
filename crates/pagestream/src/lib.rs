//! Relay a streamed chat completion into a live HTML response.
//!
//! `pagestream` turns a request path into a generated page. It asks an
//! OpenAI-compatible chat-completions API for a streamed answer, decodes the
//! Server-Sent Events as they arrive, and re-emits the text deltas as a byte
//! stream the caller can forward to a browser without waiting for the end.
//! Upstream trouble before the first byte becomes a self-contained HTML
//! error document instead.
//!
//! # Getting started
//!
//! ```ignore
//! use pagestream::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let generator = PageGenerator::new(RelayConfig::from_env())
//!         .map_err(|e| e.to_string())?;
//!
//!     match generator.generate("/about", "curl/8.0").await {
//!         PageOutcome::Streaming(mut session) => {
//!             let mut stdout = tokio::io::stdout();
//!             session.pipe_to(&mut stdout).await.map_err(|e| e.to_string())?;
//!         }
//!         PageOutcome::Fallback { status, html } => {
//!             eprintln!("HTTP {status}");
//!             println!("{html}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Issue the upstream request:** [`api::transport`] holds the
//!   [`Transport`](api::transport::Transport) seam, the reqwest-backed
//!   [`HttpTransport`](api::transport::HttpTransport), and the per-attempt
//!   deadline.
//! - **Retry transient failures:** [`api::retry::execute`] with
//!   [`RetryConfig`](api::retry::RetryConfig); failures are classified by
//!   [`api::failure`].
//! - **Parse SSE:** [`SseDecoder`](api::streaming::SseDecoder).
//! - **Forward deltas:** [`RelaySession`](relay::RelaySession), either as a
//!   `Stream` of bytes or piped into any `AsyncWrite`.
//! - **Render errors:** [`fallback::render`].
//! - **Tie it together:** [`PageGenerator`](generate::PageGenerator).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Transport with deadline, failure classification, retry, SSE decoding |
//! | [`relay`] | Per-session decode-and-forward loop |
//! | [`fallback`] | HTML error document |
//! | [`generate`] | `generate(path, user_agent)` entry point |
//! | [`config`] | [`RelayConfig`](config::RelayConfig), read once from the environment |
//! | [`prompt`] | [`PromptSource`](prompt::PromptSource) seam for prompt text |

pub mod api;
pub mod config;
pub mod fallback;
pub mod generate;
pub mod prelude;
pub mod prompt;
pub mod relay;

use serde::Serialize;

// ── Constants ──────────────────────────────────────────────────────

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for page generation.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Sampling temperature sent with every request.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Completion token cap sent with every request.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

// ── Request types ──────────────────────────────────────────────────

/// Streaming chat-completion request body.
#[derive(Serialize, Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// Role of a message in the conversation. The page prompt is the only
/// message sent, always as the user.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
}

/// A message in the conversation.
#[derive(Serialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}
