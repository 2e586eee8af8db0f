//! `generate(path, user_agent)`: one relay session from request to outcome.
//!
//! ```text
//! generate ─▶ retry::execute ─▶ send_with_timeout ─▶ Transport
//!    │              │ (failure)
//!    │              ▼
//!    │        ApiFailure ─▶ fallback::render ─▶ PageOutcome::Fallback
//!    ▼ (2xx)
//! RelaySession ◀── SseDecoder ─────────────────▶ PageOutcome::Streaming
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::failure::ApiFailure;
use crate::api::retry;
use crate::api::transport::{HttpTransport, OutboundRequest, Transport};
use crate::config::RelayConfig;
use crate::fallback;
use crate::prompt::{PathPrompt, PromptSource};
use crate::relay::RelaySession;

/// What the caller should send back.
pub enum PageOutcome {
    /// Upstream accepted the request; forward the session's bytes.
    Streaming(RelaySession),
    /// Nothing was streamed; send this document with this status.
    Fallback { status: u16, html: String },
}

impl PageOutcome {
    fn from_failure(failure: &ApiFailure) -> Self {
        let status = failure.http_status();
        PageOutcome::Fallback {
            status,
            html: fallback::render(&failure.message, status),
        }
    }
}

impl std::fmt::Debug for PageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageOutcome::Streaming(session) => f
                .debug_tuple("Streaming")
                .field(&session.phase())
                .finish(),
            PageOutcome::Fallback { status, .. } => {
                f.debug_struct("Fallback").field("status", status).finish()
            }
        }
    }
}

/// Entry point shared by every caller (HTTP server, CLI).
///
/// Holds no per-request state; each [`generate`](Self::generate) call owns
/// its own request, retry loop and [`RelaySession`].
pub struct PageGenerator {
    config: RelayConfig,
    transport: Arc<dyn Transport>,
    prompts: Arc<dyn PromptSource>,
}

impl PageGenerator {
    /// Create a generator backed by [`HttpTransport`] and [`PathPrompt`].
    pub fn new(config: RelayConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_transport(config, Arc::new(HttpTransport::new()?)))
    }

    pub fn with_transport(config: RelayConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            prompts: Arc::new(PathPrompt),
        }
    }

    /// Replace the prompt source.
    pub fn with_prompts(mut self, prompts: impl PromptSource + 'static) -> Self {
        self.prompts = Arc::new(prompts);
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Produce a page for `path`.
    ///
    /// A missing API key short-circuits to a 500 fallback without touching
    /// the network. Dropping the returned future stops any pending retry.
    pub async fn generate(&self, path: &str, user_agent: &str) -> PageOutcome {
        if !self.config.has_credential() {
            warn!("No API key configured; serving error page for {path}");
            return PageOutcome::from_failure(&ApiFailure::missing_credential());
        }

        let prompt = self.prompts.prompt(path, user_agent);
        let request = match OutboundRequest::chat_completion(&self.config, &prompt) {
            Ok(request) => request,
            Err(e) => return PageOutcome::from_failure(&ApiFailure::invalid_request(e)),
        };
        debug!(
            "Generating {path}: model={}, prompt={} chars",
            self.config.model,
            prompt.len()
        );

        match retry::execute(self.transport.as_ref(), &request, &self.config.retry).await {
            Ok(response) => {
                debug!("Upstream accepted {path} with HTTP {}", response.status);
                PageOutcome::Streaming(RelaySession::new(response))
            }
            Err(failure) => {
                warn!(
                    kind = %failure.kind,
                    status = failure.http_status(),
                    retryable = failure.retryable,
                    "Generation failed for {path}: {}",
                    failure.message
                );
                PageOutcome::from_failure(&failure)
            }
        }
    }
}
