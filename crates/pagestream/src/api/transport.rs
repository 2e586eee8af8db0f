//! Single outbound request with a hard deadline.
//!
//! [`Transport`] is the seam between the relay and the network. The
//! production implementation is [`HttpTransport`] (reqwest); tests plug in
//! scripted transports. [`send_with_timeout`] races one call against a timer
//! and abandons the in-flight request if the timer wins.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use futures::StreamExt;
use reqwest::{Method, StatusCode};
use tracing::{debug, trace};

use crate::config::RelayConfig;
use crate::{ChatRequest, Message};

/// Boxed lower-level error (DNS, refused connection, reset, ...).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Raw upstream body as a stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// Future returned by [`Transport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<UpstreamResponse, BoxError>> + Send + 'a>>;

// ── Request ────────────────────────────────────────────────────────

/// A fully built outbound request. Cloned as-is for every retry attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body.
    pub body: String,
}

impl OutboundRequest {
    /// Build the streaming chat-completion request for `prompt`.
    ///
    /// The caller must have checked that an API key is configured; an absent
    /// key produces an empty bearer token here.
    pub fn chat_completion(config: &RelayConfig, prompt: &str) -> Result<Self, serde_json::Error> {
        let body = ChatRequest {
            model: config.model.clone(),
            messages: vec![Message::user(prompt)],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream: true,
        };
        let api_key = config.api_key.as_deref().unwrap_or_default();

        Ok(Self {
            url: config.chat_completions_url(),
            method: Method::POST,
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), format!("Bearer {api_key}")),
            ],
            body: serde_json::to_string(&body)?,
        })
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ── Response ───────────────────────────────────────────────────────

/// Status line plus the (possibly absent) streaming body of an upstream reply.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Option<ByteStream>,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, body: Option<ByteStream>) -> Self {
        Self { status, body }
    }

    /// Build a response whose body yields the given chunks in order.
    pub fn from_chunks<I, B>(status: StatusCode, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let chunks: Vec<Result<Bytes, BoxError>> =
            chunks.into_iter().map(|c| Ok(c.into())).collect();
        Self::new(status, Some(Box::pin(futures::stream::iter(chunks))))
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Canonical reason phrase, e.g. `"Too Many Requests"`.
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    /// Drain the body into a string. Read errors end the text early; this is
    /// only used for error bodies, where a partial body is still useful.
    pub async fn text(self) -> String {
        let Some(mut body) = self.body else {
            return String::new();
        };
        let mut buf = Vec::new();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => buf.extend_from_slice(&bytes),
                Err(e) => {
                    debug!("error body read stopped early: {e}");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

// ── Transport ──────────────────────────────────────────────────────

/// Issues one outbound request. Implementations must not retry.
pub trait Transport: Send + Sync {
    fn send(&self, request: &OutboundRequest) -> TransportFuture<'_>;
}

/// Outcome of a single attempt that produced no response.
#[derive(Debug)]
pub enum AttemptError {
    /// The deadline fired before the upstream answered.
    Timeout(Duration),
    /// The transport failed; passed through unmodified for classification.
    Transport(BoxError),
}

/// Send `request` and give up after `timeout`.
///
/// Losing the race drops the in-flight future, so its eventual result is
/// never observed.
pub async fn send_with_timeout(
    transport: &dyn Transport,
    request: &OutboundRequest,
    timeout: Duration,
) -> Result<UpstreamResponse, AttemptError> {
    match tokio::time::timeout(timeout, transport.send(request)).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(AttemptError::Transport(e)),
        Err(_) => Err(AttemptError::Timeout(timeout)),
    }
}

/// reqwest-backed [`Transport`].
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pagestream/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &OutboundRequest) -> TransportFuture<'_> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let url = request.url.clone();

        Box::pin(async move {
            debug!("POST {url}");
            let resp = builder.send().await?;
            let status = resp.status();
            trace!("upstream answered HTTP {status}");
            Ok(UpstreamResponse::new(status, Some(body_stream(resp))))
        })
    }
}

/// Read a reqwest body chunk by chunk. Stops after the first error.
fn body_stream(resp: reqwest::Response) -> ByteStream {
    Box::pin(futures::stream::unfold(Some(resp), |resp| async move {
        let mut resp = resp?;
        match resp.chunk().await {
            Ok(Some(chunk)) => Some((Ok(chunk), Some(resp))),
            Ok(None) => None,
            Err(e) => Some((Err(BoxError::from(e)), None)),
        }
    }))
}
