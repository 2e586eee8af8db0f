//! Failure classification for upstream calls.
//!
//! Every way an upstream attempt can fail ends up as an [`ApiFailure`]:
//! non-success HTTP responses, deadline expiry, transport errors, and a
//! missing credential. Classification never fails.
//!
//! Retryable statuses are 408, 429 and anything >= 500. Timeouts are always
//! retryable. Transport errors are retryable only while the caller still has
//! attempts left, which the caller passes in.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use super::transport::BoxError;

/// Broad category of an [`ApiFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    NetworkError,
    /// Upstream 4xx/5xx with a parseable JSON error body.
    ApiError,
    /// Upstream error without a parseable body.
    Unknown,
    MissingCredential,
}

impl FailureKind {
    /// Stable snake_case name, used as the `kind` field in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::NetworkError => "network_error",
            FailureKind::ApiError => "api_error",
            FailureKind::Unknown => "unknown",
            FailureKind::MissingCredential => "missing_credential",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified upstream failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApiFailure {
    /// Upstream HTTP status; `None` for failures below the HTTP layer.
    pub status_code: Option<u16>,
    pub kind: FailureKind,
    pub retryable: bool,
    pub message: String,
    /// `error.type` from the upstream JSON error body, if any.
    pub error_type: Option<String>,
}

impl ApiFailure {
    /// Status code to show the end user for this failure.
    pub fn http_status(&self) -> u16 {
        match (self.status_code, self.kind) {
            (Some(code), _) => code,
            (None, FailureKind::Timeout) => 504,
            (None, FailureKind::NetworkError) => 502,
            (None, _) => 500,
        }
    }

    /// No API key configured. Raised before any network attempt.
    pub fn missing_credential() -> Self {
        Self {
            status_code: Some(500),
            kind: FailureKind::MissingCredential,
            retryable: false,
            message: "API key is not configured".to_string(),
            error_type: None,
        }
    }

    /// The upstream body broke off after streaming began.
    pub fn stream_interrupted(error: &BoxError) -> Self {
        Self {
            status_code: None,
            kind: FailureKind::NetworkError,
            retryable: false,
            message: format!("upstream stream interrupted: {error}"),
            error_type: None,
        }
    }

    /// The outbound request could not be built.
    pub fn invalid_request(error: impl std::fmt::Display) -> Self {
        Self {
            status_code: None,
            kind: FailureKind::Unknown,
            retryable: false,
            message: format!("failed to build upstream request: {error}"),
            error_type: None,
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

/// Whether an upstream HTTP status is worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 429 || status == 408
}

/// Classify a non-success upstream response from its status and body text.
pub fn classify_response(status: StatusCode, body: &str) -> ApiFailure {
    let code = status.as_u16();
    let retryable = is_retryable_status(code);

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ApiFailure {
            status_code: Some(code),
            kind: FailureKind::ApiError,
            retryable,
            message: envelope.error.message,
            error_type: envelope.error.error_type,
        },
        Err(_) => ApiFailure {
            status_code: Some(code),
            kind: FailureKind::Unknown,
            retryable,
            message: format!(
                "HTTP {code}: {}",
                status.canonical_reason().unwrap_or("Unknown Status")
            ),
            error_type: None,
        },
    }
}

/// Classify an attempt that ran past its deadline.
pub fn classify_timeout(timeout: Duration) -> ApiFailure {
    ApiFailure {
        status_code: None,
        kind: FailureKind::Timeout,
        retryable: true,
        message: format!("upstream did not respond within {}ms", timeout.as_millis()),
        error_type: None,
    }
}

/// Classify a transport-level error. `budget_remaining` decides retryability.
pub fn classify_transport_error(error: &BoxError, budget_remaining: bool) -> ApiFailure {
    ApiFailure {
        status_code: None,
        kind: FailureKind::NetworkError,
        retryable: budget_remaining,
        message: format!("request failed: {error}"),
        error_type: None,
    }
}
