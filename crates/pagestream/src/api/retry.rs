//! Bounded retry with a constant delay.
//!
//! Re-issues the same request after transient failures (408, 429, 5xx,
//! timeouts, transport errors) up to [`RetryConfig::max_retries`] times.
//! The delay between attempts is fixed, so the worst case is bounded by
//! [`RetryConfig::worst_case_latency`]. Attempts never overlap.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::failure::{self, ApiFailure};
use super::transport::{
    AttemptError, OutboundRequest, Transport, UpstreamResponse, send_with_timeout,
};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the initial attempt (0 = try once).
    pub max_retries: u32,
    /// Deadline for each individual attempt.
    pub attempt_timeout: Duration,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            attempt_timeout: Duration::from_millis(30_000),
            delay: Duration::from_millis(1_000),
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries and default timings.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Initial attempt plus retries.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Upper bound on time spent before giving up.
    pub fn worst_case_latency(&self) -> Duration {
        self.attempt_timeout * self.total_attempts() + self.delay * self.max_retries
    }
}

/// Send `request` until it succeeds, fails permanently, or the budget runs out.
///
/// The request is cloned unchanged for each attempt. Dropping the returned
/// future abandons the current attempt or backoff sleep and spends no more
/// of the budget.
pub async fn execute(
    transport: &dyn Transport,
    request: &OutboundRequest,
    config: &RetryConfig,
) -> Result<UpstreamResponse, ApiFailure> {
    let mut attempt = 0;
    loop {
        let budget_remaining = attempt < config.max_retries;
        debug!(
            "upstream attempt {}/{}",
            attempt + 1,
            config.total_attempts()
        );

        let deadline = Instant::now() + config.attempt_timeout;
        let failure = match send_with_timeout(transport, request, config.attempt_timeout).await {
            Ok(response) if response.is_success() => return Ok(response),
            Ok(response) => {
                // The error body shares the attempt deadline with the headers.
                let status = response.status;
                let body = match tokio::time::timeout_at(deadline, response.text()).await {
                    Ok(body) => body,
                    Err(_) => {
                        debug!("error body for HTTP {status} not received before the deadline");
                        String::new()
                    }
                };
                failure::classify_response(status, &body)
            }
            Err(AttemptError::Timeout(timeout)) => failure::classify_timeout(timeout),
            Err(AttemptError::Transport(e)) => {
                failure::classify_transport_error(&e, budget_remaining)
            }
        };

        if failure.retryable && budget_remaining {
            warn!(
                kind = %failure.kind,
                status = failure.status_code,
                "Transient upstream failure (attempt {}/{}): {}. Retrying in {:?}...",
                attempt + 1,
                config.total_attempts(),
                failure.message,
                config.delay,
            );
            tokio::time::sleep(config.delay).await;
            attempt += 1;
        } else {
            return Err(failure);
        }
    }
}
