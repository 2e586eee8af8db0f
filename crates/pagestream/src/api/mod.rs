//! Upstream interaction layer: transport, failure classification, retry,
//! and SSE decoding.
//!
//! These modules handle everything between the
//! [`PageGenerator`](crate::generate::PageGenerator) and the chat-completions
//! API:
//!
//! - [`transport`]: one outbound request raced against a deadline. The
//!   [`Transport`] trait is the seam tests replace.
//! - [`failure`]: turns non-success responses, timeouts and transport
//!   errors into an [`ApiFailure`] with a retryability verdict.
//! - [`retry`]: constant-delay retry over a bounded attempt budget.
//! - [`streaming`]: incremental SSE parser producing
//!   [`StreamDelta`](streaming::StreamDelta) values.

pub mod failure;
pub mod retry;
pub mod streaming;
pub mod transport;

// Re-export commonly used items at the module level.
pub use failure::{ApiFailure, FailureKind};
pub use retry::RetryConfig;
pub use streaming::{SseDecoder, StreamDelta};
pub use transport::{HttpTransport, OutboundRequest, Transport, UpstreamResponse};
