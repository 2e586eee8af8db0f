//! Per-session decode-and-forward loop.
//!
//! A [`RelaySession`] owns the upstream body of one successful response and
//! the [`SseDecoder`] for it. Each inbound chunk is decoded immediately and
//! every resulting delta is handed to the caller before the next chunk is
//! read, so output moves in lockstep with upstream arrival.
//!
//! A session ends in one of two terminal phases: [`RelayPhase::ClosedClean`]
//! after end-of-body or `[DONE]`, or [`RelayPhase::ClosedError`] after a read
//! failure. There is no mid-stream retry; deltas already forwarded would be
//! duplicated.
//!
//! Dropping the session drops the upstream body, which abandons the read.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error};

use crate::api::failure::ApiFailure;
use crate::api::streaming::{SseDecoder, StreamDelta};
use crate::api::transport::{ByteStream, UpstreamResponse};

/// Lifecycle of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    Open,
    ClosedClean,
    ClosedError,
}

/// Counters for one session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RelayState {
    /// Bytes of delta text handed to the caller so far.
    pub emitted_bytes: usize,
    pub deltas: usize,
    /// `data:` payloads dropped as malformed.
    pub skipped_events: usize,
}

/// Error from [`RelaySession::pipe_to`].
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error(transparent)]
    Upstream(#[from] ApiFailure),
    #[error("failed to write relayed output: {0}")]
    Write(#[from] std::io::Error),
}

/// Forwards text deltas from one upstream body.
pub struct RelaySession {
    body: Option<ByteStream>,
    decoder: SseDecoder,
    pending: VecDeque<StreamDelta>,
    state: RelayState,
    phase: RelayPhase,
}

impl RelaySession {
    /// Start relaying the body of a successful upstream response.
    pub fn new(response: UpstreamResponse) -> Self {
        Self {
            body: response.body,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            state: RelayState::default(),
            phase: RelayPhase::Open,
        }
    }

    pub fn phase(&self) -> RelayPhase {
        self.phase
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    /// Next delta in upstream order, `Some(Err)` once on a read failure, then
    /// `None` forever.
    pub async fn next_delta(&mut self) -> Option<Result<StreamDelta, ApiFailure>> {
        loop {
            if let Some(delta) = self.pending.pop_front() {
                self.state.emitted_bytes += delta.len();
                self.state.deltas += 1;
                return Some(Ok(delta));
            }
            if self.phase != RelayPhase::Open {
                return None;
            }
            if self.decoder.is_done() {
                self.close_clean();
                continue;
            }
            let Some(body) = self.body.as_mut() else {
                // No body to read: close without output.
                self.close_clean();
                continue;
            };

            match body.next().await {
                Some(Ok(chunk)) => {
                    let deltas = self.decoder.feed(&chunk);
                    self.pending.extend(deltas);
                }
                Some(Err(e)) => {
                    let failure = ApiFailure::stream_interrupted(&e);
                    self.body = None;
                    self.phase = RelayPhase::ClosedError;
                    self.state.skipped_events = self.decoder.skipped();
                    error!(
                        "Relay aborted after {} bytes: {}",
                        self.state.emitted_bytes, failure.message
                    );
                    return Some(Err(failure));
                }
                None => {
                    self.pending.extend(self.decoder.finish());
                    self.close_clean();
                }
            }
        }
    }

    fn close_clean(&mut self) {
        self.body = None;
        self.phase = RelayPhase::ClosedClean;
        self.state.skipped_events = self.decoder.skipped();
        debug!(
            "Relay finished: {} bytes in {} deltas queued, {} skipped events",
            self.state.emitted_bytes + self.pending.iter().map(StreamDelta::len).sum::<usize>(),
            self.state.deltas + self.pending.len(),
            self.state.skipped_events,
        );
    }

    /// Consume the session as a byte stream for an HTTP response body.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, ApiFailure>> + Send {
        futures::stream::unfold(self, |mut session| async move {
            let item = session.next_delta().await?;
            Some((item.map(|d| Bytes::from(d.into_string())), session))
        })
    }

    /// Write every delta to `sink` as it arrives, flushing after each one.
    pub async fn pipe_to<W>(&mut self, sink: &mut W) -> Result<&RelayState, PipeError>
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(delta) = self.next_delta().await {
            let delta = delta?;
            sink.write_all(delta.as_str().as_bytes()).await?;
            sink.flush().await?;
        }
        Ok(&self.state)
    }
}
