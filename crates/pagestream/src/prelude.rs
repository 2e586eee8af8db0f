//! Convenience re-exports for common `pagestream` types.
//!
//! ```ignore
//! use pagestream::prelude::*;
//! ```
//!
//! Covers what a caller needs to run relay sessions: the generator and its
//! outcome, configuration, the relay session, and the failure type.
//! Transport internals and the SSE decoder are left out; import those from
//! [`crate::api`] when needed.

pub use crate::api::failure::{ApiFailure, FailureKind};
pub use crate::api::retry::RetryConfig;
pub use crate::config::RelayConfig;
pub use crate::generate::{PageGenerator, PageOutcome};
pub use crate::prompt::{PathPrompt, PromptSource};
pub use crate::relay::{RelayPhase, RelaySession, RelayState};
