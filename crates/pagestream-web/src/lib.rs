//! HTTP front end for the pagestream relay.
//!
//! `pagestream-web` serves every `GET` path by generating a page for it and
//! streaming the generated HTML to the browser as it arrives from the
//! upstream chat-completions API.
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use pagestream::prelude::*;
//! use pagestream_web::{WebConfig, spawn_web};
//!
//! let generator = Arc::new(PageGenerator::new(RelayConfig::from_env())?);
//! let addr = spawn_web(generator, WebConfig::default()).await?;
//! println!("Serving on http://{addr}");
//! ```
//!
//! # Architecture
//!
//! ```text
//! browser ──GET /any/path──▶ render_page ──▶ PageGenerator::generate
//!                                                 │
//!        ◀── 200 text/html, streamed ◀── RelaySession (SSE deltas)
//!        ◀── 4xx/5xx fallback page   ◀── ApiFailure (before first byte)
//! ```

mod api;
mod server;

pub use api::AppState;
pub use server::{build_router, start_server};

use std::net::SocketAddr;
use std::sync::Arc;

use pagestream::generate::PageGenerator;

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3000`.
    pub bind_addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down.
pub async fn spawn_web(
    generator: Arc<PageGenerator>,
    config: WebConfig,
) -> std::io::Result<SocketAddr> {
    let router = server::build_router(generator);
    server::start_server(router, config.bind_addr).await
}
