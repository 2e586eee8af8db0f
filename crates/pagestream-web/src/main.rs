//! Page-streaming web server.
//!
//! Every `GET` path is answered with an HTML page generated for that path,
//! streamed to the browser as the model writes it.
//!
//! # Usage
//!
//! ```bash
//! OPENAI_API_KEY=sk-... cargo run -p pagestream-web
//! OPENAI_API_KEY=sk-... cargo run -p pagestream-web -- --model gpt-4o-mini
//! OPENAI_API_KEY=sk-... cargo run -p pagestream-web -- --port 8080 --max-retries 1
//! ```
//!
//! Then open the printed URL (any path) in a browser, or:
//!
//! ```bash
//! curl -N http://127.0.0.1:3000/recipes/focaccia
//! ```

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pagestream::prelude::*;
use pagestream_web::{WebConfig, spawn_web};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Page-streaming web server.
#[derive(Parser)]
#[command(about = "Serve generated pages, streamed as they are written")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Model to use (overrides OPENAI_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// API root (overrides OPENAI_BASE_URL).
    #[arg(long)]
    base_url: Option<String>,

    /// Retries after the first upstream attempt.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Per-attempt upstream deadline in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Configuration: environment first, flags on top.
    let mut config = RelayConfig::from_env().with_retry(RetryConfig {
        max_retries: args.max_retries,
        attempt_timeout: Duration::from_secs(args.timeout_secs),
        ..Default::default()
    });
    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    if let Some(base_url) = args.base_url {
        config = config.with_base_url(base_url);
    }
    if !config.has_credential() {
        warn!("OPENAI_API_KEY is not set; every page will be an error document");
    }
    info!(
        "Upstream {} with model {} ({} attempts, {:?} worst case)",
        config.base_url,
        config.model,
        config.retry.total_attempts(),
        config.retry.worst_case_latency(),
    );

    // 2. Page generator shared by all requests.
    let generator = PageGenerator::new(config)
        .map_err(|e| format!("failed to build HTTP client: {e}"))?;

    // 3. Serve.
    let web_config = WebConfig {
        bind_addr: (args.host, args.port).into(),
    };
    let addr = spawn_web(Arc::new(generator), web_config)
        .await
        .map_err(|e| format!("failed to bind {}:{}: {e}", args.host, args.port))?;
    println!("Serving pages on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for shutdown signal: {e}"))?;
    info!("Shutting down");
    Ok(())
}
