//! Generate one page and stream it to stdout.
//!
//! Reads the API key from the `OPENAI_API_KEY` environment variable
//! (`OPENAI_BASE_URL` and `OPENAI_MODEL` are optional overrides).
//!
//! # Examples
//!
//! ```sh
//! # Generate the page for a path
//! pagestream --path /guides/sourdough
//!
//! # Against a local OpenAI-compatible server, without retries
//! pagestream --path / --base-url http://localhost:8080/v1 --max-retries 0
//!
//! # Save the page while watching it arrive
//! pagestream --path /about | tee about.html
//! ```

use std::process;
use std::time::Duration;

use clap::Parser;
use pagestream::prelude::*;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Generate one page through the relay and print it as it streams.
#[derive(Parser)]
#[command(name = "pagestream")]
struct Cli {
    // ── Request ────────────────────────────────────────────────
    /// Request path the page is generated for
    #[arg(long, default_value = "/")]
    path: String,

    /// User-Agent passed to the prompt
    #[arg(long, default_value = "")]
    user_agent: String,

    // ── Upstream ───────────────────────────────────────────────
    /// Model to use (overrides OPENAI_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// API root (overrides OPENAI_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    // ── Retry policy ───────────────────────────────────────────
    /// Retries after the first attempt
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Per-attempt deadline in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl Cli {
    fn relay_config(&self) -> RelayConfig {
        let mut config = RelayConfig::from_env().with_retry(RetryConfig {
            max_retries: self.max_retries,
            attempt_timeout: Duration::from_secs(self.timeout_secs),
            ..Default::default()
        });
        if let Some(model) = &self.model {
            config = config.with_model(model);
        }
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url);
        }
        config
    }
}

async fn run(cli: &Cli) -> Result<(), String> {
    let generator = PageGenerator::new(cli.relay_config())
        .map_err(|e| format!("failed to build HTTP client: {e}"))?;

    match generator.generate(&cli.path, &cli.user_agent).await {
        PageOutcome::Streaming(mut session) => {
            let mut stdout = tokio::io::stdout();
            let state = session
                .pipe_to(&mut stdout)
                .await
                .map_err(|e| e.to_string())?;
            tracing::info!(
                "Streamed {} bytes in {} deltas",
                state.emitted_bytes,
                state.deltas
            );
            Ok(())
        }
        PageOutcome::Fallback { status, html } => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(html.as_bytes())
                .await
                .map_err(|e| format!("failed to write error page: {e}"))?;
            stdout.flush().await.map_err(|e| e.to_string())?;
            Err(format!("generation failed with HTTP {status}"))
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
