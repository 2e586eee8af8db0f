//! HTTP endpoint handlers.
//!
//! [`render_page`] is the router fallback: any `GET` path becomes a page
//! request. A successful upstream response is streamed straight through;
//! hyper applies chunked framing, so no `Transfer-Encoding` header is set
//! here.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use pagestream::generate::{PageGenerator, PageOutcome};
use tracing::debug;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<PageGenerator>,
}

/// GET /healthz: liveness probe. Does not contact the upstream API.
pub async fn healthz() -> &'static str {
    "ok"
}

/// GET /{*path}: generate and stream the page for `path`.
///
/// Returns 200 with a streamed HTML body, the fallback document with the
/// classified status if generation fails before streaming, or 405 for
/// methods other than `GET` and `HEAD`. `HEAD` gets the success headers
/// without generating anything.
pub async fn render_page(
    State(app): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method == Method::HEAD {
        return head_response();
    }
    if method != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET, HEAD")]).into_response();
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    debug!("GET {} ({user_agent})", uri.path());

    let outcome = app.generator.generate(uri.path(), user_agent).await;
    outcome_response(outcome)
}

/// Headers a successful `GET` would carry, with no body.
fn head_response() -> Response {
    (
        [
            (header::CONTENT_TYPE, HTML_CONTENT_TYPE),
            (header::CACHE_CONTROL, NO_CACHE),
        ],
        Body::empty(),
    )
        .into_response()
}

/// Turn a generation outcome into the HTTP response.
fn outcome_response(outcome: PageOutcome) -> Response {
    let html_headers = [
        (header::CONTENT_TYPE, HTML_CONTENT_TYPE),
        (header::CACHE_CONTROL, NO_CACHE),
    ];
    match outcome {
        PageOutcome::Streaming(session) => {
            (html_headers, Body::from_stream(session.into_stream())).into_response()
        }
        PageOutcome::Fallback { status, html } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, html_headers, html).into_response()
        }
    }
}
