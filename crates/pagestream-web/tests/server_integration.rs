//! Integration tests for the pagestream-web server.
//!
//! These tests start a fake chat-completions upstream and the real relay
//! server, both on random ports, and drive them over HTTP with reqwest.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use futures::StreamExt;
use pagestream::prelude::*;
use pagestream_web::{WebConfig, spawn_web};

// ── Fake upstream ────────────────────────────────────────────────────

#[derive(Clone)]
enum Reply {
    Status(u16, &'static str),
    Sse(&'static str),
    /// Send one chunk, then break the connection.
    Broken(&'static str),
}

struct FakeUpstream {
    script: Mutex<VecDeque<Reply>>,
    last: Reply,
    calls: AtomicU32,
    arrivals: Mutex<Vec<Instant>>,
    bodies: Mutex<Vec<serde_json::Value>>,
}

impl FakeUpstream {
    fn new(script: Vec<Reply>, last: Reply) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last,
            calls: AtomicU32::new(0),
            arrivals: Mutex::new(Vec::new()),
            bodies: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn chat_completions(
    State(upstream): State<Arc<FakeUpstream>>,
    body: String,
) -> Response {
    upstream.calls.fetch_add(1, Ordering::SeqCst);
    upstream.arrivals.lock().unwrap().push(Instant::now());
    if let Ok(json) = serde_json::from_str(&body) {
        upstream.bodies.lock().unwrap().push(json);
    }

    let reply = upstream
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| upstream.last.clone());
    match reply {
        Reply::Status(code, body) => (StatusCode::from_u16(code).unwrap(), body).into_response(),
        Reply::Sse(events) => {
            ([(header::CONTENT_TYPE, "text/event-stream")], events).into_response()
        }
        Reply::Broken(first) => {
            let head = futures::stream::once(async move { Ok::<_, std::io::Error>(first.to_string()) });
            let tail = futures::stream::once(async {
                tokio::time::sleep(BROKEN_STREAM_GAP).await;
                Err::<String, _>(std::io::Error::other("upstream went away"))
            });
            let body = Body::from_stream(head.chain(tail));
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
    }
}

async fn spawn_upstream(upstream: Arc<FakeUpstream>) -> SocketAddr {
    let router = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Helper: spawn the relay server on port 0 (random available port).
async fn spawn_relay(config: RelayConfig) -> String {
    let generator = Arc::new(PageGenerator::new(config).unwrap());
    let web_config = WebConfig {
        bind_addr: ([127, 0, 0, 1], 0).into(),
    };
    let addr = spawn_web(generator, web_config).await.unwrap();
    format!("http://{addr}")
}

fn relay_config(upstream_addr: SocketAddr) -> RelayConfig {
    RelayConfig::default()
        .with_api_key("sk-test")
        .with_base_url(format!("http://{upstream_addr}/v1"))
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        delay: Duration::from_millis(20),
        attempt_timeout: Duration::from_secs(5),
        ..RetryConfig::default()
    }
}

/// Pause between the first chunk and the failure of a `Reply::Broken` body,
/// long enough for the first delta to reach the client.
const BROKEN_STREAM_GAP: Duration = Duration::from_millis(300);

const HI_STREAM: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n";

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn healthz_does_not_touch_upstream() {
    let upstream = FakeUpstream::new(vec![], Reply::Status(500, ""));
    let base = spawn_relay(relay_config(spawn_upstream(upstream.clone()).await)).await;

    let resp = reqwest::get(format!("{base}/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn streams_after_two_rate_limits() {
    let upstream = FakeUpstream::new(
        vec![Reply::Status(429, ""), Reply::Status(429, "")],
        Reply::Sse(HI_STREAM),
    );
    let base = spawn_relay(relay_config(spawn_upstream(upstream.clone()).await)).await;

    let resp = reqwest::Client::new()
        .get(format!("{base}/hello/world"))
        .header("User-Agent", "integration-test/1.0")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "text/html; charset=utf-8"
    );
    assert!(
        resp.headers()["cache-control"]
            .to_str()
            .unwrap()
            .contains("no-cache")
    );
    assert_eq!(resp.text().await.unwrap(), "Hi");
    assert_eq!(upstream.calls(), 3);

    // Default backoff is a constant ~1s between attempts.
    let arrivals = upstream.arrivals.lock().unwrap();
    for pair in arrivals.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(950), "gap was {gap:?}");
        assert!(gap < Duration::from_millis(2_000), "gap was {gap:?}");
    }

    // Every attempt carried the same request.
    let bodies = upstream.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 3);
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(bodies[0]["stream"], true);
    let prompt = bodies[0]["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("/hello/world"));
    assert!(prompt.contains("integration-test/1.0"));
}

#[tokio::test]
async fn persistent_500_serves_fallback_document() {
    let upstream = FakeUpstream::new(
        vec![],
        Reply::Status(
            500,
            r#"{"error":{"message":"The server had an error while processing your request","type":"server_error"}}"#,
        ),
    );
    let config = relay_config(spawn_upstream(upstream.clone()).await).with_retry(fast_retry());
    let base = spawn_relay(config).await;

    let resp = reqwest::get(format!("{base}/anything")).await.unwrap();
    assert_eq!(resp.status(), 500);
    let html = resp.text().await.unwrap();
    assert!(html.contains("<!DOCTYPE html>"));
    assert!(html.contains("Error 500"));
    assert!(html.contains("The server had an error while processing your request"));
    assert!(html.contains(r#"href="/""#));
    assert_eq!(upstream.calls(), 4);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let upstream = FakeUpstream::new(
        vec![],
        Reply::Status(401, r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#),
    );
    let config = relay_config(spawn_upstream(upstream.clone()).await).with_retry(fast_retry());
    let base = spawn_relay(config).await;

    let resp = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(resp.status(), 401);
    assert!(resp.text().await.unwrap().contains("Incorrect API key provided"));
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn missing_api_key_serves_500_without_upstream_call() {
    let upstream = FakeUpstream::new(vec![], Reply::Sse(HI_STREAM));
    let addr = spawn_upstream(upstream.clone()).await;
    let config = RelayConfig::default().with_base_url(format!("http://{addr}/v1"));
    let base = spawn_relay(config).await;

    let resp = reqwest::get(format!("{base}/about")).await.unwrap();
    assert_eq!(resp.status(), 500);
    assert!(resp.text().await.unwrap().contains("Error 500"));
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn unreachable_upstream_serves_502() {
    // Bind and drop a listener to get a port nothing is listening on.
    let dead = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let config = relay_config(dead).with_retry(RetryConfig {
        max_retries: 1,
        ..fast_retry()
    });
    let base = spawn_relay(config).await;

    let resp = reqwest::get(format!("{base}/x")).await.unwrap();
    assert_eq!(resp.status(), 502);
    assert!(resp.text().await.unwrap().contains("request failed"));
}

#[tokio::test]
async fn mid_stream_failure_truncates_response() {
    let upstream = FakeUpstream::new(
        vec![],
        Reply::Broken("data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n"),
    );
    let config = relay_config(spawn_upstream(upstream.clone()).await).with_retry(fast_retry());
    let base = spawn_relay(config).await;

    let mut resp = reqwest::get(format!("{base}/broken")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let mut received = Vec::new();
    let mut failed = false;
    loop {
        match resp.chunk().await {
            Ok(Some(chunk)) => received.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(_) => {
                failed = true;
                break;
            }
        }
    }
    assert!(failed, "truncated body should surface as a read error");
    // Text relayed before the break is kept; nothing is appended after it.
    assert_eq!(String::from_utf8_lossy(&received), "partial");
    // No retry once streaming has begun.
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn non_get_is_rejected() {
    let upstream = FakeUpstream::new(vec![], Reply::Sse(HI_STREAM));
    let base = spawn_relay(relay_config(spawn_upstream(upstream.clone()).await)).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/page"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);
    assert_eq!(resp.headers()["allow"], "GET, HEAD");
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn head_answers_without_upstream_call() {
    let upstream = FakeUpstream::new(vec![], Reply::Sse(HI_STREAM));
    let base = spawn_relay(relay_config(spawn_upstream(upstream.clone()).await)).await;

    let resp = reqwest::Client::new()
        .head(format!("{base}/page"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "text/html; charset=utf-8"
    );
    assert_eq!(upstream.calls(), 0);
}
