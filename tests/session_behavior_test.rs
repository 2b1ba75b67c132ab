//! Integration tests for the session, batch executor, and metrics working
//! together through the public API, driven by a scripted transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sturdy_http::prelude::*;
use sturdy_http::reqwest::header::{HeaderMap, RETRY_AFTER};

/// Transport double that pops one scripted outcome per send.
#[derive(Debug)]
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Response>>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<Response>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _request: &RequestDescriptor) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Err(Error::network("script exhausted")))
    }
}

/// Transport double that echoes the URL after a per-request delay.
#[derive(Debug)]
struct EchoTransport;

#[async_trait]
impl Transport for EchoTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<Response> {
        // Vary completion time by URL so completion order scrambles.
        let millis = u64::from(request.url().as_bytes().last().copied().unwrap_or(0)) % 40;
        tokio::time::sleep(Duration::from_millis(40 - millis)).await;
        Ok(Response::new(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from(request.url().to_string()),
        ))
    }
}

fn ok(body: &str) -> Result<Response> {
    Ok(Response::new(
        StatusCode::OK,
        HeaderMap::new(),
        Bytes::from(body.to_string()),
    ))
}

fn status(code: StatusCode) -> Result<Response> {
    Ok(Response::new(code, HeaderMap::new(), Bytes::new()))
}

fn rate_limited(retry_after: &str) -> Result<Response> {
    let mut headers = HeaderMap::new();
    headers.insert(RETRY_AFTER, retry_after.parse().expect("header value"));
    Ok(Response::new(
        StatusCode::TOO_MANY_REQUESTS,
        headers,
        Bytes::new(),
    ))
}

#[tokio::test(start_paused = true)]
async fn rate_limit_wait_clamped_by_max_wait() {
    // Retry-After advises 120s but the session caps waits at 60s.
    let transport = ScriptedTransport::new(vec![rate_limited("120"), ok("done")]);
    let session = Session::builder()
        .config(
            SessionConfig::builder()
                .rate_limit_max_wait(Duration::from_secs(60))
                .build(),
        )
        .transport(Arc::clone(&transport) as Arc<dyn Transport>)
        .build()
        .expect("session");

    let started = tokio::time::Instant::now();
    let response = session.get("https://api.example.com/limited").await.unwrap();

    assert_eq!(response.text(), "done");
    assert_eq!(started.elapsed(), Duration::from_secs(60));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn retry_policy_recovers_from_server_errors() {
    let transport = ScriptedTransport::new(vec![
        status(StatusCode::BAD_GATEWAY),
        status(StatusCode::SERVICE_UNAVAILABLE),
        ok("recovered"),
    ]);
    let session = Session::builder()
        .rule(
            RouteRule::new(
                r"/flaky",
                "flaky",
                Some(RetryPolicy::exponential(5, Duration::from_millis(100), 2.0)),
            )
            .unwrap(),
        )
        .transport(Arc::clone(&transport) as Arc<dyn Transport>)
        .build()
        .expect("session");

    let response = session.get("https://api.example.com/flaky").await.unwrap();
    assert_eq!(response.text(), "recovered");
    assert_eq!(transport.calls(), 3);

    let summary = session.metrics_summary();
    assert_eq!(summary["flaky"].count, 1);
    assert_eq!(summary["flaky"].errors, 0);
    assert_eq!(summary["flaky"].status_codes[&200], 1);
}

#[tokio::test(start_paused = true)]
async fn cached_get_round_trip() {
    let transport = ScriptedTransport::new(vec![ok("payload"), ok("fresh")]);
    let session = Session::builder()
        .config(
            SessionConfig::builder()
                .cache_ttl(Duration::from_secs(120))
                .build(),
        )
        .cache(ResponseCache::memory())
        .transport(Arc::clone(&transport) as Arc<dyn Transport>)
        .build()
        .expect("session");

    let first = session.get("https://api.example.com/doc").await.unwrap();
    let second = session.get("https://api.example.com/doc").await.unwrap();
    assert_eq!(first.text(), second.text());
    assert_eq!(transport.calls(), 1, "hit within TTL must not reach transport");

    tokio::time::advance(Duration::from_secs(121)).await;
    let third = session.get("https://api.example.com/doc").await.unwrap();
    assert_eq!(third.text(), "fresh");
    assert_eq!(transport.calls(), 2, "expired entry must refetch");
}

#[tokio::test(start_paused = true)]
async fn batch_preserves_flattened_order() {
    let session = Arc::new(
        Session::builder()
            .transport(Arc::new(EchoTransport) as Arc<dyn Transport>)
            .build()
            .expect("session"),
    );
    let executor = BatchExecutor::with_width(Arc::clone(&session), 2);

    // One single, one pair-list, one single: four requests total.
    let urls = [
        "https://api.example.com/a",
        "https://api.example.com/b",
        "https://api.example.com/c",
        "https://api.example.com/d",
    ];
    let groups: Vec<RequestGroup> = vec![
        RequestDescriptor::get(urls[0]).into(),
        vec![
            RequestDescriptor::get(urls[1]),
            RequestDescriptor::get(urls[2]),
        ]
        .into(),
        RequestDescriptor::get(urls[3]).into(),
    ];

    let results = executor.execute(groups).await;

    assert_eq!(results.len(), 4);
    for (slot, url) in results.iter().zip(urls) {
        assert_eq!(slot.as_ref().expect("request should succeed").text(), url);
    }
}

#[tokio::test]
async fn compare_metrics_reports_deltas_since_snapshot() {
    let transport = ScriptedTransport::new(vec![
        ok(""),
        ok(""),
        ok(""),
        status(StatusCode::INTERNAL_SERVER_ERROR),
    ]);
    let session = Session::builder()
        .rule(RouteRule::new(r"/users", "users", None).unwrap())
        .rule(RouteRule::new(r"/posts", "posts", None).unwrap())
        .transport(Arc::clone(&transport) as Arc<dyn Transport>)
        .build()
        .expect("session");

    // Establish a baseline with traffic on "posts" only.
    session.get("https://api.example.com/posts/1").await.unwrap();
    let snapshot = session.metrics_snapshot();

    // Two successes and one failure under "users".
    session.get("https://api.example.com/users/1").await.unwrap();
    session.get("https://api.example.com/users/2").await.unwrap();
    session
        .get("https://api.example.com/users/3")
        .await
        .unwrap_err();

    let deltas = session.compare_metrics(&snapshot);
    assert_eq!(deltas.len(), 1, "unchanged tags must be omitted");
    assert_eq!(deltas["users"].count, 3);
    assert_eq!(deltas["users"].errors, 1);
}

#[tokio::test]
async fn batch_failures_do_not_disturb_siblings() {
    let transport = ScriptedTransport::new(vec![
        ok("first"),
        Err(Error::network("connection reset")),
        ok("third"),
    ]);
    let session = Arc::new(
        Session::builder()
            .transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .build()
            .expect("session"),
    );
    // Width 1 keeps the scripted outcomes aligned with submission order.
    let executor = BatchExecutor::with_width(session, 1);

    let groups: Vec<RequestGroup> = vec![
        RequestDescriptor::get("https://api.example.com/1").into(),
        RequestDescriptor::get("https://api.example.com/2").into(),
        RequestDescriptor::get("https://api.example.com/3").into(),
    ];
    let results = executor.execute(groups).await;

    assert_eq!(results[0].as_ref().unwrap().text(), "first");
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().text(), "third");
}
