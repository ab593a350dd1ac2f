//! Integration tests: streamed downloads report progress while bytes arrive.

mod common;

use common::scripted_server::{self, Scripted};
use hcx_core::progress::TransferProgressCallback;
use hcx_core::response::Response;
use hcx_core::retry::{Failure, FixedDelay, RetryStrategy};
use hcx_core::transport::CurlTransport;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Seen {
    updates: Mutex<Vec<(u64, u64)>>,
    completes: Mutex<Vec<u64>>,
}

impl TransferProgressCallback for Seen {
    fn on_update(&self, transferred: u64, total: u64) {
        self.updates.lock().unwrap().push((transferred, total));
    }

    fn on_complete(&self, total: u64) {
        self.completes.lock().unwrap().push(total);
    }

    fn on_failure(&self, _error: &io::Error) {}
}

#[test]
fn large_body_reports_progress_per_chunk() {
    let body: Vec<u8> = (0u8..=250).cycle().take(256 * 1024).collect();
    let server = scripted_server::start(vec![Scripted::status(200).body(&body)]);
    let transport = CurlTransport::default();
    let seen = Arc::new(Seen::default());
    let callback: Arc<dyn TransferProgressCallback> = seen.clone();

    let mut out = Vec::<u8>::new();
    let response = transport
        .get_to(&server.url, &mut out, Some(callback))
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.body.is_empty());
    assert_eq!(out, body);
    let total = body.len() as u64;
    let updates = seen.updates.lock().unwrap().clone();
    assert!(updates.len() > 1, "expected several updates, got {:?}", updates);
    assert!(updates.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(updates.last(), Some(&(total, total)));
    assert_eq!(*seen.completes.lock().unwrap(), vec![total]);
}

#[test]
fn error_bodies_stay_out_of_the_sink() {
    let server = scripted_server::start(vec![
        Scripted::status(503).body(b"busy, come back later"),
        Scripted::status(200).body(b"payload"),
    ]);
    let transport = CurlTransport::default();
    let strategy = FixedDelay::new(3, Duration::from_millis(5))
        .unwrap()
        .with_max_jitter(Duration::ZERO);

    let mut out = Vec::<u8>::new();
    let outcome = strategy.invoke(|| transport.get_to(&server.url, &mut out, None));

    assert_eq!(outcome.attempts(), 2);
    assert!(matches!(outcome.failures()[0], Failure::ServerResponse { status: 503 }));
    assert!(outcome.is_success());
    assert_eq!(out, b"payload");
}

#[test]
fn unsuccessful_response_keeps_its_body() {
    let server = scripted_server::start(vec![Scripted::status(404).body(b"no such thing")]);
    let transport = CurlTransport::default();
    let seen = Arc::new(Seen::default());
    let callback: Arc<dyn TransferProgressCallback> = seen.clone();

    let mut out = Vec::<u8>::new();
    let response = transport
        .get_to(&server.url, &mut out, Some(callback))
        .unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(response.body, b"no such thing");
    assert!(out.is_empty());
    assert!(seen.updates.lock().unwrap().is_empty());
}
