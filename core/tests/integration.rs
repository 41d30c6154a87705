//! End-to-end requests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port on its own thread, then drives a
//! `RequestCoordinator` with the real `UreqFetcher` and checks what gets
//! published for each server behaviour.

use std::sync::Arc;
use std::time::Duration;

use mock_server::{Behavior, EarthquakeList, MockState, Status};
use quake_core::{BoundingBox, Endpoint, RequestCoordinator, RequestState, Subscription, UreqFetcher, BUSY_MESSAGE};
use tokio::runtime::Handle;

fn start_server(behavior: Behavior) -> (String, Arc<MockState>) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let state = Arc::new(MockState::new(behavior));
    let server_state = state.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, server_state).await
        })
        .unwrap();
    });

    (format!("http://{addr}"), state)
}

fn coordinator(base_url: &str, username: &str) -> RequestCoordinator {
    let endpoint = Endpoint::new(base_url, BoundingBox::default(), username);
    RequestCoordinator::new(endpoint, Arc::new(UreqFetcher::new()), Handle::current())
}

async fn next(sub: &mut Subscription<String>) -> String {
    tokio::time::timeout(Duration::from_secs(10), sub.recv())
        .await
        .expect("timed out waiting for publish")
        .expect("observable closed")
}

#[tokio::test(flavor = "multi_thread")]
async fn success_publishes_pretty_printed_catalog() {
    let (base, state) = start_server(Behavior::Earthquakes);
    let coordinator = coordinator(&base, "demo");
    let mut sub = coordinator.observe().subscribe();

    assert!(coordinator.submit());
    assert_eq!(next(&mut sub).await, BUSY_MESSAGE);
    let published = next(&mut sub).await;

    let list: EarthquakeList = serde_json::from_str(&published).unwrap();
    assert_eq!(list.earthquakes.len(), 2);
    assert!(published.contains("\n  \"earthquakes\": ["));
    assert_eq!(coordinator.state(), RequestState::Succeeded(published));
    assert_eq!(state.hits(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_status_is_network_failure() {
    let (base, _) = start_server(Behavior::Status(Status::SERVICE_UNAVAILABLE));
    let coordinator = coordinator(&base, "demo");
    let mut sub = coordinator.observe().subscribe();

    coordinator.submit();
    assert_eq!(next(&mut sub).await, BUSY_MESSAGE);
    let message = next(&mut sub).await;
    assert!(message.starts_with("Network request failed: HTTP 503: "), "{message}");
    assert!(message.contains("simulated failure"), "{message}");
    assert_eq!(coordinator.state(), RequestState::Failed(message));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_username_is_network_failure() {
    let (base, _) = start_server(Behavior::Earthquakes);
    let coordinator = coordinator(&base, "");
    let mut sub = coordinator.observe().subscribe();

    coordinator.submit();
    next(&mut sub).await;
    let message = next(&mut sub).await;
    assert!(message.starts_with("Network request failed: HTTP 401: "), "{message}");
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_body_is_format_failure() {
    let (base, _) = start_server(Behavior::Malformed);
    let coordinator = coordinator(&base, "demo");
    let mut sub = coordinator.observe().subscribe();

    coordinator.submit();
    next(&mut sub).await;
    let message = next(&mut sub).await;
    assert!(message.starts_with("Response formatting failed: "), "{message}");
    assert!(matches!(coordinator.state(), RequestState::Failed(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn connection_refused_is_network_failure() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let coordinator = coordinator(&format!("http://127.0.0.1:{port}"), "demo");
    let mut sub = coordinator.observe().subscribe();

    coordinator.submit();
    assert_eq!(next(&mut sub).await, BUSY_MESSAGE);
    let message = next(&mut sub).await;
    assert!(message.starts_with("Network request failed: "), "{message}");
    assert!(message.len() > "Network request failed: ".len());
}

#[tokio::test(flavor = "multi_thread")]
async fn rapid_submits_issue_one_request() {
    let (base, state) = start_server(Behavior::Delayed(Duration::from_millis(300)));
    let coordinator = coordinator(&base, "demo");
    let mut sub = coordinator.observe().subscribe();

    assert!(coordinator.submit());
    for _ in 0..10 {
        assert!(!coordinator.submit());
    }
    assert_eq!(next(&mut sub).await, BUSY_MESSAGE);
    next(&mut sub).await;
    assert_eq!(state.hits(), 1);
    assert_eq!(sub.try_recv(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn resubmit_after_completion_issues_new_request() {
    let (base, state) = start_server(Behavior::Earthquakes);
    let coordinator = coordinator(&base, "demo");
    let mut sub = coordinator.observe().subscribe();

    coordinator.submit();
    next(&mut sub).await;
    let first = next(&mut sub).await;

    assert!(coordinator.submit());
    assert_eq!(next(&mut sub).await, BUSY_MESSAGE);
    let second = next(&mut sub).await;

    assert_eq!(first, second);
    assert_eq!(state.hits(), 2);
}
