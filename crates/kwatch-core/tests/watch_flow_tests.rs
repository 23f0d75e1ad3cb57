use kwatch_core::http::testing::MockNetwork;
use kwatch_core::http::{StaticToken, TokenSource};
use kwatch_core::{
    ClientConfig, DecodeMode, Payload, Resource, StreamOptions, WatchClient, WatchError,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PODS: &str = "/api/v1/pods";
const PODS_URL: &str = "http://h/api/v1/pods";

fn client(network: &Arc<MockNetwork>) -> WatchClient {
    WatchClient::new(
        network.clone(),
        Arc::new(StaticToken::new("tok")),
        ClientConfig::new("http://h"),
    )
}

fn seed_pods(network: &MockNetwork) {
    network.respond(
        PODS_URL,
        json!({
            "kind": "PodList",
            "apiVersion": "v1",
            "metadata": {"resourceVersion": "100"},
            "items": [{"metadata": {"uid": "a", "name": "web", "resourceVersion": "5"}}]
        }),
    );
}

fn versions(items: &[Resource]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|r| {
            (
                r.uid().to_string(),
                r.resource_version().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

fn pair(uid: &str, rv: &str) -> (String, String) {
    (uid.to_string(), rv.to_string())
}

fn event(kind: &str, uid: &str, rv: &str) -> serde_json::Value {
    json!({"type": kind, "object": {"metadata": {"uid": uid, "resourceVersion": rv}}})
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test]
async fn test_collection_reconciliation_scenarios() {
    let network = Arc::new(MockNetwork::new());
    seed_pods(&network);
    let (handle, mut updates) = client(&network).watch_collection(PODS);

    // Seed
    let seeded = updates.recv().await.unwrap().unwrap();
    assert_eq!(versions(&seeded), vec![pair("a", "5")]);
    assert_eq!(seeded[0].kind.as_deref(), Some("Pod"));

    let remote = network.next_connection().await;
    assert_eq!(remote.url, "ws://h/api/v1/pods?watch=1&resourceVersion=100");
    assert!(remote
        .protocols
        .iter()
        .any(|p| p.starts_with("base64url.bearer.authorization.k8s.io.")));

    // Scenario 1: ADDED b
    remote.send_json(&event("ADDED", "b", "1"));
    let items = updates.recv().await.unwrap().unwrap();
    assert_eq!(versions(&items), vec![pair("a", "5"), pair("b", "1")]);

    // Scenario 2: stale MODIFIED is dropped but still republished
    remote.send_json(&event("MODIFIED", "a", "3"));
    let items = updates.recv().await.unwrap().unwrap();
    assert_eq!(versions(&items), vec![pair("a", "5"), pair("b", "1")]);

    // Scenario 3: newer MODIFIED merges
    remote.send_json(&json!({
        "type": "MODIFIED",
        "object": {"metadata": {"uid": "a", "resourceVersion": "6"}, "status": {"phase": "Running"}}
    }));
    let items = updates.recv().await.unwrap().unwrap();
    assert_eq!(versions(&items), vec![pair("a", "6"), pair("b", "1")]);
    assert_eq!(items[0].fields["status"]["phase"], "Running");
    assert_eq!(items[0].kind.as_deref(), Some("Pod"));
    assert_eq!(items[0].action_type.as_deref(), Some("MODIFIED"));

    // Scenario 4: DELETED a
    remote.send_json(&event("DELETED", "a", "7"));
    let items = updates.recv().await.unwrap().unwrap();
    assert_eq!(versions(&items), vec![pair("b", "1")]);

    // Scenario 5: ERROR leaves the mirror alone but still republishes
    remote.send_json(&json!({"type": "ERROR", "object": {"kind": "Status", "code": 410}}));
    let items = updates.recv().await.unwrap().unwrap();
    assert_eq!(versions(&items), vec![pair("b", "1")]);

    // Unknown types behave like ERROR
    remote.send_json(&event("BOOKMARK", "b", "50"));
    let items = updates.recv().await.unwrap().unwrap();
    assert_eq!(versions(&items), vec![pair("b", "1")]);

    // DELETED of an absent key republishes too
    remote.send_json(&event("DELETED", "zz", "1"));
    let items = updates.recv().await.unwrap().unwrap();
    assert_eq!(versions(&items), vec![pair("b", "1")]);

    // A malformed frame is dropped without a publish
    remote.send_text("{\"type\":");
    remote.send_json(&event("ADDED", "c", "2"));
    let items = updates.recv().await.unwrap().unwrap();
    assert_eq!(versions(&items), vec![pair("b", "1"), pair("c", "2")]);

    handle.cancel();
}

#[tokio::test]
async fn test_deleted_entry_can_be_resurrected() {
    let network = Arc::new(MockNetwork::new());
    seed_pods(&network);
    let (_handle, mut updates) = client(&network).watch_collection(PODS);
    updates.recv().await.unwrap().unwrap();
    let remote = network.next_connection().await;

    remote.send_json(&event("DELETED", "a", "9"));
    assert!(updates.recv().await.unwrap().unwrap().is_empty());

    remote.send_json(&event("MODIFIED", "a", "2"));
    let items = updates.recv().await.unwrap().unwrap();
    assert_eq!(versions(&items), vec![pair("a", "2")]);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_persistence_keeps_mirror() {
    let network = Arc::new(MockNetwork::new());
    seed_pods(&network);
    let (handle, mut updates) = client(&network).watch_collection(PODS);
    updates.recv().await.unwrap().unwrap();

    let mut remote = network.next_connection().await;
    remote.send_json(&event("ADDED", "b", "1"));
    updates.recv().await.unwrap().unwrap();
    settle().await;
    let mut last_handle = handle.current_handle();
    assert!(last_handle.is_some());

    for _ in 0..3 {
        let closed_at = tokio::time::Instant::now();
        remote.close();
        remote = network.next_connection().await;
        assert!(closed_at.elapsed() >= Duration::from_millis(3000));
        assert_eq!(remote.url, "ws://h/api/v1/pods?watch=1&resourceVersion=100");
        settle().await;
        assert_ne!(handle.current_handle(), last_handle);
        last_handle = handle.current_handle();
    }

    // Nothing was published while reconnecting, and nothing was lost.
    assert!(updates.try_recv().is_none());
    remote.send_json(&event("ADDED", "c", "3"));
    let items = updates.recv().await.unwrap().unwrap();
    assert_eq!(
        versions(&items),
        vec![pair("a", "5"), pair("b", "1"), pair("c", "3")]
    );
    handle.cancel();
}

#[tokio::test]
async fn test_cancel_silences_stream() {
    let network = Arc::new(MockNetwork::new());
    seed_pods(&network);
    let (handle, mut updates) = client(&network).watch_collection(PODS);
    updates.recv().await.unwrap().unwrap();
    let remote = network.next_connection().await;

    handle.cancel();
    remote.send_json(&event("ADDED", "b", "1"));

    assert!(remote.close_requested().await);
    assert!(updates.recv().await.is_none());
    assert!(handle.is_cancelled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_publish_after_cancel_returns_on_worker_threads() {
    for _ in 0..10 {
        let network = Arc::new(MockNetwork::new());
        seed_pods(&network);
        let returned = Arc::new(AtomicBool::new(false));
        let published = Arc::new(AtomicUsize::new(0));
        let late = Arc::new(AtomicUsize::new(0));
        let (r, p, l) = (returned.clone(), published.clone(), late.clone());
        let handle = client(&network).watch_collection_with(
            PODS,
            move |_| {
                p.fetch_add(1, Ordering::SeqCst);
                if r.load(Ordering::SeqCst) {
                    l.fetch_add(1, Ordering::SeqCst);
                }
            },
            None,
        );

        let remote = network.next_connection().await;
        for n in 0..1000 {
            remote.send_json(&event("ADDED", &format!("u{}", n), "1"));
        }
        while published.load(Ordering::SeqCst) < 3 {
            tokio::task::yield_now().await;
        }
        handle.cancel();
        returned.store(true, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(late.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_fetch() {
    let network = Arc::new(MockNetwork::new());
    seed_pods(&network);
    network.hold_fetches();

    let calls = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let (c, e) = (calls.clone(), errors.clone());
    let handle = client(&network).watch_collection_with(
        PODS,
        move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        },
        Some(Box::new(move |_: WatchError| {
            e.fetch_add(1, Ordering::SeqCst);
        })),
    );
    settle().await;
    handle.cancel();
    network.release_fetches();

    assert!(network
        .try_next_connection(Duration::from_secs(10))
        .await
        .is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
    assert!(!handle.is_streaming());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_is_reported_and_never_streams() {
    let network = Arc::new(MockNetwork::new());
    network.fail(PODS_URL, 403, "forbidden");
    let (handle, mut updates) = client(&network).watch_collection(PODS);

    let err = updates.recv().await.unwrap().unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert!(updates.recv().await.is_none());
    assert!(!handle.is_streaming());
    assert!(network
        .try_next_connection(Duration::from_secs(10))
        .await
        .is_none());
}

struct CountingToken(AtomicUsize);

impl TokenSource for CountingToken {
    fn token(&self) -> Option<String> {
        Some("expired".into())
    }

    fn on_unauthorized(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_unauthorized_fetch_triggers_logout() {
    let network = Arc::new(MockNetwork::new());
    network.fail(PODS_URL, 401, "Unauthorized");
    let auth = Arc::new(CountingToken(AtomicUsize::new(0)));
    let client = WatchClient::new(network.clone(), auth.clone(), ClientConfig::new("http://h"));

    let (_handle, mut updates) = client.watch_collection(PODS);
    let err = updates.recv().await.unwrap().unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(auth.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropping_updates_cancels_watch() {
    let network = Arc::new(MockNetwork::new());
    seed_pods(&network);
    let (handle, mut updates) = client(&network).watch_collection(PODS);
    updates.recv().await.unwrap().unwrap();
    let remote = network.next_connection().await;

    drop(updates);
    remote.send_json(&event("ADDED", "b", "1"));
    assert!(remote.close_requested().await);
    assert!(handle.is_cancelled());
}

#[tokio::test]
async fn test_item_watch_forwards_objects() {
    let network = Arc::new(MockNetwork::new());
    network.respond(
        "http://h/api/v1/namespaces/default/pods/web",
        json!({"kind": "Pod", "metadata": {"uid": "a", "name": "web", "resourceVersion": "5"}}),
    );
    let (handle, mut updates) = client(&network).watch_item("/api/v1/namespaces/default/pods", "web");

    let item = updates.recv().await.unwrap().unwrap();
    assert_eq!(item.name(), Some("web"));
    assert_eq!(item.resource_version(), Some("5"));

    let remote = network.next_connection().await;
    assert_eq!(
        remote.url,
        "ws://h/api/v1/namespaces/default/pods?watch=1&fieldSelector=metadata.name%3Dweb"
    );

    remote.send_json(&json!({
        "type": "MODIFIED",
        "object": {"kind": "Pod", "metadata": {"uid": "a", "name": "web", "resourceVersion": "7"}}
    }));
    let item = updates.recv().await.unwrap().unwrap();
    assert_eq!(item.resource_version(), Some("7"));

    // The event type is not inspected for single items.
    remote.send_json(&event("DELETED", "a", "8"));
    let item = updates.recv().await.unwrap().unwrap();
    assert_eq!(item.resource_version(), Some("8"));

    handle.cancel();
    assert!(updates.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_item_fetch_failure_calls_on_error() {
    let network = Arc::new(MockNetwork::new());
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let errors = seen.clone();
    let items = Arc::new(AtomicUsize::new(0));
    let counter = items.clone();

    let handle = client(&network).watch_item_with(
        "/api/v1/namespaces/default/pods",
        "missing",
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        Some(Box::new(move |e: WatchError| {
            errors.lock().unwrap().push(e.to_string());
        })),
    );
    settle().await;

    assert_eq!(items.load(Ordering::SeqCst), 0);
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(seen.lock().unwrap()[0].contains("404"));
    assert!(!handle.is_streaming());
    assert!(network
        .try_next_connection(Duration::from_secs(10))
        .await
        .is_none());
}

#[tokio::test]
async fn test_item_watch_rejects_empty_name() {
    let network = Arc::new(MockNetwork::new());
    let (_handle, mut updates) = client(&network).watch_item("/api/v1/pods", "");
    let err = updates.recv().await.unwrap().unwrap_err();
    assert!(matches!(err, WatchError::InvalidName(_)));
    assert!(network.fetches().is_empty());
}

#[tokio::test]
async fn test_open_stream_raw() {
    let network = Arc::new(MockNetwork::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let stream = client(&network).open_stream(
        "/api/v1/namespaces/default/pods/web/log?follow=true",
        move |p| sink.lock().unwrap().push(p),
        StreamOptions::new().with_decode(DecodeMode::Raw),
    );

    let remote = network.next_connection().await;
    remote.send_text("line one");
    settle().await;
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[Payload::Raw(bytes::Bytes::from_static(b"line one"))]
    );
    stream.cancel();
    assert!(remote.close_requested().await);
}
