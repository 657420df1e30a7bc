// care-client/tests/sync_cache.rs
// Offline-degraded reads against a scripted transport

use async_trait::async_trait;
use care_client::{
    Actor, ApiReply, ApiRequest, CareClient, ClientError, ClientResult, Freshness,
    OrderListQuery, Role, SyncCache, Transport, TransitionRequest,
};
use http::{Method, StatusCode};
use serde_json::{Value, json};
use shared::OrderStatus;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{Notify, oneshot};
use tokio_util::sync::CancellationToken;

fn ok(data: Value) -> Value {
    json!({"code": 0, "message": "OK", "data": data})
}

fn error(code: u16, message: &str) -> Value {
    json!({"code": code, "message": message})
}

fn view(id: &str, version: u64) -> Value {
    json!({
        "id": id,
        "kind": "prescription",
        "patient_id": "patient-1",
        "status": "sent_to_pharmacy",
        "relationship": "owner",
        "owner_tenant_id": "h-1",
        "status_history": [],
        "payload": {"kind": "prescription", "medication": "Lisinopril"},
        "routing": {"state": "routed"},
        "version": version,
        "created_at": 1,
        "updated_at": 2
    })
}

/// Replies by (method, path); unknown routes answer 404
#[derive(Default)]
struct FakeTransport {
    replies: Mutex<HashMap<(Method, String), ApiReply>>,
    offline: AtomicBool,
    /// Hold every reply far past any read timeout
    stalled: AtomicBool,
    calls: AtomicUsize,
}

impl FakeTransport {
    fn reply(&self, method: Method, path: &str, status: StatusCode, body: Value) {
        self.replies
            .lock()
            .unwrap()
            .insert((method, path.to_string()), ApiReply::json(status, &body));
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, _actor: &Actor, request: &ApiRequest) -> ClientResult<ApiReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Network("connection refused".into()));
        }
        if self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        let replies = self.replies.lock().unwrap();
        Ok(replies
            .get(&(request.method.clone(), request.path.clone()))
            .cloned()
            .unwrap_or_else(|| {
                ApiReply::json(StatusCode::NOT_FOUND, &error(4001, "Order not found"))
            }))
    }
}

fn nurse() -> Actor {
    Actor::new("nurse-ade", "h-1", Role::Nurse)
}

fn client(transport: &Arc<FakeTransport>, cache: &Arc<SyncCache>, actor: Actor) -> CareClient {
    CareClient::new(transport.clone(), cache.clone(), actor)
}

fn patient_query() -> OrderListQuery {
    OrderListQuery {
        patient_id: Some("patient-1".into()),
        kind: None,
    }
}

#[tokio::test]
async fn test_offline_list_is_served_stale() {
    let transport = Arc::new(FakeTransport::default());
    let cache = Arc::new(SyncCache::new());
    let client = client(&transport, &cache, nurse());
    let cancel = CancellationToken::new();
    transport.reply(Method::GET, "/api/orders", StatusCode::OK, ok(json!([view("o-1", 2)])));

    let fresh = client.list_orders(&patient_query(), &cancel).await.unwrap();
    assert_eq!(fresh.freshness, Freshness::Fresh);
    assert_eq!(fresh.data.len(), 1);

    transport.set_offline(true);
    let stale = client.list_orders(&patient_query(), &cancel).await.unwrap();
    assert_eq!(stale.freshness, Freshness::Stale);
    assert_eq!(stale.data[0].id, "o-1");

    // another filter is another key
    let other = OrderListQuery {
        patient_id: Some("patient-2".into()),
        kind: None,
    };
    let err = client.list_orders(&other, &cancel).await.unwrap_err();
    assert!(err.is_network_failure());
}

#[tokio::test]
async fn test_other_tenant_never_reads_the_entry() {
    let transport = Arc::new(FakeTransport::default());
    let cache = Arc::new(SyncCache::new());
    let cancel = CancellationToken::new();
    transport.reply(Method::GET, "/api/queue", StatusCode::OK, ok(json!([view("o-1", 2)])));

    client(&transport, &cache, nurse())
        .queue(&cancel)
        .await
        .unwrap();

    transport.set_offline(true);
    let pharmacist = client(&transport, &cache, Actor::new("rx-lee", "ph-1", Role::Pharmacist));
    assert!(pharmacist.queue(&cancel).await.unwrap_err().is_network_failure());
    let receptionist = client(&transport, &cache, Actor::new("desk", "h-1", Role::Receptionist));
    assert!(receptionist.queue(&cancel).await.unwrap_err().is_network_failure());
}

#[tokio::test]
async fn test_mutation_needs_network_and_invalidates_tenant() {
    let transport = Arc::new(FakeTransport::default());
    let cache = Arc::new(SyncCache::new());
    let client = client(&transport, &cache, nurse());
    let cancel = CancellationToken::new();
    transport.reply(Method::GET, "/api/orders/o-1", StatusCode::OK, ok(view("o-1", 1)));
    transport.reply(
        Method::POST,
        "/api/orders/o-1/transition",
        StatusCode::OK,
        ok(view("o-1", 2)),
    );

    client.get_order("o-1", &cancel).await.unwrap();
    assert_eq!(cache.len(), 1);

    let updated = client
        .transition("o-1", &TransitionRequest::to(OrderStatus::SentToPharmacy))
        .await
        .unwrap();
    assert_eq!(updated.version, 2);
    assert!(cache.is_empty());

    transport.set_offline(true);
    assert!(client.get_order("o-1", &cancel).await.unwrap_err().is_network_failure());
    let err = client
        .transition("o-1", &TransitionRequest::to(OrderStatus::Cancelled))
        .await
        .unwrap_err();
    assert!(err.is_network_failure());
}

#[tokio::test]
async fn test_rejected_mutation_keeps_cache() {
    let transport = Arc::new(FakeTransport::default());
    let cache = Arc::new(SyncCache::new());
    let client = client(&transport, &cache, nurse());
    transport.reply(Method::GET, "/api/orders/o-1", StatusCode::OK, ok(view("o-1", 1)));
    transport.reply(
        Method::POST,
        "/api/orders/o-1/transition",
        StatusCode::CONFLICT,
        error(4002, "Order o-1 is at version 2, request expected 1"),
    );

    client.get_order("o-1", &CancellationToken::new()).await.unwrap();
    let err = client
        .transition("o-1", &TransitionRequest::to(OrderStatus::Cancelled).expecting(1))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_not_found_evicts_entry() {
    let transport = Arc::new(FakeTransport::default());
    let cache = Arc::new(SyncCache::new());
    let client = client(&transport, &cache, nurse());
    let cancel = CancellationToken::new();
    transport.reply(Method::GET, "/api/orders/o-1", StatusCode::OK, ok(view("o-1", 1)));
    client.get_order("o-1", &cancel).await.unwrap();

    transport.reply(
        Method::GET,
        "/api/orders/o-1",
        StatusCode::FORBIDDEN,
        error(2001, "Permission denied"),
    );
    let err = client.get_order("o-1", &cancel).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert!(cache.is_empty());

    transport.set_offline(true);
    assert!(client.get_order("o-1", &cancel).await.unwrap_err().is_network_failure());
}

#[tokio::test]
async fn test_cancelled_read_writes_nothing() {
    let transport = Arc::new(FakeTransport::default());
    let cache = Arc::new(SyncCache::new());
    let client = client(&transport, &cache, nurse());
    transport.reply(Method::GET, "/api/queue", StatusCode::OK, ok(json!([])));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = client.queue(&cancel).await.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
    assert!(cache.is_empty());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}

/// First call blocks until released and answers `slow`; later calls
/// answer `fast` at once
struct GatedTransport {
    calls: AtomicUsize,
    entered: Notify,
    gate: tokio::sync::Mutex<Option<oneshot::Receiver<()>>>,
    slow: ApiReply,
    fast: ApiReply,
}

impl GatedTransport {
    fn new(slow: ApiReply, fast: ApiReply) -> (Arc<Self>, oneshot::Sender<()>) {
        let (release, gate) = oneshot::channel();
        let transport = Arc::new(Self {
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            gate: tokio::sync::Mutex::new(Some(gate)),
            slow,
            fast,
        });
        (transport, release)
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn send(&self, _actor: &Actor, _request: &ApiRequest) -> ClientResult<ApiReply> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.notify_one();
            let gate = self.gate.lock().await.take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            return Ok(self.slow.clone());
        }
        Ok(self.fast.clone())
    }
}

#[tokio::test]
async fn test_superseded_read_does_not_overwrite() {
    let (transport, release) = GatedTransport::new(
        ApiReply::json(StatusCode::OK, &ok(view("o-1", 1))),
        ApiReply::json(StatusCode::OK, &ok(view("o-1", 2))),
    );
    let cache = Arc::new(SyncCache::new());
    let client = CareClient::new(transport.clone(), cache.clone(), nurse());

    let slow = {
        let client = client.clone();
        tokio::spawn(async move { client.get_order("o-1", &CancellationToken::new()).await })
    };
    transport.entered.notified().await;

    let fast = client.get_order("o-1", &CancellationToken::new()).await.unwrap();
    assert_eq!(fast.data.version, 2);

    release.send(()).unwrap();
    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow.data.version, 1);

    let key = care_client::CacheKey::new(&nurse(), "/api/orders/o-1", Vec::new());
    assert_eq!(cache.peek(&key).unwrap().data["version"], 2);
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    let cancel = CancellationToken::new();

    {
        let transport = Arc::new(FakeTransport::default());
        transport.reply(Method::GET, "/api/queue", StatusCode::OK, ok(json!([view("o-1", 3)])));
        let cache = Arc::new(SyncCache::with_snapshot(&path).unwrap());
        client(&transport, &cache, nurse()).queue(&cancel).await.unwrap();
    }

    let transport = Arc::new(FakeTransport::default());
    transport.set_offline(true);
    let cache = Arc::new(SyncCache::with_snapshot(&path).unwrap());
    let queue = client(&transport, &cache, nurse()).queue(&cancel).await.unwrap();
    assert!(queue.is_stale());
    assert_eq!(queue.data[0].version, 3);
}

#[tokio::test]
async fn test_notifications_are_cached_per_user() {
    let transport = Arc::new(FakeTransport::default());
    let cache = Arc::new(SyncCache::new());
    let cancel = CancellationToken::new();
    transport.reply(
        Method::GET,
        "/api/notifications/unread-count",
        StatusCode::OK,
        ok(json!({"unread": 4})),
    );

    let first = client(&transport, &cache, nurse());
    assert_eq!(first.unread_count(&cancel).await.unwrap().data, 4);

    transport.set_offline(true);
    assert_eq!(first.unread_count(&cancel).await.unwrap().data, 4);
    let colleague = client(&transport, &cache, Actor::new("nurse-bo", "h-1", Role::Nurse));
    assert!(colleague.unread_count(&cancel).await.unwrap_err().is_network_failure());
}

#[tokio::test]
async fn test_late_not_found_keeps_newer_entry() {
    let (transport, release) = GatedTransport::new(
        ApiReply::json(StatusCode::NOT_FOUND, &error(4001, "Order not found")),
        ApiReply::json(StatusCode::OK, &ok(view("o-1", 2))),
    );
    let cache = Arc::new(SyncCache::new());
    let client = CareClient::new(transport.clone(), cache.clone(), nurse());

    let slow = {
        let client = client.clone();
        tokio::spawn(async move { client.get_order("o-1", &CancellationToken::new()).await })
    };
    transport.entered.notified().await;

    let fast = client.get_order("o-1", &CancellationToken::new()).await.unwrap();
    assert_eq!(fast.data.version, 2);

    release.send(()).unwrap();
    let err = slow.await.unwrap().unwrap_err();
    assert_eq!(err.status(), Some(404));

    let key = care_client::CacheKey::new(&nurse(), "/api/orders/o-1", Vec::new());
    assert_eq!(cache.peek(&key).unwrap().data["version"], 2);
}

#[tokio::test]
async fn test_timed_out_read_is_served_stale() {
    let transport = Arc::new(FakeTransport::default());
    let cache = Arc::new(SyncCache::new());
    let client = client(&transport, &cache, nurse()).with_read_timeout(Duration::from_millis(50));
    let cancel = CancellationToken::new();
    transport.reply(Method::GET, "/api/orders/o-1", StatusCode::OK, ok(view("o-1", 4)));

    client.get_order("o-1", &cancel).await.unwrap();

    transport.set_stalled(true);
    let stale = tokio::time::timeout(Duration::from_secs(5), client.get_order("o-1", &cancel))
        .await
        .expect("read was not bounded")
        .unwrap();
    assert_eq!(stale.freshness, Freshness::Stale);
    assert_eq!(stale.data.version, 4);

    // nothing cached for this one
    let err = tokio::time::timeout(Duration::from_secs(5), client.queue(&cancel))
        .await
        .expect("read was not bounded")
        .unwrap_err();
    assert!(err.is_network_failure());
}
