//! Care API client
//!
//! Reads go through the [`SyncCache`]; mutations always go to the server
//! and, once committed, invalidate the caller tenant's cached reads. Nothing
//! is queued while offline: a mutation without connectivity fails.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::Actor;
use shared::notification::{CreateNotification, NotificationRecord, UnreadCount};
use shared::order::{
    CorrectPayloadRequest, CreateOrderRequest, LabResult, ManualRouteRequest, OrderListQuery,
    OrderView, RecordResultRequest, TransitionRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheKey, Cached, SyncCache};
use crate::http::{ApiRequest, NetworkHttpClient, Transport};
use crate::{ClientConfig, ClientError, ClientResult};

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct CareClient {
    transport: Arc<dyn Transport>,
    cache: Arc<SyncCache>,
    actor: Actor,
    /// Upper bound on a network read before it falls back to the cache
    read_timeout: Duration,
}

impl std::fmt::Debug for CareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CareClient")
            .field("actor", &self.actor)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> ClientResult<T> {
    serde_json::from_value(value).map_err(Into::into)
}

fn to_body<B: Serialize>(body: &B) -> ClientResult<Value> {
    serde_json::to_value(body).map_err(Into::into)
}

impl CareClient {
    /// Network client from configuration
    pub fn connect(config: &ClientConfig) -> ClientResult<Self> {
        let transport = Arc::new(NetworkHttpClient::new(config)?);
        let cache = match &config.snapshot_path {
            Some(path) => SyncCache::with_snapshot(path)?,
            None => SyncCache::new(),
        };
        Ok(Self::new(transport, Arc::new(cache), config.actor.clone())
            .with_read_timeout(config.timeout))
    }

    /// Client over any transport; clients of different identities may
    /// share one cache
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<SyncCache>, actor: Actor) -> Self {
        Self {
            transport,
            cache,
            actor,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn cache(&self) -> &SyncCache {
        &self.cache
    }

    async fn call(&self, request: &ApiRequest) -> ClientResult<Value> {
        self.transport.send(&self.actor, request).await?.into_data()
    }

    /// Cache key of a read; per-user endpoints add the user id
    fn key_for(&self, request: &ApiRequest, per_user: bool) -> CacheKey {
        let mut params = request.query.clone();
        if per_user {
            params.push(("user".to_string(), self.actor.user_id.clone()));
        }
        CacheKey::new(&self.actor, request.path.clone(), params)
    }

    async fn cached_read<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        per_user: bool,
        cancel: &CancellationToken,
    ) -> ClientResult<Cached<T>> {
        let key = self.key_for(&request, per_user);
        let fetch = async {
            tokio::time::timeout(self.read_timeout, self.call(&request))
                .await
                .map_err(|_| {
                    ClientError::Network(format!(
                        "{} timed out after {}ms",
                        request.path,
                        self.read_timeout.as_millis()
                    ))
                })?
        };
        let cached = self.cache.read(key, cancel, fetch).await?;
        cached.try_map(decode)
    }

    async fn mutate<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        let data = self.call(&request).await?;
        let dropped = self.cache.invalidate_tenant(&self.actor.tenant_id);
        tracing::debug!(path = %request.path, dropped, "Mutation committed, tenant cache invalidated");
        decode(data)
    }

    // ========== Orders ==========

    pub async fn list_orders(
        &self,
        query: &OrderListQuery,
        cancel: &CancellationToken,
    ) -> ClientResult<Cached<Vec<OrderView>>> {
        let mut request = ApiRequest::get("/api/orders");
        if let Some(patient_id) = &query.patient_id {
            request = request.with_query("patient_id", patient_id.as_str());
        }
        if let Some(kind) = query.kind {
            request = request.with_query("kind", kind.as_str());
        }
        self.cached_read(request, false, cancel).await
    }

    pub async fn get_order(
        &self,
        order_id: &str,
        cancel: &CancellationToken,
    ) -> ClientResult<Cached<OrderView>> {
        self.cached_read(ApiRequest::get(format!("/api/orders/{}", order_id)), false, cancel)
            .await
    }

    /// Orders routed to the caller's tenant
    pub async fn queue(&self, cancel: &CancellationToken) -> ClientResult<Cached<Vec<OrderView>>> {
        self.cached_read(ApiRequest::get("/api/queue"), false, cancel).await
    }

    pub async fn create_order(&self, request: &CreateOrderRequest) -> ClientResult<OrderView> {
        self.mutate(ApiRequest::post("/api/orders", Some(to_body(request)?)))
            .await
    }

    /// Request a status change
    ///
    /// A 409 means the order moved on; re-read it before retrying.
    pub async fn transition(
        &self,
        order_id: &str,
        request: &TransitionRequest,
    ) -> ClientResult<OrderView> {
        self.mutate(ApiRequest::post(
            format!("/api/orders/{}/transition", order_id),
            Some(to_body(request)?),
        ))
        .await
    }

    pub async fn correct_payload(
        &self,
        order_id: &str,
        request: &CorrectPayloadRequest,
    ) -> ClientResult<OrderView> {
        self.mutate(ApiRequest::put(
            format!("/api/orders/{}/payload", order_id),
            to_body(request)?,
        ))
        .await
    }

    pub async fn record_result(&self, order_id: &str, result: LabResult) -> ClientResult<OrderView> {
        let body = to_body(&RecordResultRequest { result })?;
        self.mutate(ApiRequest::post(
            format!("/api/orders/{}/result", order_id),
            Some(body),
        ))
        .await
    }

    pub async fn route_manually(&self, order_id: &str, tenant_id: &str) -> ClientResult<OrderView> {
        let body = to_body(&ManualRouteRequest {
            tenant_id: tenant_id.to_string(),
        })?;
        self.mutate(ApiRequest::post(
            format!("/api/orders/{}/route", order_id),
            Some(body),
        ))
        .await
    }

    // ========== Notifications ==========

    pub async fn notifications(
        &self,
        unread_only: bool,
        cancel: &CancellationToken,
    ) -> ClientResult<Cached<Vec<NotificationRecord>>> {
        let mut request = ApiRequest::get("/api/notifications");
        if unread_only {
            request = request.with_query("unread_only", "true");
        }
        self.cached_read(request, true, cancel).await
    }

    pub async fn unread_count(&self, cancel: &CancellationToken) -> ClientResult<Cached<u64>> {
        let count: Cached<UnreadCount> = self
            .cached_read(ApiRequest::get("/api/notifications/unread-count"), true, cancel)
            .await?;
        count.try_map(|c| Ok::<_, ClientError>(c.unread))
    }

    pub async fn send_notification(
        &self,
        request: &CreateNotification,
    ) -> ClientResult<NotificationRecord> {
        self.mutate(ApiRequest::post("/api/notifications", Some(to_body(request)?)))
            .await
    }

    pub async fn mark_read(&self, notification_id: &str) -> ClientResult<NotificationRecord> {
        self.mutate(ApiRequest::post(
            format!("/api/notifications/{}/read", notification_id),
            None,
        ))
        .await
    }
}
