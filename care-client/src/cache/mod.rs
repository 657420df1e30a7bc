//! Sync cache
//!
//! Read-through cache with an offline-degraded read path:
//!
//! - a successful network read stores the value and returns it `Fresh`
//! - when the server cannot be reached, the cached value comes back `Stale`
//! - a 403/404 answer evicts the entry, unless a newer read stored it
//!
//! Every read takes a ticket before it goes to the network. A result only
//! lands if its ticket is newer than the stored one and newer than the last
//! invalidation of its tenant, so a slow read never overwrites what a later
//! read or a mutation already settled.

mod key;
mod snapshot;

pub use key::CacheKey;
pub use snapshot::{SnapshotEntry, SnapshotStore};

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Straight from the server
    Fresh,
    /// Served from cache because the server was unreachable
    Stale,
}

/// A read result and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub data: T,
    pub freshness: Freshness,
    /// When the data left the server (ms)
    pub fetched_at: i64,
}

impl<T> Cached<T> {
    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }

    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Cached<U>, E> {
        Ok(Cached {
            data: f(self.data)?,
            freshness: self.freshness,
            fetched_at: self.fetched_at,
        })
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    ticket: u64,
    fetched_at: i64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, Entry>,
    /// tenant_id -> last ticket issued before its entries were invalidated
    floors: HashMap<String, u64>,
}

#[derive(Debug, Default)]
pub struct SyncCache {
    inner: RwLock<Inner>,
    next_ticket: AtomicU64,
    snapshot: Option<SnapshotStore>,
}

impl SyncCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache persisted at `path`, primed with the last snapshot
    ///
    /// Snapshot entries carry ticket 0, so any read of this session
    /// replaces them.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> ClientResult<Self> {
        let store = SnapshotStore::new(path);
        let entries = store.load()?;
        tracing::debug!(
            path = %store.path().display(),
            entries = entries.len(),
            "Cache snapshot loaded"
        );

        let mut inner = Inner::default();
        for e in entries {
            inner.entries.insert(
                e.key,
                Entry {
                    value: e.value,
                    ticket: 0,
                    fetched_at: e.fetched_at,
                },
            );
        }
        Ok(Self {
            inner: RwLock::new(inner),
            next_ticket: AtomicU64::new(0),
            snapshot: Some(store),
        })
    }

    fn ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Resolve `key` from the network, falling back to the cache offline
    ///
    /// `fetch` is not polled once `cancel` fires; a cancelled read returns
    /// [`ClientError::Cancelled`] and writes nothing.
    pub async fn read<F>(
        &self,
        key: CacheKey,
        cancel: &CancellationToken,
        fetch: F,
    ) -> ClientResult<Cached<Value>>
    where
        F: Future<Output = ClientResult<Value>>,
    {
        let ticket = self.ticket();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            result = fetch => result,
        };

        match result {
            Ok(value) => {
                let fetched_at = shared::util::now_millis();
                self.store(key, value.clone(), ticket, fetched_at);
                Ok(Cached {
                    data: value,
                    freshness: Freshness::Fresh,
                    fetched_at,
                })
            }
            Err(e) if e.is_network_failure() => match self.peek(&key) {
                Some(cached) => {
                    tracing::debug!(endpoint = %key.endpoint, error = %e, "Serving stale cache entry");
                    Ok(cached)
                }
                None => Err(e),
            },
            Err(e) => {
                if e.is_definitive_absence() {
                    self.evict_upto(&key, ticket);
                }
                Err(e)
            }
        }
    }

    /// Store a value obtained outside [`read`](Self::read)
    pub fn write(&self, key: CacheKey, value: Value) -> bool {
        let ticket = self.ticket();
        self.store(key, value, ticket, shared::util::now_millis())
    }

    fn store(&self, key: CacheKey, value: Value, ticket: u64, fetched_at: i64) -> bool {
        {
            let mut inner = self.inner.write();
            if inner
                .floors
                .get(&key.tenant_id)
                .is_some_and(|floor| ticket <= *floor)
            {
                tracing::debug!(endpoint = %key.endpoint, "Discarding read older than invalidation");
                return false;
            }
            if inner.entries.get(&key).is_some_and(|e| e.ticket > ticket) {
                tracing::debug!(endpoint = %key.endpoint, "Discarding superseded read");
                return false;
            }
            inner.entries.insert(
                key,
                Entry {
                    value,
                    ticket,
                    fetched_at,
                },
            );
        }
        self.persist_quietly();
        true
    }

    /// The cached value, marked stale
    pub fn peek(&self, key: &CacheKey) -> Option<Cached<Value>> {
        self.inner.read().entries.get(key).map(|e| Cached {
            data: e.value.clone(),
            freshness: Freshness::Stale,
            fetched_at: e.fetched_at,
        })
    }

    pub fn evict(&self, key: &CacheKey) {
        self.evict_upto(key, u64::MAX);
    }

    /// Evict unless a read newer than `ticket` already stored the entry
    fn evict_upto(&self, key: &CacheKey, ticket: u64) {
        let removed = {
            let mut inner = self.inner.write();
            match inner.entries.get(key) {
                Some(e) if e.ticket > ticket => {
                    tracing::debug!(endpoint = %key.endpoint, "Keeping entry stored by a newer read");
                    false
                }
                Some(_) => inner.entries.remove(key).is_some(),
                None => false,
            }
        };
        if removed {
            self.persist_quietly();
        }
    }

    /// Drop every entry of `tenant_id` and reject reads already in flight
    pub fn invalidate_tenant(&self, tenant_id: &str) -> usize {
        let removed = {
            let mut inner = self.inner.write();
            let floor = self.next_ticket.load(Ordering::SeqCst);
            inner.floors.insert(tenant_id.to_string(), floor);
            let before = inner.entries.len();
            inner.entries.retain(|k, _| k.tenant_id != tenant_id);
            before - inner.entries.len()
        };
        if removed > 0 {
            self.persist_quietly();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the snapshot now
    pub fn persist(&self) -> ClientResult<()> {
        let Some(store) = &self.snapshot else {
            return Ok(());
        };
        let entries = self
            .inner
            .read()
            .entries
            .iter()
            .map(|(key, e)| SnapshotEntry {
                key: key.clone(),
                value: e.value.clone(),
                fetched_at: e.fetched_at,
            })
            .collect();
        store.save(entries)
    }

    fn persist_quietly(&self) {
        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "Failed to write cache snapshot");
        }
    }
}
