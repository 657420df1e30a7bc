//! redb-based storage layer for clinical orders
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Current record incl. full history |
//! | `orders_by_patient` | `(patient_id, order_id)` | `()` | Patient index |
//! | `orders_by_owner` | `(tenant_id, order_id)` | `()` | Owner tenant index |
//! | `tenant_queue` | `(tenant_id, order_id)` | `QueueEntry` | Receiving tenant work queue |
//! | `pending_dispatch` | `job_id` | `DispatchJob` | Side-effect jobs awaiting the worker |
//! | `dead_letter` | `job_id` | `DeadLetterEntry` | Jobs that exhausted their retries |
//!
//! # Durability
//!
//! Every mutation and the dispatch job it produces are written in one write
//! transaction, so a crash never leaves a committed transition without its
//! pending side effects.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::{Deserialize, Serialize};
use shared::order::{Order, OrderEvent, QueueEntry};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Index: (patient_id, order_id) -> ()
const ORDERS_BY_PATIENT_TABLE: TableDefinition<(&str, &str), ()> =
    TableDefinition::new("orders_by_patient");

/// Index: (owner_tenant_id, order_id) -> ()
const ORDERS_BY_OWNER_TABLE: TableDefinition<(&str, &str), ()> =
    TableDefinition::new("orders_by_owner");

/// key = (receiving tenant_id, order_id), value = JSON-serialized QueueEntry
const TENANT_QUEUE_TABLE: TableDefinition<(&str, &str), &[u8]> =
    TableDefinition::new("tenant_queue");

/// key = job_id, value = JSON-serialized DispatchJob
const PENDING_DISPATCH_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("pending_dispatch");

/// key = job_id, value = JSON-serialized DeadLetterEntry
const DEAD_LETTER_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("dead_letter");

/// Side-effect job written together with the mutation that caused it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchJob {
    /// Same as the event id
    pub job_id: String,
    pub order_id: String,
    pub event: OrderEvent,
    pub created_at: i64,
    pub retry_count: u32,
    #[serde(default)]
    pub last_attempt_at: Option<i64>,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Job that failed permanently
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub job_id: String,
    pub order_id: String,
    pub event: OrderEvent,
    pub created_at: i64,
    pub failed_at: i64,
    pub retry_count: u32,
    pub last_error: String,
}

/// Storage statistics
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StorageStats {
    pub order_count: u64,
    pub pending_dispatch_count: u64,
    pub dead_letter_count: u64,
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Order storage backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for OrderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStorage").finish_non_exhaustive()
    }
}

impl OrderStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ORDERS_BY_PATIENT_TABLE)?;
            let _ = write_txn.open_table(ORDERS_BY_OWNER_TABLE)?;
            let _ = write_txn.open_table(TENANT_QUEUE_TABLE)?;
            let _ = write_txn.open_table(PENDING_DISPATCH_TABLE)?;
            let _ = write_txn.open_table(DEAD_LETTER_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Orders ==========

    /// Store an order and maintain its indexes (within transaction)
    pub fn store_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let value = serde_json::to_vec(order)?;
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            table.insert(order.id.as_str(), value.as_slice())?;
        }
        {
            let mut table = txn.open_table(ORDERS_BY_PATIENT_TABLE)?;
            table.insert((order.patient_id.as_str(), order.id.as_str()), ())?;
        }
        {
            let mut table = txn.open_table(ORDERS_BY_OWNER_TABLE)?;
            table.insert((order.owner_tenant_id.as_str(), order.id.as_str()), ())?;
        }
        Ok(())
    }

    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Load an order inside a write transaction
    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        let order = match table.get(order_id)? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(order)
    }

    /// Orders of a patient, oldest first
    pub fn get_orders_for_patient(&self, patient_id: &str) -> StorageResult<Vec<Order>> {
        let ids = self.index_range(ORDERS_BY_PATIENT_TABLE, patient_id)?;
        self.load_orders(&ids)
    }

    /// Orders owned by a tenant, oldest first
    pub fn get_orders_for_owner(&self, tenant_id: &str) -> StorageResult<Vec<Order>> {
        let ids = self.index_range(ORDERS_BY_OWNER_TABLE, tenant_id)?;
        self.load_orders(&ids)
    }

    fn index_range(
        &self,
        definition: TableDefinition<'static, (&'static str, &'static str), ()>,
        prefix: &str,
    ) -> StorageResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(definition)?;
        let mut ids = Vec::new();
        for result in table.range((prefix, "")..)? {
            let (key, _) = result?;
            let (owner, order_id) = key.value();
            if owner != prefix {
                break;
            }
            ids.push(order_id.to_string());
        }
        Ok(ids)
    }

    fn load_orders(&self, ids: &[String]) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(value) = table.get(id.as_str())? {
                orders.push(serde_json::from_slice::<Order>(value.value())?);
            }
        }
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    // ========== Tenant Queue ==========

    /// Insert a queue entry unless one exists for the same (tenant, order)
    ///
    /// Returns `true` if the entry was created.
    pub fn insert_queue_entry(
        &self,
        txn: &WriteTransaction,
        entry: &QueueEntry,
    ) -> StorageResult<bool> {
        let mut table = txn.open_table(TENANT_QUEUE_TABLE)?;
        let key = (entry.tenant_id.as_str(), entry.order_id.as_str());
        if table.get(key)?.is_some() {
            return Ok(false);
        }
        let value = serde_json::to_vec(entry)?;
        table.insert(key, value.as_slice())?;
        Ok(true)
    }

    /// Queue of a receiving tenant, oldest first
    pub fn get_queue(&self, tenant_id: &str) -> StorageResult<Vec<QueueEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TENANT_QUEUE_TABLE)?;
        let mut entries = Vec::new();
        for result in table.range((tenant_id, "")..)? {
            let (key, value) = result?;
            if key.value().0 != tenant_id {
                break;
            }
            entries.push(serde_json::from_slice::<QueueEntry>(value.value())?);
        }
        entries.sort_by_key(|e| e.queued_at);
        Ok(entries)
    }

    // ========== Pending Dispatch Queue ==========

    /// Enqueue the side effects of a committed event (within transaction)
    pub fn enqueue_dispatch(&self, txn: &WriteTransaction, event: &OrderEvent) -> StorageResult<()> {
        let mut table = txn.open_table(PENDING_DISPATCH_TABLE)?;
        let job = DispatchJob {
            job_id: event.event_id.clone(),
            order_id: event.order.id.clone(),
            event: event.clone(),
            created_at: event.timestamp,
            retry_count: 0,
            last_attempt_at: None,
            last_error: None,
        };
        let value = serde_json::to_vec(&job)?;
        table.insert(job.job_id.as_str(), value.as_slice())?;
        Ok(())
    }

    pub fn get_dispatch(&self, job_id: &str) -> StorageResult<Option<DispatchJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_DISPATCH_TABLE)?;
        match table.get(job_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All pending jobs, oldest first
    pub fn get_pending_dispatches(&self) -> StorageResult<Vec<DispatchJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_DISPATCH_TABLE)?;

        let mut jobs = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            jobs.push(serde_json::from_slice::<DispatchJob>(value.value())?);
        }
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    /// Job succeeded: drop it from the queue
    pub fn complete_dispatch(&self, job_id: &str) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(PENDING_DISPATCH_TABLE)?;
            table.remove(job_id)?;
        }
        txn.commit()?;
        tracing::debug!(job_id = %job_id, "Dispatch job completed");
        Ok(())
    }

    /// Record a failed attempt; returns the new retry count
    pub fn mark_dispatch_failed(&self, job_id: &str, error: &str) -> StorageResult<u32> {
        let txn = self.begin_write()?;
        let mut retry_count = 0;
        {
            let mut table = txn.open_table(PENDING_DISPATCH_TABLE)?;

            // Read and clone first to avoid borrow conflict
            let job_opt = if let Some(value) = table.get(job_id)? {
                Some(serde_json::from_slice::<DispatchJob>(value.value())?)
            } else {
                None
            };

            if let Some(mut job) = job_opt {
                job.retry_count += 1;
                job.last_attempt_at = Some(shared::util::now_millis());
                job.last_error = Some(error.to_string());
                retry_count = job.retry_count;
                let new_value = serde_json::to_vec(&job)?;
                table.insert(job_id, new_value.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(retry_count)
    }

    /// Move a job from the pending queue to the dead letter queue
    pub fn move_to_dead_letter(&self, job_id: &str, error: &str) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut pending_table = txn.open_table(PENDING_DISPATCH_TABLE)?;
            let mut dead_letter_table = txn.open_table(DEAD_LETTER_TABLE)?;

            let job_opt = if let Some(value) = pending_table.get(job_id)? {
                Some(serde_json::from_slice::<DispatchJob>(value.value())?)
            } else {
                None
            };

            if let Some(job) = job_opt {
                let entry = DeadLetterEntry {
                    job_id: job.job_id.clone(),
                    order_id: job.order_id.clone(),
                    event: job.event,
                    created_at: job.created_at,
                    failed_at: shared::util::now_millis(),
                    retry_count: job.retry_count,
                    last_error: error.to_string(),
                };
                let value = serde_json::to_vec(&entry)?;
                dead_letter_table.insert(job_id, value.as_slice())?;
                pending_table.remove(job_id)?;
            }
        }
        txn.commit()?;
        tracing::warn!(job_id = %job_id, error = %error, "Dispatch job moved to dead letter queue");
        Ok(())
    }

    pub fn get_dead_letters(&self) -> StorageResult<Vec<DeadLetterEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DEAD_LETTER_TABLE)?;

        let mut entries = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            entries.push(serde_json::from_slice::<DeadLetterEntry>(value.value())?);
        }
        Ok(entries)
    }

    // ========== Statistics ==========

    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        let pending = read_txn.open_table(PENDING_DISPATCH_TABLE)?;
        let dead = read_txn.open_table(DEAD_LETTER_TABLE)?;
        Ok(StorageStats {
            order_count: orders.len()?,
            pending_dispatch_count: pending.len()?,
            dead_letter_count: dead.len()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{
        Actor, AppointmentPayload, OrderEventType, OrderKind, OrderPayload, Role,
    };

    fn create_test_order(id: &str, patient: &str, tenant: &str, created_at: i64) -> Order {
        Order::new(
            id.to_string(),
            patient.to_string(),
            OrderPayload::Appointment(AppointmentPayload {
                scheduled_at: 1_700_000_000_000,
                provider_name: "Dr. Lin".into(),
                department: None,
                reason: None,
                clinical_notes: None,
            }),
            Actor::new("u-1", tenant, Role::Receptionist),
            created_at,
        )
    }

    fn create_test_event(order: &Order) -> OrderEvent {
        OrderEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: OrderEventType::Created,
            previous_status: None,
            new_status: order.status,
            actor: order.created_by.clone(),
            timestamp: order.created_at,
            order: order.clone(),
        }
    }

    fn store(storage: &OrderStorage, order: &Order) {
        let txn = storage.begin_write().unwrap();
        storage.store_order(&txn, order).unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn test_order_storage_and_indexes() {
        let storage = OrderStorage::open_in_memory().unwrap();
        store(&storage, &create_test_order("o-2", "p-1", "h-1", 20));
        store(&storage, &create_test_order("o-1", "p-1", "h-2", 10));
        store(&storage, &create_test_order("o-3", "p-10", "h-1", 30));

        let loaded = storage.get_order("o-1").unwrap().unwrap();
        assert_eq!(loaded.kind, OrderKind::Appointment);
        assert!(storage.get_order("missing").unwrap().is_none());

        // prefix "p-1" must not pick up "p-10"
        let by_patient = storage.get_orders_for_patient("p-1").unwrap();
        let ids: Vec<_> = by_patient.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["o-1", "o-2"]);

        let by_owner = storage.get_orders_for_owner("h-1").unwrap();
        let ids: Vec<_> = by_owner.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["o-2", "o-3"]);
    }

    #[test]
    fn test_queue_entry_is_unique_per_tenant_and_order() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let entry = QueueEntry {
            tenant_id: "ph-1".into(),
            order_id: "o-1".into(),
            kind: OrderKind::Prescription,
            patient_id: "p-1".into(),
            source_tenant_id: "h-1".into(),
            queued_at: 5,
        };

        let txn = storage.begin_write().unwrap();
        assert!(storage.insert_queue_entry(&txn, &entry).unwrap());
        assert!(!storage.insert_queue_entry(&txn, &entry).unwrap());
        txn.commit().unwrap();

        assert_eq!(storage.get_queue("ph-1").unwrap().len(), 1);
        assert!(storage.get_queue("ph-2").unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_queue_lifecycle() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let order = create_test_order("o-1", "p-1", "h-1", 10);
        let event = create_test_event(&order);

        let txn = storage.begin_write().unwrap();
        storage.store_order(&txn, &order).unwrap();
        storage.enqueue_dispatch(&txn, &event).unwrap();
        txn.commit().unwrap();

        let pending = storage.get_pending_dispatches().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].job_id, event.event_id);
        assert_eq!(pending[0].retry_count, 0);

        assert_eq!(storage.mark_dispatch_failed(&event.event_id, "timeout").unwrap(), 1);
        assert_eq!(storage.mark_dispatch_failed(&event.event_id, "timeout").unwrap(), 2);
        let job = storage.get_dispatch(&event.event_id).unwrap().unwrap();
        assert_eq!(job.last_error.as_deref(), Some("timeout"));
        assert!(job.last_attempt_at.is_some());

        storage.complete_dispatch(&event.event_id).unwrap();
        assert!(storage.get_pending_dispatches().unwrap().is_empty());
    }

    #[test]
    fn test_dead_letter_queue() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let order = create_test_order("o-1", "p-1", "h-1", 10);
        let event = create_test_event(&order);

        let txn = storage.begin_write().unwrap();
        storage.enqueue_dispatch(&txn, &event).unwrap();
        txn.commit().unwrap();

        storage.mark_dispatch_failed(&event.event_id, "boom").unwrap();
        storage.move_to_dead_letter(&event.event_id, "boom").unwrap();

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.pending_dispatch_count, 0);
        assert_eq!(stats.dead_letter_count, 1);

        let dead = storage.get_dead_letters().unwrap();
        assert_eq!(dead[0].order_id, "o-1");
        assert_eq!(dead[0].retry_count, 1);
        assert_eq!(dead[0].last_error, "boom");
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.redb");
        {
            let storage = OrderStorage::open(&path).unwrap();
            store(&storage, &create_test_order("o-1", "p-1", "h-1", 10));
        }
        let reopened = OrderStorage::open(&path).unwrap();
        assert!(reopened.get_order("o-1").unwrap().is_some());
    }
}
