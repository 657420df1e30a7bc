//! redb-based storage for notification records

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use shared::notification::NotificationRecord;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// key = notification_id, value = JSON
const NOTIFICATIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("notifications");

/// Index: (recipient_tenant_id, recipient_user_id, notification_id) -> ()
const NOTIFICATIONS_BY_RECIPIENT_TABLE: TableDefinition<(&str, &str, &str), ()> =
    TableDefinition::new("notifications_by_recipient");

#[derive(Debug, Error)]
pub enum NotificationError {
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

    #[error("Notification not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<NotificationError> for shared::AppError {
    fn from(err: NotificationError) -> Self {
        use shared::error::ErrorCode;
        match err {
            NotificationError::NotFound(id) => shared::AppError::with_message(
                ErrorCode::NotificationNotFound,
                format!("Notification {} not found", id),
            )
            .with_detail("notification_id", id),
            NotificationError::Validation(msg) => shared::AppError::validation(msg),
            NotificationError::Serialization(e) => shared::AppError::internal(e.to_string()),
            e => {
                tracing::error!(error = %e, "Notification storage error");
                shared::AppError::database(e.to_string())
            }
        }
    }
}

pub type NotificationResult<T> = Result<T, NotificationError>;

/// Notification storage
#[derive(Clone)]
pub struct NotificationStorage {
    db: Arc<Database>,
}

impl NotificationStorage {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> NotificationResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> NotificationResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> NotificationResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(NOTIFICATIONS_TABLE)?;
            let _ = write_txn.open_table(NOTIFICATIONS_BY_RECIPIENT_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Insert unless a record with the same id exists
    ///
    /// Returns the stored record (the existing one on a duplicate id).
    pub fn insert_if_absent(
        &self,
        record: &NotificationRecord,
    ) -> NotificationResult<(NotificationRecord, bool)> {
        let txn = self.db.begin_write()?;
        let existing = {
            let table = txn.open_table(NOTIFICATIONS_TABLE)?;
            let found = table.get(record.id.as_str())?;
            match found {
                Some(value) => Some(serde_json::from_slice::<NotificationRecord>(value.value())?),
                None => None,
            }
        };
        if let Some(existing) = existing {
            return Ok((existing, false));
        }
        {
            let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
            let value = serde_json::to_vec(record)?;
            table.insert(record.id.as_str(), value.as_slice())?;
        }
        {
            let mut index = txn.open_table(NOTIFICATIONS_BY_RECIPIENT_TABLE)?;
            index.insert(
                (
                    record.recipient_tenant_id.as_str(),
                    record.recipient_user_id.as_str(),
                    record.id.as_str(),
                ),
                (),
            )?;
        }
        txn.commit()?;
        Ok((record.clone(), true))
    }

    pub fn get(&self, id: &str) -> NotificationResult<Option<NotificationRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Set `is_read` on a record addressed to (tenant, user)
    ///
    /// `None` when the record is missing or addressed to someone else. An
    /// already-read record is returned unchanged.
    pub fn mark_read(
        &self,
        id: &str,
        tenant_id: &str,
        user_id: &str,
        now: i64,
    ) -> NotificationResult<Option<NotificationRecord>> {
        let txn = self.db.begin_write()?;
        let result = {
            let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
            let record_opt = if let Some(value) = table.get(id)? {
                Some(serde_json::from_slice::<NotificationRecord>(value.value())?)
            } else {
                None
            };

            match record_opt {
                Some(mut record)
                    if record.recipient_tenant_id == tenant_id
                        && record.recipient_user_id == user_id =>
                {
                    if !record.is_read {
                        record.is_read = true;
                        record.read_at = Some(now);
                        let value = serde_json::to_vec(&record)?;
                        table.insert(id, value.as_slice())?;
                    }
                    Some(record)
                }
                _ => None,
            }
        };
        txn.commit()?;
        Ok(result)
    }

    /// Records addressed to (tenant, user)
    pub fn list_for_recipient(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> NotificationResult<Vec<NotificationRecord>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(NOTIFICATIONS_BY_RECIPIENT_TABLE)?;
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;

        let mut records = Vec::new();
        for result in index.range((tenant_id, user_id, "")..)? {
            let (key, _) = result?;
            let (tenant, user, id) = key.value();
            if tenant != tenant_id || user != user_id {
                break;
            }
            if let Some(value) = table.get(id)? {
                records.push(serde_json::from_slice::<NotificationRecord>(value.value())?);
            }
        }
        Ok(records)
    }

    pub fn count(&self) -> NotificationResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;
        Ok(table.len()?)
    }
}
