//! Notification ledger
//!
//! Read state only moves from unread to read, and priority is fixed when a
//! record is created; there is no update operation.

use super::storage::{NotificationError, NotificationResult, NotificationStorage};
use shared::Actor;
use shared::notification::{CreateNotification, NotificationRecord};
use std::path::Path;

#[derive(Clone)]
pub struct NotificationLedger {
    storage: NotificationStorage,
}

impl std::fmt::Debug for NotificationLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationLedger").finish_non_exhaustive()
    }
}

fn validate(request: &CreateNotification) -> NotificationResult<()> {
    let required = [
        ("recipient_user_id", request.recipient_user_id.as_str()),
        ("recipient_tenant_id", request.recipient_tenant_id.as_str()),
        ("title", request.title.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(NotificationError::Validation(format!("{} is required", field)));
        }
    }
    Ok(())
}

impl NotificationLedger {
    pub fn new(storage: NotificationStorage) -> Self {
        Self { storage }
    }

    pub fn open(path: impl AsRef<Path>) -> NotificationResult<Self> {
        Ok(Self::new(NotificationStorage::open(path)?))
    }

    pub fn storage(&self) -> &NotificationStorage {
        &self.storage
    }

    /// Create an unread notification
    pub fn create(&self, request: CreateNotification) -> NotificationResult<NotificationRecord> {
        self.create_once(&shared::util::new_id(), request)
    }

    /// Create a notification under a caller-chosen id
    ///
    /// A second call with the same id returns the first record untouched, so
    /// retried producers never notify twice.
    pub fn create_once(
        &self,
        id: &str,
        request: CreateNotification,
    ) -> NotificationResult<NotificationRecord> {
        validate(&request)?;
        let record = NotificationRecord {
            id: id.to_string(),
            subject: request.subject,
            recipient_user_id: request.recipient_user_id,
            recipient_tenant_id: request.recipient_tenant_id,
            title: request.title,
            body: request.body,
            is_read: false,
            priority: request.priority,
            created_at: shared::util::now_millis(),
            read_at: None,
        };

        let (stored, inserted) = self.storage.insert_if_absent(&record)?;
        if inserted {
            tracing::info!(
                notification_id = %stored.id,
                recipient = %stored.recipient_user_id,
                priority = ?stored.priority,
                "Notification created"
            );
        }
        Ok(stored)
    }

    /// Mark as read; idempotent, recipient only (anyone else gets NotFound)
    pub fn mark_read(&self, id: &str, actor: &Actor) -> NotificationResult<NotificationRecord> {
        self.storage
            .mark_read(id, &actor.tenant_id, &actor.user_id, shared::util::now_millis())?
            .ok_or_else(|| NotificationError::NotFound(id.to_string()))
    }

    /// The actor's notifications, newest first
    pub fn list_for(
        &self,
        actor: &Actor,
        unread_only: bool,
    ) -> NotificationResult<Vec<NotificationRecord>> {
        let mut records = self
            .storage
            .list_for_recipient(&actor.tenant_id, &actor.user_id)?;
        if unread_only {
            records.retain(|r| !r.is_read);
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    pub fn unread_count(&self, actor: &Actor) -> NotificationResult<u64> {
        let records = self
            .storage
            .list_for_recipient(&actor.tenant_id, &actor.user_id)?;
        Ok(records.iter().filter(|r| !r.is_read).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Role;
    use shared::notification::{NotificationPriority, NotificationSubject};

    fn ledger() -> NotificationLedger {
        NotificationLedger::new(NotificationStorage::open_in_memory().unwrap())
    }

    fn physician() -> Actor {
        Actor::new("doc-1", "h-1", Role::Physician)
    }

    fn request(priority: NotificationPriority) -> CreateNotification {
        CreateNotification {
            subject: NotificationSubject::Order("o-1".into()),
            recipient_user_id: "doc-1".into(),
            recipient_tenant_id: "h-1".into(),
            title: "Lab result available".into(),
            body: None,
            priority,
        }
    }

    #[test]
    fn test_create_and_list() {
        let ledger = ledger();
        let record = ledger.create(request(NotificationPriority::Urgent)).unwrap();
        assert!(!record.is_read);
        assert_eq!(record.priority, NotificationPriority::Urgent);

        let listed = ledger.list_for(&physician(), false).unwrap();
        assert_eq!(listed, vec![record]);
        assert_eq!(ledger.unread_count(&physician()).unwrap(), 1);

        // same user id in another tenant is a different recipient
        let elsewhere = Actor::new("doc-1", "h-2", Role::Physician);
        assert!(ledger.list_for(&elsewhere, false).unwrap().is_empty());
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let ledger = ledger();
        let record = ledger.create(request(NotificationPriority::Normal)).unwrap();

        let first = ledger.mark_read(&record.id, &physician()).unwrap();
        assert!(first.is_read);
        let read_at = first.read_at.unwrap();

        let second = ledger.mark_read(&record.id, &physician()).unwrap();
        assert!(second.is_read);
        assert_eq!(second.read_at, Some(read_at));
        assert_eq!(second.priority, record.priority);

        assert_eq!(ledger.unread_count(&physician()).unwrap(), 0);
        assert!(ledger.list_for(&physician(), true).unwrap().is_empty());
    }

    #[test]
    fn test_only_recipient_can_mark_read() {
        let ledger = ledger();
        let record = ledger.create(request(NotificationPriority::Normal)).unwrap();

        let nurse = Actor::new("nurse-1", "h-1", Role::Nurse);
        let err = ledger.mark_read(&record.id, &nurse).unwrap_err();
        assert!(matches!(err, NotificationError::NotFound(_)));

        let err = ledger.mark_read("missing", &physician()).unwrap_err();
        assert!(matches!(err, NotificationError::NotFound(_)));

        assert!(!ledger.storage().get(&record.id).unwrap().unwrap().is_read);
    }

    #[test]
    fn test_create_once_deduplicates() {
        let ledger = ledger();
        let first = ledger
            .create_once("job-1:0", request(NotificationPriority::Emergency))
            .unwrap();
        let second = ledger
            .create_once("job-1:0", request(NotificationPriority::Normal))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second.priority, NotificationPriority::Emergency);
        assert_eq!(ledger.storage().count().unwrap(), 1);
    }

    #[test]
    fn test_create_validates_recipient() {
        let ledger = ledger();
        let mut req = request(NotificationPriority::Normal);
        req.recipient_user_id = " ".into();
        assert!(matches!(
            ledger.create(req),
            Err(NotificationError::Validation(_))
        ));
    }
}
