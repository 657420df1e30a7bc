//! Notification ledger records

use serde::{Deserialize, Serialize};

/// Delivery priority, fixed at creation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    #[default]
    Normal,
    Urgent,
    Emergency,
}

/// What the notification is about
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum NotificationSubject {
    Order(String),
    Message(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRecord {
    pub id: String,
    pub subject: NotificationSubject,
    pub recipient_user_id: String,
    pub recipient_tenant_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub is_read: bool,
    pub priority: NotificationPriority,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<i64>,
}

/// Input for creating a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotification {
    pub subject: NotificationSubject,
    pub recipient_user_id: String,
    pub recipient_tenant_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub priority: NotificationPriority,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnreadCount {
    pub unread: u64,
}

/// Query string of `GET /api/notifications`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationListQuery {
    #[serde(default)]
    pub unread_only: bool,
}
