//! Notification ledger
//!
//! - [`storage`] - redb tables for notification records
//! - [`ledger`] - create / mark-read / list operations
//! - [`producers`] - notifications derived from order events

pub mod ledger;
pub mod producers;
pub mod storage;

pub use ledger::NotificationLedger;
pub use storage::{NotificationError, NotificationResult, NotificationStorage};
