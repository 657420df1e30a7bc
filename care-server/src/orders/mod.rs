//! Order lifecycle
//!
//! - [`storage`] - redb tables for orders, queues and dispatch jobs
//! - [`manager`] - validated mutations, the in-flight guard and event broadcast

pub mod manager;
pub mod storage;

pub use manager::{AssignOutcome, ManagerError, ManagerResult, OrdersManager, requires_dispatch};
pub use storage::{DeadLetterEntry, DispatchJob, OrderStorage, StorageError, StorageStats};
