//! Shared types for the care workspace
//!
//! Wire types used by both care-server and care-client: the order model and
//! its transition table, notifications, tenant directory records and the
//! unified error/response envelope.

pub mod error;
pub mod notification;
pub mod order;
pub mod tenant;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use order::{Actor, Order, OrderKind, OrderStatus, Role};
