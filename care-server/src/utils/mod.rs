//! Utilities
//!
//! - [`logger`] - tracing subscriber setup and log retention
//! - Error types re-exported from `shared`

pub mod logger;

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
