//! Error codes and the response envelope shared by server and client
//!
//! Codes are grouped in ranges by domain ([`ErrorCategory`]); each maps to
//! one HTTP status. Handlers return [`AppError`], which renders as an
//! [`ApiResponse`] with `code`, `message` and optional `details`.
//!
//! ```
//! use shared::error::{ApiResponse, AppError};
//!
//! let err = AppError::illegal_transition("prescribed", "filled")
//!     .with_detail("role", "nurse");
//! let body = ApiResponse::<()>::error(&err);
//! assert_eq!(body.code, Some(4002));
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
