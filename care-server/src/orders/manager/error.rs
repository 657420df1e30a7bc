use super::super::storage::StorageError;
use shared::error::{AppError, ErrorCode};
use shared::order::{OrderKind, OrderStatus};
use thiserror::Error;

/// Manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Absent, or not visible to the caller's tenant
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Lost a concurrent write or presented a stale version
    #[error("{0}")]
    Conflict(String),

    #[error("Transition {from} -> {to} is not allowed")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order {order_id} is {actual}, expected {expected}")]
    WrongStatus {
        order_id: String,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("Order is in terminal status {0}")]
    OrderTerminal(OrderStatus),

    #[error("Expected a {expected} payload, got {actual}")]
    KindMismatch {
        expected: OrderKind,
        actual: OrderKind,
    },

    #[error("Field {0} can no longer be changed")]
    FieldLocked(&'static str),

    #[error("Role {role} cannot create {kind} orders")]
    RoleNotAllowed { role: shared::Role, kind: OrderKind },

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Order {0} does not need routing")]
    RoutingNotRequired(String),

    #[error("Order {order_id} is already assigned to tenant {tenant_id}")]
    CounterpartyAlreadyAssigned { order_id: String, tenant_id: String },
}

/// Map a storage failure to a client-facing code
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    if let StorageError::Serialization(_) = e {
        return ErrorCode::InternalError;
    }

    // redb reports these only through its messages
    let err_str = e.to_string().to_lowercase();
    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::StorageFull;
    }
    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }
    ErrorCode::SystemBusy
}

impl From<ManagerError> for AppError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::Storage(e) => {
                let code = classify_storage_error(&e);
                tracing::error!(error = %e, error_code = ?code, "Storage error occurred");
                AppError::with_message(code, e.to_string())
            }
            ManagerError::OrderNotFound(id) => AppError::order_not_found(id),
            ManagerError::Conflict(msg) => AppError::conflict(msg),
            ManagerError::IllegalTransition { from, to } => {
                AppError::illegal_transition(from.as_str(), to.as_str())
            }
            ManagerError::WrongStatus {
                order_id,
                expected,
                actual,
            } => AppError::with_message(
                ErrorCode::IllegalTransition,
                format!("Order {} is {}, expected {}", order_id, actual, expected),
            )
            .with_detail("expected", expected.as_str())
            .with_detail("actual", actual.as_str()),
            e @ ManagerError::OrderTerminal(_) => {
                AppError::with_message(ErrorCode::OrderTerminal, e.to_string())
            }
            e @ ManagerError::KindMismatch { .. } => {
                AppError::with_message(ErrorCode::OrderKindMismatch, e.to_string())
            }
            ManagerError::FieldLocked(field) => AppError::with_message(
                ErrorCode::OrderFieldLocked,
                format!("Field {} can no longer be changed", field),
            )
            .with_detail("field", field),
            e @ ManagerError::RoleNotAllowed { .. } => {
                AppError::with_message(ErrorCode::RoleNotAllowed, e.to_string())
            }
            ManagerError::PermissionDenied(msg) => AppError::permission_denied(msg),
            ManagerError::Validation(msg) => AppError::validation(msg),
            e @ ManagerError::RoutingNotRequired(_) => {
                AppError::with_message(ErrorCode::RoutingNotRequired, e.to_string())
            }
            e @ ManagerError::CounterpartyAlreadyAssigned { .. } => {
                AppError::with_message(ErrorCode::CounterpartyAlreadyAssigned, e.to_string())
            }
        }
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;
