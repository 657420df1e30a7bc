use crate::orders::ManagerError;
use shared::error::ErrorCode;
use shared::tenant::TenantKind;
use shared::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error("Tenant {0} is not registered")]
    TenantNotFound(String),

    #[error("Tenant {tenant_id} is a {actual}, expected a {expected}")]
    TenantKindMismatch {
        tenant_id: String,
        expected: TenantKind,
        actual: TenantKind,
    },

    /// Downstream system unavailable; safe to retry
    #[error("Integration failure: {0}")]
    Transient(String),

    #[error("Failed to read tenant directory: {0}")]
    DirectoryIo(#[from] std::io::Error),

    #[error("Invalid tenant directory: {0}")]
    DirectoryFormat(#[from] serde_json::Error),
}

impl HandoffError {
    pub fn is_transient(&self) -> bool {
        match self {
            HandoffError::Transient(_) => true,
            HandoffError::Manager(ManagerError::Conflict(_) | ManagerError::Storage(_)) => true,
            _ => false,
        }
    }
}

impl From<HandoffError> for AppError {
    fn from(err: HandoffError) -> Self {
        match err {
            HandoffError::Manager(e) => e.into(),
            HandoffError::TenantNotFound(id) => {
                AppError::with_message(ErrorCode::TenantNotFound, format!("Tenant {} not found", id))
                    .with_detail("tenant_id", id)
            }
            HandoffError::TenantKindMismatch {
                tenant_id,
                expected,
                actual,
            } => AppError::with_message(
                ErrorCode::TenantKindMismatch,
                format!("Tenant {} is a {}, expected a {}", tenant_id, actual, expected),
            )
            .with_detail("tenant_id", tenant_id)
            .with_detail("expected", expected.as_str()),
            HandoffError::Transient(msg) => AppError::transient(msg),
            e @ (HandoffError::DirectoryIo(_) | HandoffError::DirectoryFormat(_)) => {
                AppError::with_message(ErrorCode::ConfigError, e.to_string())
            }
        }
    }
}

pub type HandoffResult<T> = Result<T, HandoffError>;
