//! ErrorCode to HTTP status

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    pub fn http_status(&self) -> StatusCode {
        use ErrorCode::*;
        match self {
            Success => StatusCode::OK,
            ValidationFailed => StatusCode::BAD_REQUEST,
            NotAuthenticated | IdentityInvalid => StatusCode::UNAUTHORIZED,
            PermissionDenied | RoleNotAllowed => StatusCode::FORBIDDEN,
            OrderNotFound | TenantNotFound | NotificationNotFound => StatusCode::NOT_FOUND,
            OrderConflict | CounterpartyAlreadyAssigned => StatusCode::CONFLICT,
            // well-formed request the lifecycle rules reject
            IllegalTransition
            | OrderTerminal
            | OrderKindMismatch
            | OrderFieldLocked
            | RoutingNotRequired
            | TenantKindMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            // caller may retry
            TransientIntegrationFailure | SystemBusy => StatusCode::SERVICE_UNAVAILABLE,
            InternalError | DatabaseError | ConfigError | StorageFull | StorageCorrupted => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
