//! Numeric error codes
//!
//! The thousands digit names the domain (see [`ErrorCategory`]):
//! 0 general, 1 identity, 2 permission, 3 tenant directory, 4 order
//! lifecycle, 5 handoff, 6 notifications, 9 system. Codes travel as plain
//! numbers in the `code` field of the response envelope, so a value once
//! published keeps its meaning.
//!
//! [`ErrorCategory`]: super::ErrorCategory

use serde::{Deserialize, Serialize};
use std::fmt;

/// One table drives the enum, its default messages and `TryFrom<u16>`
macro_rules! error_codes {
    ($($(#[$doc:meta])* $name:ident = $code:literal => $message:literal,)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "u16", try_from = "u16")]
        #[repr(u16)]
        pub enum ErrorCode {
            $($(#[$doc])* $name = $code,)+
        }

        impl ErrorCode {
            /// Default message, used when the caller supplies none
            pub const fn message(&self) -> &'static str {
                match self {
                    $(ErrorCode::$name => $message,)+
                }
            }
        }

        impl TryFrom<u16> for ErrorCode {
            type Error = InvalidErrorCode;

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                match value {
                    $($code => Ok(ErrorCode::$name),)+
                    _ => Err(InvalidErrorCode(value)),
                }
            }
        }
    };
}

error_codes! {
    Success = 0 => "OK",
    ValidationFailed = 2 => "Validation failed",

    /// Gateway identity headers absent
    NotAuthenticated = 1001 => "Identity context is missing",
    IdentityInvalid = 1002 => "Identity context is invalid",

    PermissionDenied = 2001 => "Permission denied",
    /// Edge exists but not for the caller's role or party
    RoleNotAllowed = 2002 => "Role is not allowed to perform this action",

    TenantNotFound = 3002 => "Tenant not found",
    TenantKindMismatch = 3003 => "Tenant kind does not match",

    /// Also returned for orders the caller has no relationship to
    OrderNotFound = 4001 => "Order not found",
    IllegalTransition = 4002 => "Transition is not allowed",
    /// Stale `expected_version` or a concurrent write in flight
    OrderConflict = 4003 => "Order was modified concurrently",
    OrderTerminal = 4004 => "Order is in a terminal status",
    OrderKindMismatch = 4005 => "Payload kind does not match order kind",
    OrderFieldLocked = 4006 => "Field is locked after handoff",

    TransientIntegrationFailure = 5002 => "Downstream integration failed",
    CounterpartyAlreadyAssigned = 5003 => "Counterparty already assigned",
    RoutingNotRequired = 5004 => "Order is not waiting for manual routing",

    NotificationNotFound = 6001 => "Notification not found",

    InternalError = 9001 => "Internal server error",
    DatabaseError = 9002 => "Database error",
    ConfigError = 9005 => "Configuration error",
    StorageFull = 9401 => "Storage full",
    StorageCorrupted = 9403 => "Storage corrupted",
    /// Storage IO failure worth retrying
    SystemBusy = 9404 => "System busy, retry later",
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A number with no matching [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown error code {0}")]
pub struct InvalidErrorCode(pub u16);
