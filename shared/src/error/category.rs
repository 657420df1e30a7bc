//! Code range to domain

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Domain of an error code, taken from its thousands digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    General,
    Identity,
    Permission,
    Tenant,
    Order,
    Handoff,
    Notification,
    /// Storage, config and anything from 7000 up; logged at the response boundary
    System,
}

impl ErrorCategory {
    pub fn from_code(code: u16) -> Self {
        match code / 1000 {
            0 => Self::General,
            1 => Self::Identity,
            2 => Self::Permission,
            3 => Self::Tenant,
            4 => Self::Order,
            5 => Self::Handoff,
            6 => Self::Notification,
            _ => Self::System,
        }
    }
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}
