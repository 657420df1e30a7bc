use crate::handoff::HandoffError;
use crate::notifications::NotificationError;
use crate::orders::ManagerError;
use thiserror::Error;

/// Startup and lifecycle errors of the server process
///
/// Request handlers never see this type; they work with [`shared::AppError`].
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Order engine error: {0}")]
    Manager(#[from] ManagerError),

    #[error("Notification ledger error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Handoff setup error: {0}")]
    Handoff(#[from] HandoffError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
