use thiserror::Error;
use uuid::Uuid;

use super::models::MessageStatus;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Cannot {operation} message {id} in status {status}")]
    InvalidState {
        id: Uuid,
        status: MessageStatus,
        operation: &'static str,
    },
    #[error("Message not found: {0}")]
    NotFound(Uuid),
    #[error("Operation not allowed: {0}")]
    Forbidden(String),
    #[error("All delivery providers unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Retry limit reached after {attempts} attempts: {reason}")]
    RetryExhausted { attempts: u32, reason: String },
    #[error("Store unavailable: {0}")]
    Persistence(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DomainError {
    pub fn invalid_state(id: Uuid, status: MessageStatus, operation: &'static str) -> Self {
        Self::InvalidState {
            id,
            status,
            operation,
        }
    }

    /// Store outages leave the record untouched and are safe to retry next cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(value: sqlx::Error) -> Self {
        Self::Persistence(value.to_string())
    }
}
