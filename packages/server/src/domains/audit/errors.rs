use std::time::Duration;
use thiserror::Error;

/// Audit logger errors
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Invalid audit entry: {0}")]
    InvalidEntry(&'static str),

    #[error("Invalid pagination: {0}")]
    InvalidPage(String),

    #[error("Audit storage error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Audit storage timed out after {0:?}")]
    Timeout(Duration),
}

impl AuditError {
    /// Storage faults and timeouts, both of which a permit must not survive.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AuditError::Persistence(_) | AuditError::Timeout(_))
    }
}
