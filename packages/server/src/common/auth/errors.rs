use thiserror::Error;

use super::requirement::DenyReason;
use crate::domains::audit::AuditError;
use crate::domains::roles::RoleError;

/// Authorization errors for the admin core
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Permission denied: {0}")]
    Denied(DenyReason),

    #[error(transparent)]
    Role(#[from] RoleError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl AuthError {
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            AuthError::Denied(reason) => Some(*reason),
            AuthError::Role(e) => e.decision().and_then(|d| d.deny_reason()),
            _ => None,
        }
    }
}
