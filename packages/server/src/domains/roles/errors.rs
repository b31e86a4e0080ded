use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::common::auth::{Decision, DenyReason};
use crate::common::{GrantId, SubjectId};
use crate::domains::audit::AuditError;

/// Role store and role-management errors
#[derive(Error, Debug)]
pub enum RoleError {
    #[error("Invalid subject: subject id must not be empty")]
    InvalidSubject,

    #[error("Invalid level {0}: levels must be zero or greater")]
    InvalidLevel(i32),

    #[error("Invalid validity window: expires_at {0} is not in the future")]
    InvalidWindow(DateTime<Utc>),

    #[error("Grantor {grantor} may not manage level {level} grants: {reason}")]
    InvalidGrantor {
        grantor: SubjectId,
        level: i32,
        reason: DenyReason,
    },

    #[error("Role grant not found: {0}")]
    NotFound(GrantId),

    #[error("Role change could not be audited: {0}")]
    Audit(#[from] AuditError),

    #[error("Role storage error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Role storage timed out after {0:?}")]
    Timeout(Duration),
}

impl RoleError {
    /// The authorization decision equivalent of a grantor-ordering failure,
    /// so callers can treat it like any other deny.
    pub fn decision(&self) -> Option<Decision> {
        match self {
            RoleError::InvalidGrantor { reason, .. } => Some(Decision::Deny(*reason)),
            _ => None,
        }
    }

    /// Caller-correctable input problems.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RoleError::InvalidSubject | RoleError::InvalidLevel(_) | RoleError::InvalidWindow(_)
        )
    }

    pub fn is_unavailable(&self) -> bool {
        match self {
            RoleError::Persistence(_) | RoleError::Timeout(_) => true,
            RoleError::Audit(e) => e.is_unavailable(),
            _ => false,
        }
    }
}
