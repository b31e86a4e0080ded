use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Json;
use typed_builder::TypedBuilder;

use crate::common::auth::{permissions_from_strings, permissions_to_strings, PermissionSet};
use crate::common::{GrantId, SubjectId};
use crate::domains::audit::{NewAuditEntry, ResourceRef};
use crate::domains::roles::errors::RoleError;

/// Audit action written for every new grant.
pub const GRANT_ROLE_ACTION: &str = "grant_role";

/// Audit action written for every revoke call, including no-op repeats.
pub const REVOKE_ROLE_ACTION: &str = "revoke_role";

/// Resource type role audit records point at (the affected subject).
pub const SUBJECT_RESOURCE: &str = "subject";

/// One admin-capability assignment. Rows are never deleted; revocation flips
/// `is_active` and stamps `revoked_at` / `revoked_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleGrant {
    pub id: GrantId,
    pub subject_id: SubjectId,
    pub level: i32,
    pub permissions: PermissionSet,
    pub granted_by: Option<SubjectId>,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<SubjectId>,
}

impl RoleGrant {
    /// Active, already started, and not yet expired at `at`.
    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active
            && self.granted_at <= at
            && self.expires_at.map_or(true, |expires_at| at < expires_at)
    }

    /// Audit entry describing the creation of this grant.
    pub fn grant_audit_entry(&self, origin: Option<String>) -> NewAuditEntry {
        let actor = self.granted_by.clone().unwrap_or_else(SubjectId::system);
        NewAuditEntry::builder()
            .actor_id(actor)
            .action(GRANT_ROLE_ACTION)
            .resource(ResourceRef::new(SUBJECT_RESOURCE, self.subject_id.as_str()))
            .details(json!({
                "grant_id": self.id,
                "level": self.level,
                "permissions": permissions_to_strings(&self.permissions),
                "expires_at": self.expires_at,
            }))
            .origin(origin)
            .build()
    }

    /// Audit entry describing a revoke call against this grant.
    pub fn revoke_audit_entry(
        &self,
        revoked_by: &SubjectId,
        outcome: RevokeOutcome,
        origin: Option<String>,
    ) -> NewAuditEntry {
        NewAuditEntry::builder()
            .actor_id(revoked_by.clone())
            .action(REVOKE_ROLE_ACTION)
            .resource(ResourceRef::new(SUBJECT_RESOURCE, self.subject_id.as_str()))
            .details(json!({
                "grant_id": self.id,
                "level": self.level,
                "outcome": outcome,
            }))
            .origin(origin)
            .build()
    }
}

/// Storage row. Permissions are stored as a loosely-typed JSON array.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RoleGrantRow {
    pub id: GrantId,
    pub subject_id: SubjectId,
    pub level: i32,
    pub permissions: Json<Vec<String>>,
    pub granted_by: Option<SubjectId>,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<SubjectId>,
}

impl From<RoleGrantRow> for RoleGrant {
    fn from(row: RoleGrantRow) -> Self {
        Self {
            id: row.id,
            subject_id: row.subject_id,
            level: row.level,
            permissions: permissions_from_strings(row.permissions.0),
            granted_by: row.granted_by,
            granted_at: row.granted_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
            revoked_at: row.revoked_at,
            revoked_by: row.revoked_by,
        }
    }
}

/// Input for creating a grant. `granted_by = None` marks a system-seeded grant.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct NewRoleGrant {
    #[builder(setter(into))]
    pub subject_id: SubjectId,
    pub level: i32,
    #[builder(default)]
    pub permissions: PermissionSet,
    #[builder(default, setter(strip_option, into))]
    pub granted_by: Option<SubjectId>,
    #[builder(default, setter(strip_option))]
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewRoleGrant {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), RoleError> {
        if self.subject_id.is_empty() {
            return Err(RoleError::InvalidSubject);
        }
        if self.level < 0 {
            return Err(RoleError::InvalidLevel(self.level));
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                return Err(RoleError::InvalidWindow(expires_at));
            }
        }
        Ok(())
    }

    /// Materialize into an active grant starting at `granted_at`.
    pub fn into_grant(self, id: GrantId, granted_at: DateTime<Utc>) -> RoleGrant {
        RoleGrant {
            id,
            subject_id: self.subject_id,
            level: self.level,
            permissions: self.permissions,
            granted_by: self.granted_by,
            granted_at,
            expires_at: self.expires_at,
            is_active: true,
            revoked_at: None,
            revoked_by: None,
        }
    }
}

/// Grant request as submitted by the role-management screen.
///
/// Permissions arrive as strings; unknown names are dropped with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleGrantRequest {
    pub subject_id: SubjectId,
    pub level: i32,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl RoleGrantRequest {
    pub fn new(subject_id: impl Into<SubjectId>, level: i32) -> Self {
        Self {
            subject_id: subject_id.into(),
            level,
            permissions: Vec::new(),
            expires_at: None,
        }
    }

    pub fn with_permissions(mut self, permissions: &PermissionSet) -> Self {
        self.permissions = permissions_to_strings(permissions);
        self
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn into_new_grant(self, granted_by: SubjectId) -> NewRoleGrant {
        NewRoleGrant {
            subject_id: self.subject_id,
            level: self.level,
            permissions: permissions_from_strings(&self.permissions),
            granted_by: Some(granted_by),
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevokeOutcome {
    Revoked,
    /// The grant was already inactive; nothing changed.
    AlreadyRevoked,
}
