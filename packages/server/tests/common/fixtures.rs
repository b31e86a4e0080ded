//! Grant fixtures shared by the in-memory and Postgres tests.

use chrono::{DateTime, Utc};
use server_core::common::auth::{Capability, PermissionSet};
use server_core::common::{GrantId, SubjectId};
use server_core::domains::roles::{NewRoleGrant, RoleGrant};
use uuid::Uuid;

/// A subject id no other test uses.
pub fn unique_subject(prefix: &str) -> SubjectId {
    SubjectId::new(format!("{}-{}", prefix, Uuid::now_v7()))
}

pub fn permissions(caps: &[Capability]) -> PermissionSet {
    caps.iter().copied().collect()
}

/// System-seeded grant input with no permissions and no expiry.
pub fn level_grant(subject: &SubjectId, level: i32) -> NewRoleGrant {
    NewRoleGrant::builder()
        .subject_id(subject.clone())
        .level(level)
        .build()
}

pub fn capability_grant(subject: &SubjectId, level: i32, caps: &[Capability]) -> NewRoleGrant {
    NewRoleGrant::builder()
        .subject_id(subject.clone())
        .level(level)
        .permissions(permissions(caps))
        .build()
}

/// A grant that started at `granted_at` and lapsed at `expires_at`.
pub fn expired_grant(
    subject: &SubjectId,
    level: i32,
    granted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> RoleGrant {
    NewRoleGrant::builder()
        .subject_id(subject.clone())
        .level(level)
        .expires_at(expires_at)
        .build()
        .into_grant(GrantId::new(), granted_at)
}
