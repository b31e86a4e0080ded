// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Authorization rules live in common::auth; these traits only move rows.
//
// Naming convention: Base* for trait names (e.g., BaseRoleStore, BaseAuditLog)

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::pagination::{Page, ValidatedPage};
use crate::common::{AuditRecordId, GrantId, SubjectId};
use crate::domains::audit::{AuditError, AuditFilter, AuditRecord, NewAuditEntry};
use crate::domains::roles::{NewRoleGrant, RevokeOutcome, RoleError, RoleGrant};

// =============================================================================
// Role Store Trait (Infrastructure - durable role grants)
// =============================================================================

#[async_trait]
pub trait BaseRoleStore: Send + Sync {
    /// Create a new active grant and its `grant_role` audit record.
    ///
    /// Validates level and expiry window. Grantor ordering is the gateway's job.
    async fn grant(&self, grant: NewRoleGrant, origin: Option<String>)
        -> Result<RoleGrant, RoleError>;

    /// Deactivate a grant. Revoking an inactive grant is a no-op that still
    /// writes one `revoke_role` audit record.
    async fn revoke(
        &self,
        grant_id: GrantId,
        revoked_by: &SubjectId,
        origin: Option<String>,
    ) -> Result<RevokeOutcome, RoleError>;

    /// All grants effective for the subject at `at`.
    async fn list_effective(
        &self,
        subject_id: &SubjectId,
        at: DateTime<Utc>,
    ) -> Result<Vec<RoleGrant>, RoleError>;

    async fn find_by_id(&self, grant_id: GrantId) -> Result<Option<RoleGrant>, RoleError>;

    /// Full grant history for a subject, newest first.
    async fn list_for_subject(&self, subject_id: &SubjectId) -> Result<Vec<RoleGrant>, RoleError>;
}

// =============================================================================
// Audit Log Trait (Infrastructure - append-only)
// =============================================================================

/// Append-only audit persistence: no update or delete methods exist.
#[async_trait]
pub trait BaseAuditLog: Send + Sync {
    /// Validate and persist an entry; the store assigns `created_at`.
    async fn record(&self, entry: NewAuditEntry) -> Result<AuditRecord, AuditError>;

    /// Look up a record by the id its entry was created with.
    async fn find(&self, id: AuditRecordId) -> Result<Option<AuditRecord>, AuditError>;

    /// Matching records, newest first.
    async fn query(
        &self,
        filter: &AuditFilter,
        page: &ValidatedPage,
    ) -> Result<Page<AuditRecord>, AuditError>;
}

// =============================================================================
// Clock Trait (Infrastructure - evaluation time)
// =============================================================================

pub trait BaseClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl BaseClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
