//! PostgreSQL-backed role store.
//!
//! Grant and revoke run in a transaction holding a per-subject advisory lock,
//! so concurrent changes to one subject's grants are applied one at a time
//! (last committed write wins). The role change and its audit record commit
//! together or not at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::common::auth::permissions_to_strings;
use crate::common::{GrantId, SubjectId};
use crate::domains::audit::{AuditError, AuditRecord};
use crate::domains::roles::errors::RoleError;
use crate::domains::roles::models::{NewRoleGrant, RevokeOutcome, RoleGrant, RoleGrantRow};
use crate::kernel::BaseRoleStore;

#[derive(Clone)]
pub struct PostgresRoleStore {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresRoleStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, RoleError>
    where
        F: Future<Output = Result<T, RoleError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RoleError::Timeout(self.timeout))?
    }

    async fn insert_grant(
        &self,
        grant: NewRoleGrant,
        granted_at: DateTime<Utc>,
        origin: Option<String>,
    ) -> Result<RoleGrant, RoleError> {
        let mut tx = self.pool.begin().await?;
        lock_subject(&mut tx, &grant.subject_id).await?;

        let row = sqlx::query_as::<_, RoleGrantRow>(
            r#"
            INSERT INTO role_grants (id, subject_id, level, permissions, granted_by, granted_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(GrantId::new())
        .bind(&grant.subject_id)
        .bind(grant.level)
        .bind(Json(permissions_to_strings(&grant.permissions)))
        .bind(&grant.granted_by)
        .bind(granted_at)
        .bind(grant.expires_at)
        .fetch_one(&mut *tx)
        .await?;
        let created = RoleGrant::from(row);

        let entry = created.grant_audit_entry(origin);
        entry.validate()?;
        AuditRecord::insert(&entry, &mut *tx)
            .await
            .map_err(AuditError::from)?;

        tx.commit().await?;
        Ok(created)
    }

    async fn revoke_grant(
        &self,
        grant_id: GrantId,
        revoked_by: &SubjectId,
        origin: Option<String>,
    ) -> Result<(RoleGrant, RevokeOutcome), RoleError> {
        let mut tx = self.pool.begin().await?;

        let subject: Option<SubjectId> =
            sqlx::query_scalar("SELECT subject_id FROM role_grants WHERE id = $1")
                .bind(grant_id)
                .fetch_optional(&mut *tx)
                .await?;
        let subject = subject.ok_or(RoleError::NotFound(grant_id))?;
        lock_subject(&mut tx, &subject).await?;

        let current: RoleGrant =
            sqlx::query_as::<_, RoleGrantRow>("SELECT * FROM role_grants WHERE id = $1 FOR UPDATE")
                .bind(grant_id)
                .fetch_one(&mut *tx)
                .await?
                .into();

        let (grant, outcome) = if current.is_active {
            let updated = sqlx::query_as::<_, RoleGrantRow>(
                r#"
                UPDATE role_grants
                SET is_active = false, revoked_at = $2, revoked_by = $3
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(grant_id)
            .bind(Utc::now())
            .bind(revoked_by)
            .fetch_one(&mut *tx)
            .await?;
            (RoleGrant::from(updated), RevokeOutcome::Revoked)
        } else {
            (current, RevokeOutcome::AlreadyRevoked)
        };

        let entry = grant.revoke_audit_entry(revoked_by, outcome, origin);
        entry.validate()?;
        AuditRecord::insert(&entry, &mut *tx)
            .await
            .map_err(AuditError::from)?;

        tx.commit().await?;
        Ok((grant, outcome))
    }
}

/// Serialize writers for one subject until the surrounding transaction ends.
async fn lock_subject(conn: &mut PgConnection, subject: &SubjectId) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(subject)
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl BaseRoleStore for PostgresRoleStore {
    async fn grant(
        &self,
        grant: NewRoleGrant,
        origin: Option<String>,
    ) -> Result<RoleGrant, RoleError> {
        let now = Utc::now();
        grant.validate(now)?;

        let created = self.bounded(self.insert_grant(grant, now, origin)).await?;
        info!(
            grant_id = %created.id,
            subject = %created.subject_id,
            level = created.level,
            granted_by = ?created.granted_by,
            "Role granted"
        );
        Ok(created)
    }

    async fn revoke(
        &self,
        grant_id: GrantId,
        revoked_by: &SubjectId,
        origin: Option<String>,
    ) -> Result<RevokeOutcome, RoleError> {
        let (grant, outcome) = self
            .bounded(self.revoke_grant(grant_id, revoked_by, origin))
            .await?;

        match outcome {
            RevokeOutcome::Revoked => info!(
                grant_id = %grant.id,
                subject = %grant.subject_id,
                revoked_by = %revoked_by,
                "Role revoked"
            ),
            RevokeOutcome::AlreadyRevoked => warn!(
                grant_id = %grant.id,
                revoked_by = %revoked_by,
                "Revoke requested for an inactive grant"
            ),
        }
        Ok(outcome)
    }

    async fn list_effective(
        &self,
        subject_id: &SubjectId,
        at: DateTime<Utc>,
    ) -> Result<Vec<RoleGrant>, RoleError> {
        // Index-friendly prefilter; the resolver re-applies the rule.
        let rows = self
            .bounded(async {
                sqlx::query_as::<_, RoleGrantRow>(
                    r#"
                    SELECT *
                    FROM role_grants
                    WHERE subject_id = $1
                      AND is_active
                      AND granted_at <= $2
                      AND (expires_at IS NULL OR $2 < expires_at)
                    ORDER BY granted_at DESC, id DESC
                    "#,
                )
                .bind(subject_id)
                .bind(at)
                .fetch_all(&self.pool)
                .await
                .map_err(RoleError::from)
            })
            .await?;

        Ok(rows.into_iter().map(RoleGrant::from).collect())
    }

    async fn find_by_id(&self, grant_id: GrantId) -> Result<Option<RoleGrant>, RoleError> {
        let row = self
            .bounded(async {
                sqlx::query_as::<_, RoleGrantRow>("SELECT * FROM role_grants WHERE id = $1")
                    .bind(grant_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(RoleError::from)
            })
            .await?;

        Ok(row.map(RoleGrant::from))
    }

    async fn list_for_subject(&self, subject_id: &SubjectId) -> Result<Vec<RoleGrant>, RoleError> {
        let rows = self
            .bounded(async {
                sqlx::query_as::<_, RoleGrantRow>(
                    "SELECT * FROM role_grants WHERE subject_id = $1 ORDER BY granted_at DESC, id DESC",
                )
                .bind(subject_id)
                .fetch_all(&self.pool)
                .await
                .map_err(RoleError::from)
            })
            .await?;

        Ok(rows.into_iter().map(RoleGrant::from).collect())
    }
}
