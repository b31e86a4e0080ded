//! PostgreSQL-backed audit logger.

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, error};

use crate::common::pagination::{Page, ValidatedPage};
use crate::common::AuditRecordId;
use crate::domains::audit::errors::AuditError;
use crate::domains::audit::filter::AuditFilter;
use crate::domains::audit::models::{AuditRecord, NewAuditEntry};
use crate::kernel::BaseAuditLog;

/// Append-only audit log over the `audit_records` table.
#[derive(Clone)]
pub struct PostgresAuditLog {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl BaseAuditLog for PostgresAuditLog {
    async fn record(&self, entry: NewAuditEntry) -> Result<AuditRecord, AuditError> {
        entry.validate()?;

        let record = tokio::time::timeout(self.timeout, AuditRecord::insert(&entry, &self.pool))
            .await
            .map_err(|_| AuditError::Timeout(self.timeout))?
            .map_err(|e| {
                error!(error = %e, action = %entry.action, "Failed to persist audit record");
                AuditError::from(e)
            })?;

        debug!(
            record_id = %record.id,
            actor = %record.actor_id,
            action = %record.action,
            resource_type = %record.resource_type,
            "Audit record stored"
        );
        Ok(record)
    }

    async fn find(&self, id: AuditRecordId) -> Result<Option<AuditRecord>, AuditError> {
        let record = tokio::time::timeout(self.timeout, AuditRecord::find_by_id(id, &self.pool))
            .await
            .map_err(|_| AuditError::Timeout(self.timeout))??;
        Ok(record)
    }

    async fn query(
        &self,
        filter: &AuditFilter,
        page: &ValidatedPage,
    ) -> Result<Page<AuditRecord>, AuditError> {
        let range = filter.time_range.unwrap_or_default();

        let query = sqlx::query_as::<_, AuditRecord>(
            r#"
            SELECT *
            FROM audit_records
            WHERE ($1::text IS NULL OR actor_id = $1)
              AND ($2::text IS NULL OR resource_type = $2)
              AND ($3::text IS NULL OR resource_id = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at < $5)
              AND ($6::uuid IS NULL OR (created_at, id) < (
                    SELECT created_at, id FROM audit_records WHERE id = $6
                  ))
            ORDER BY created_at DESC, id DESC
            LIMIT $7
            "#,
        )
        .bind(filter.actor_id.as_ref())
        .bind(filter.resource_type.as_deref())
        .bind(filter.resource_id.as_deref())
        .bind(range.from)
        .bind(range.to)
        .bind(page.before)
        .bind(page.fetch_limit())
        .fetch_all(&self.pool);

        let rows = tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| AuditError::Timeout(self.timeout))??;

        Ok(Page::from_rows(rows, page, |r| r.id.into_uuid()))
    }
}
