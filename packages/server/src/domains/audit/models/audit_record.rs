use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgExecutor;
use typed_builder::TypedBuilder;

use crate::common::{AuditRecordId, SubjectId};
use crate::domains::audit::errors::AuditError;

/// The resource an audited action touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub id: Option<String>,
}

impl ResourceRef {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: Some(id.into()),
        }
    }

    /// A resource type with no single row behind it (e.g. "audit_log").
    pub fn collection(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: None,
        }
    }
}

/// A persisted audit fact. Rows are append-only: nothing in this crate
/// updates or deletes them, and the table trigger rejects both.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: AuditRecordId,
    pub actor_id: SubjectId,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Value,
    pub origin: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied part of an audit record. Carries no timestamp:
/// `created_at` is assigned by the store.
///
/// The id is assigned up front so a write whose acknowledgement was lost can
/// be looked up afterwards.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct NewAuditEntry {
    #[builder(default = AuditRecordId::new())]
    pub id: AuditRecordId,
    #[builder(setter(into))]
    pub actor_id: SubjectId,
    #[builder(setter(into))]
    pub action: String,
    pub resource: ResourceRef,
    #[builder(default = Value::Object(Default::default()))]
    pub details: Value,
    #[builder(default)]
    pub origin: Option<String>,
}

impl NewAuditEntry {
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.actor_id.is_empty() {
            return Err(AuditError::InvalidEntry("actor_id must not be empty"));
        }
        if self.action.trim().is_empty() {
            return Err(AuditError::InvalidEntry("action must not be empty"));
        }
        if self.resource.resource_type.trim().is_empty() {
            return Err(AuditError::InvalidEntry("resource_type must not be empty"));
        }
        Ok(())
    }

    /// Materialize into a record with a store-assigned timestamp.
    pub fn into_record(self, created_at: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            id: self.id,
            actor_id: self.actor_id,
            action: self.action,
            resource_type: self.resource.resource_type,
            resource_id: self.resource.id,
            details: self.details,
            origin: self.origin,
            created_at,
        }
    }
}

// =============================================================================
// Audit Queries
// =============================================================================

impl AuditRecord {
    /// Append one record. `created_at` comes from the database clock.
    ///
    /// Takes any executor so role changes can write their audit row inside the
    /// same transaction as the grant itself.
    pub async fn insert<'e, E>(entry: &NewAuditEntry, executor: E) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO audit_records (id, actor_id, action, resource_type, resource_id, details, origin)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(entry.id)
        .bind(&entry.actor_id)
        .bind(&entry.action)
        .bind(&entry.resource.resource_type)
        .bind(&entry.resource.id)
        .bind(&entry.details)
        .bind(&entry.origin)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(id: AuditRecordId, executor: E) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM audit_records WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }
}
