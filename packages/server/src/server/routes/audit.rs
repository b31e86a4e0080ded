use axum::extract::{Extension, Query};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::common::pagination::{Page, PageRequest};
use crate::common::SubjectId;
use crate::domains::audit::{AuditFilter, AuditRecord, TimeRange};
use crate::server::app::AppState;
use crate::server::errors::ApiError;
use crate::server::middleware::{AuthUser, Origin};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub actor_id: Option<SubjectId>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub before: Option<String>,
}

impl AuditQuery {
    fn filter(&self) -> AuditFilter {
        let time_range = (self.from.is_some() || self.to.is_some()).then_some(TimeRange {
            from: self.from,
            to: self.to,
        });
        AuditFilter {
            actor_id: self.actor_id.clone(),
            resource_type: self.resource_type.clone(),
            resource_id: self.resource_id.clone(),
            time_range,
        }
    }
}

/// GET /audit
pub async fn audit_query_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Origin(origin): Origin,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Page<AuditRecord>>, ApiError> {
    let page = PageRequest {
        limit: query.limit,
        before: query.before.clone(),
    }
    .validate()
    .map_err(|e| ApiError::validation(e.to_string()))?;

    let records = state
        .server_deps
        .gateway
        .query_audit(&user.subject_id, &query.filter(), &page, origin)
        .await?;

    Ok(Json(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_only_when_bounds_given() {
        assert!(AuditQuery::default().filter().time_range.is_none());

        let from = Utc::now();
        let query = AuditQuery {
            from: Some(from),
            ..AuditQuery::default()
        };
        assert_eq!(
            query.filter().time_range,
            Some(TimeRange { from: Some(from), to: None })
        );
    }
}
