use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::common::SubjectId;
use crate::domains::audit::models::AuditRecord;

/// Half-open time window: `from` inclusive, `to` exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at < to)
    }
}

/// Audit review filter. Every field is optional; unset fields match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub actor_id: Option<SubjectId>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub time_range: Option<TimeRange>,
}

impl AuditFilter {
    pub fn for_actor(actor_id: impl Into<SubjectId>) -> Self {
        Self {
            actor_id: Some(actor_id.into()),
            ..Self::default()
        }
    }

    pub fn for_resource(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            resource_id: Some(resource_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.actor_id.as_ref().map_or(true, |a| a == &record.actor_id)
            && self
                .resource_type
                .as_ref()
                .map_or(true, |t| t == &record.resource_type)
            && self
                .resource_id
                .as_ref()
                .map_or(true, |id| record.resource_id.as_ref() == Some(id))
            && self
                .time_range
                .map_or(true, |range| range.contains(record.created_at))
    }
}
