//! Identifiers for the records the authorization core owns, plus the opaque
//! subject reference handed to us by the identity provider.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use super::id::Id;

/// Marker type for RoleGrant rows.
pub struct Grant;

/// Marker type for AuditRecord rows.
pub struct AuditEntry;

/// Typed ID for RoleGrant rows.
pub type GrantId = Id<Grant>;

/// Typed ID for AuditRecord rows.
pub type AuditRecordId = Id<AuditEntry>;

/// Stable subject identifier issued by the identity provider.
///
/// The core never interprets the value; it only compares and stores it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Actor recorded for grants seeded without a human grantor.
    pub const SYSTEM: &'static str = "system";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for SubjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
