use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Named capabilities an admin grant can carry.
///
/// Stored as plain strings (`content:write`) so older rows and newer
/// capabilities can coexist; anything we do not recognise is dropped at the
/// boundary by [`permissions_from_strings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Create and edit content entries (notices, fees, hostels, ...)
    ContentWrite,

    /// Publish or unpublish content
    ContentPublish,

    /// Delete content entries
    ContentDelete,

    /// Manage site user accounts
    UsersManage,

    /// Open the role-management screen
    RolesGrant,

    /// Grant or revoke roles at the grantor's own level
    RolesGrantEqual,

    /// Read the audit trail
    AuditRead,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::ContentWrite,
        Capability::ContentPublish,
        Capability::ContentDelete,
        Capability::UsersManage,
        Capability::RolesGrant,
        Capability::RolesGrantEqual,
        Capability::AuditRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ContentWrite => "content:write",
            Capability::ContentPublish => "content:publish",
            Capability::ContentDelete => "content:delete",
            Capability::UsersManage => "users:manage",
            Capability::RolesGrant => "roles:grant",
            Capability::RolesGrantEqual => "roles:grant_equal",
            Capability::AuditRead => "audit:read",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|c| c.as_str() == raw)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown capability: {0}")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Capability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Permission set carried by a grant or an effective policy.
pub type PermissionSet = BTreeSet<Capability>;

/// Convert loosely-typed stored strings into a typed permission set.
///
/// Unknown entries are logged and skipped.
pub fn permissions_from_strings<I, S>(raw: I) -> PermissionSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|entry| {
            let entry = entry.as_ref();
            let parsed = Capability::parse(entry);
            if parsed.is_none() {
                warn!(capability = %entry, "Ignoring unknown capability");
            }
            parsed
        })
        .collect()
}

pub fn permissions_to_strings(permissions: &PermissionSet) -> Vec<String> {
    permissions.iter().map(|c| c.as_str().to_string()).collect()
}
