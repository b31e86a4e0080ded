use serde::{Deserialize, Serialize};
use std::fmt;

use super::capability::Capability;

/// What a privileged action demands of its caller.
///
/// At least one of `min_level` / `permission` is always present; when both
/// are set, satisfying either one is enough. Construct through
/// [`Requirement::level`], [`Requirement::permission`] or
/// [`Requirement::either`]; deserialization rejects the empty form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RequirementWire", into = "RequirementWire")]
pub struct Requirement {
    min_level: Option<i32>,
    permission: Option<Capability>,
}

impl Requirement {
    pub fn level(min_level: i32) -> Self {
        Self {
            min_level: Some(min_level),
            permission: None,
        }
    }

    pub fn permission(permission: Capability) -> Self {
        Self {
            min_level: None,
            permission: Some(permission),
        }
    }

    pub fn either(min_level: i32, permission: Capability) -> Self {
        Self {
            min_level: Some(min_level),
            permission: Some(permission),
        }
    }

    pub fn min_level(&self) -> Option<i32> {
        self.min_level
    }

    pub fn required_permission(&self) -> Option<Capability> {
        self.permission
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min_level, self.permission) {
            (Some(level), Some(cap)) => write!(f, "level>={} or {}", level, cap),
            (Some(level), None) => write!(f, "level>={}", level),
            (None, Some(cap)) => write!(f, "{}", cap),
            (None, None) => f.write_str("<empty>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRequirement {
    #[error("Requirement needs a minLevel, a permission, or both")]
    Empty,

    #[error("Requirement minLevel must be zero or greater, got {0}")]
    NegativeLevel(i32),
}

/// Serialized form: `{minLevel: int|null, permission: string|null}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequirementWire {
    #[serde(default)]
    min_level: Option<i32>,
    #[serde(default)]
    permission: Option<Capability>,
}

impl TryFrom<RequirementWire> for Requirement {
    type Error = InvalidRequirement;

    fn try_from(wire: RequirementWire) -> Result<Self, Self::Error> {
        match (wire.min_level, wire.permission) {
            (None, None) => Err(InvalidRequirement::Empty),
            (Some(level), _) if level < 0 => Err(InvalidRequirement::NegativeLevel(level)),
            (min_level, permission) => Ok(Self {
                min_level,
                permission,
            }),
        }
    }
}

impl From<Requirement> for RequirementWire {
    fn from(req: Requirement) -> Self {
        Self {
            min_level: req.min_level,
            permission: req.permission,
        }
    }
}

/// Why a check came back negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    InsufficientLevel,
    MissingPermission,
    NoGrants,
    /// Policy allowed the action but the audit record could not be stored.
    AuditUnavailable,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::InsufficientLevel => "insufficient_level",
            DenyReason::MissingPermission => "missing_permission",
            DenyReason::NoGrants => "no_grants",
            DenyReason::AuditUnavailable => "audit_unavailable",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an authorization check. A deny is an ordinary value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DecisionWire", into = "DecisionWire")]
pub enum Decision {
    Permit,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_permit(&self) -> bool {
        matches!(self, Decision::Permit)
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Permit => None,
            Decision::Deny(reason) => Some(*reason),
        }
    }
}

/// Serialized form: `{allowed: bool, reason: string|null}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DecisionWire {
    allowed: bool,
    reason: Option<DenyReason>,
}

impl From<Decision> for DecisionWire {
    fn from(decision: Decision) -> Self {
        Self {
            allowed: decision.is_permit(),
            reason: decision.deny_reason(),
        }
    }
}

impl TryFrom<DecisionWire> for Decision {
    type Error = String;

    fn try_from(wire: DecisionWire) -> Result<Self, Self::Error> {
        match (wire.allowed, wire.reason) {
            (true, None) => Ok(Decision::Permit),
            (false, Some(reason)) => Ok(Decision::Deny(reason)),
            (true, Some(reason)) => Err(format!("allowed decision carries reason {}", reason)),
            (false, None) => Err("denied decision is missing a reason".to_string()),
        }
    }
}
