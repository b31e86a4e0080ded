//! Effective-policy resolution.
//!
//! Everything here is pure: grants and the evaluation instant go in, a policy
//! or a decision comes out. The "is this grant still valid" rule lives in
//! [`RoleGrant::is_effective_at`] and is applied only here.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::capability::PermissionSet;
use super::requirement::{Decision, DenyReason, Requirement};
use crate::domains::roles::RoleGrant;

/// Level at or above which a subject is treated as a full admin.
pub const DEFAULT_FULL_ADMIN_LEVEL: i32 = 10;

/// Resolved authorization for one subject at one instant. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePolicy {
    pub level: i32,
    pub permissions: PermissionSet,
    pub grant_count: usize,
    pub is_full_admin: bool,
}

impl EffectivePolicy {
    pub fn empty() -> Self {
        Self {
            level: 0,
            permissions: PermissionSet::new(),
            grant_count: 0,
            is_full_admin: false,
        }
    }

    pub fn has_grants(&self) -> bool {
        self.grant_count > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyResolver {
    full_admin_level: i32,
}

impl Default for PolicyResolver {
    fn default() -> Self {
        Self::new(DEFAULT_FULL_ADMIN_LEVEL)
    }
}

impl PolicyResolver {
    pub fn new(full_admin_level: i32) -> Self {
        Self { full_admin_level }
    }

    pub fn full_admin_level(&self) -> i32 {
        self.full_admin_level
    }

    /// Fold every grant effective at `at` into a single policy.
    pub fn resolve(&self, grants: &[RoleGrant], at: DateTime<Utc>) -> EffectivePolicy {
        let policy = grants
            .iter()
            .filter(|grant| grant.is_effective_at(at))
            .fold(EffectivePolicy::empty(), |mut policy, grant| {
                policy.level = policy.level.max(grant.level);
                policy.permissions.extend(grant.permissions.iter().copied());
                policy.grant_count += 1;
                policy
            });

        EffectivePolicy {
            is_full_admin: policy.has_grants() && policy.level >= self.full_admin_level,
            ..policy
        }
    }

    /// Evaluate a requirement against an already-resolved policy.
    pub fn authorize(&self, policy: &EffectivePolicy, requirement: &Requirement) -> Decision {
        if !policy.has_grants() {
            return Decision::Deny(DenyReason::NoGrants);
        }

        if policy.is_full_admin {
            return Decision::Permit;
        }

        let level_ok = requirement
            .min_level()
            .is_some_and(|min| policy.level >= min);
        let permission_ok = requirement
            .required_permission()
            .is_some_and(|cap| policy.permissions.contains(&cap));

        if level_ok || permission_ok {
            Decision::Permit
        } else if requirement.min_level().is_some() {
            Decision::Deny(DenyReason::InsufficientLevel)
        } else {
            Decision::Deny(DenyReason::MissingPermission)
        }
    }
}
