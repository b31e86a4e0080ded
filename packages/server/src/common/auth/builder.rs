use super::{AuditContext, AuthError, AuthorizationGateway, Decision, Requirement};
use crate::common::SubjectId;
use crate::domains::audit::ResourceRef;

/// Entry point for authorization checks from content editors
///
/// Usage:
/// ```ignore
/// Actor::new(subject_id)
///     .with_origin(client_ip)
///     .requires(Requirement::permission(Capability::ContentDelete))
///     .check_and_log(deps, "delete", ResourceRef::new("notice", "n1"))
///     .await?;
/// // ... perform the delete
/// ```
pub struct Actor {
    subject_id: SubjectId,
    origin: Option<String>,
}

impl Actor {
    pub fn new(subject_id: impl Into<SubjectId>) -> Self {
        Self {
            subject_id: subject_id.into(),
            origin: None,
        }
    }

    /// Network origin recorded on the audit entry (best effort).
    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.origin = origin;
        self
    }

    /// Specify what the action demands
    pub fn requires(self, requirement: Requirement) -> RequirementBuilder {
        RequirementBuilder {
            actor: self,
            requirement,
        }
    }
}

/// Builder after specifying the requirement
pub struct RequirementBuilder {
    actor: Actor,
    requirement: Requirement,
}

impl RequirementBuilder {
    /// Non-audited check, for presentation hints only.
    pub async fn check<D>(self, deps: &D) -> Result<(), AuthError>
    where
        D: HasAuthContext,
    {
        let decision = deps
            .gateway()
            .check(&self.actor.subject_id, &self.requirement)
            .await?;
        into_result(decision)
    }

    /// Authoritative check; on success the action has been audited.
    pub async fn check_and_log<D>(
        self,
        deps: &D,
        action: &str,
        resource: ResourceRef,
    ) -> Result<(), AuthError>
    where
        D: HasAuthContext,
    {
        let decision = deps
            .gateway()
            .check_and_log(
                &self.actor.subject_id,
                &self.requirement,
                action,
                resource,
                AuditContext::from_origin(self.actor.origin),
            )
            .await?;
        into_result(decision)
    }
}

fn into_result(decision: Decision) -> Result<(), AuthError> {
    match decision {
        Decision::Permit => Ok(()),
        Decision::Deny(reason) => Err(AuthError::Denied(reason)),
    }
}

/// Trait for dependencies that can perform auth checks
pub trait HasAuthContext: Send + Sync {
    fn gateway(&self) -> &AuthorizationGateway;
}

impl HasAuthContext for AuthorizationGateway {
    fn gateway(&self) -> &AuthorizationGateway {
        self
    }
}
