//! Authorization gateway - the single entry point for privileged callers.
//!
//! Per request: `Received → Resolving → {Permit, Deny}`, and for audited
//! checks `Permit → Logging → {Logged, LogFailed → Deny(AuditUnavailable)}`.
//! A caller may only perform its mutation after a `Permit` from
//! [`AuthorizationGateway::check_and_log`].

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::capability::{Capability, PermissionSet};
use super::errors::AuthError;
use super::policy::{EffectivePolicy, PolicyResolver};
use super::requirement::{Decision, DenyReason, Requirement};
use crate::common::pagination::{Page, ValidatedPage};
use crate::common::{AuditRecordId, GrantId, SubjectId};
use crate::domains::audit::{AuditError, AuditFilter, AuditRecord, NewAuditEntry, ResourceRef};
use crate::domains::roles::{
    NewRoleGrant, RevokeOutcome, RoleError, RoleGrant, RoleGrantRequest, SUBJECT_RESOURCE,
};
use crate::kernel::{BaseAuditLog, BaseClock, BaseRoleStore};

/// Audit action recorded when someone opens a subject's role list.
pub const VIEW_ROLES_ACTION: &str = "view_roles";

/// Audit action recorded for every audit-log read.
pub const READ_AUDIT_ACTION: &str = "read_audit";

/// Extra context attached to an audited action.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub details: Option<Value>,
    pub origin: Option<String>,
}

impl AuditContext {
    pub fn from_origin(origin: Option<String>) -> Self {
        Self {
            details: None,
            origin,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

pub struct AuthorizationGateway {
    roles: Arc<dyn BaseRoleStore>,
    audit: Arc<dyn BaseAuditLog>,
    clock: Arc<dyn BaseClock>,
    resolver: PolicyResolver,
    audit_timeout: Duration,
}

impl AuthorizationGateway {
    pub fn new(
        roles: Arc<dyn BaseRoleStore>,
        audit: Arc<dyn BaseAuditLog>,
        clock: Arc<dyn BaseClock>,
        resolver: PolicyResolver,
        audit_timeout: Duration,
    ) -> Self {
        Self {
            roles,
            audit,
            clock,
            resolver,
            audit_timeout,
        }
    }

    pub fn resolver(&self) -> &PolicyResolver {
        &self.resolver
    }

    /// Resolve a subject's policy from its grants at the current instant.
    ///
    /// Also serves as the non-authoritative presentation hint for UI menus;
    /// mutations must still go through [`Self::check_and_log`].
    pub async fn effective_policy(&self, subject_id: &SubjectId) -> Result<EffectivePolicy, AuthError> {
        let now = self.clock.now();
        let grants = self.roles.list_effective(subject_id, now).await?;
        Ok(self.resolver.resolve(&grants, now))
    }

    /// Side-effect-free authorization check.
    pub async fn check(
        &self,
        subject_id: &SubjectId,
        requirement: &Requirement,
    ) -> Result<Decision, AuthError> {
        let policy = self.effective_policy(subject_id).await?;
        let decision = self.resolver.authorize(&policy, requirement);

        if let Decision::Deny(reason) = decision {
            debug!(
                subject = %subject_id,
                requirement = %requirement,
                reason = %reason,
                "Authorization denied"
            );
        }
        Ok(decision)
    }

    /// Check, and on permit durably record the action before returning.
    ///
    /// If the audit write fails or times out the permit is withdrawn and the
    /// result is `Deny(AuditUnavailable)`. A timed-out write is looked up by
    /// its pre-assigned id first; if the record landed, the permit stands.
    /// A commit that lands after that lookup leaves a record for a withdrawn
    /// permit (over-audit, never under-audit).
    pub async fn check_and_log(
        &self,
        subject_id: &SubjectId,
        requirement: &Requirement,
        action: &str,
        resource: ResourceRef,
        context: AuditContext,
    ) -> Result<Decision, AuthError> {
        let decision = self.check(subject_id, requirement).await?;
        if !decision.is_permit() {
            return Ok(decision);
        }

        let entry = NewAuditEntry::builder()
            .actor_id(subject_id.clone())
            .action(action)
            .resource(resource)
            .details(context.details.unwrap_or_else(|| Value::Object(Default::default())))
            .origin(context.origin)
            .build();

        let entry_id = entry.id;
        let outcome = match self.record_bounded(entry).await {
            Err(AuditError::Timeout(elapsed)) => self.confirm_late_write(entry_id, elapsed).await,
            other => other,
        };

        match outcome {
            Ok(record) => {
                debug!(
                    record_id = %record.id,
                    subject = %subject_id,
                    action = %record.action,
                    "Privileged action permitted and logged"
                );
                Ok(Decision::Permit)
            }
            Err(e) if e.is_unavailable() => {
                error!(
                    error = %e,
                    subject = %subject_id,
                    action = %action,
                    "Audit write failed, denying privileged action"
                );
                Ok(Decision::Deny(DenyReason::AuditUnavailable))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn confirm_late_write(
        &self,
        id: AuditRecordId,
        elapsed: Duration,
    ) -> Result<AuditRecord, AuditError> {
        match tokio::time::timeout(self.audit_timeout, self.audit.find(id)).await {
            Ok(Ok(Some(record))) => {
                warn!(record_id = %id, "Audit write acknowledged late, record is present");
                Ok(record)
            }
            _ => Err(AuditError::Timeout(elapsed)),
        }
    }

    async fn record_bounded(&self, entry: NewAuditEntry) -> Result<AuditRecord, AuditError> {
        tokio::time::timeout(self.audit_timeout, self.audit.record(entry))
            .await
            .map_err(|_| AuditError::Timeout(self.audit_timeout))?
    }

    /// Whether a grantor's policy may create or revoke a grant at `target_level`.
    ///
    /// Strictly greater level is required; an equal level is enough only with
    /// `roles:grant_equal`.
    pub fn may_manage_level(&self, grantor: &EffectivePolicy, target_level: i32) -> bool {
        grantor.level > target_level
            || (grantor.level == target_level
                && grantor.permissions.contains(&Capability::RolesGrantEqual))
    }

    /// Whether a grantor's policy may confer every capability in `permissions`.
    ///
    /// Full admins may confer anything. Everyone else may only pass on
    /// capabilities they hold, and never `roles:grant_equal`.
    pub fn may_confer(&self, grantor: &EffectivePolicy, permissions: &PermissionSet) -> bool {
        grantor.is_full_admin
            || (!permissions.contains(&Capability::RolesGrantEqual)
                && permissions.is_subset(&grantor.permissions))
    }

    async fn grantor_policy(&self, grantor: &SubjectId) -> Result<EffectivePolicy, RoleError> {
        let now = self.clock.now();
        let grants = self.roles.list_effective(grantor, now).await?;
        Ok(self.resolver.resolve(&grants, now))
    }

    fn ensure_may_manage(
        &self,
        grantor: &SubjectId,
        policy: &EffectivePolicy,
        target_level: i32,
    ) -> Result<(), RoleError> {
        if self.may_manage_level(policy, target_level) {
            Ok(())
        } else {
            info!(
                grantor = %grantor,
                grantor_level = policy.level,
                target_level,
                "Role management blocked by level ordering"
            );
            Err(RoleError::InvalidGrantor {
                grantor: grantor.clone(),
                level: target_level,
                reason: DenyReason::InsufficientLevel,
            })
        }
    }

    fn ensure_may_confer(
        &self,
        grantor: &SubjectId,
        policy: &EffectivePolicy,
        grant: &NewRoleGrant,
    ) -> Result<(), RoleError> {
        if self.may_confer(policy, &grant.permissions) {
            return Ok(());
        }

        let missing: Vec<&str> = grant
            .permissions
            .iter()
            .filter(|cap| {
                **cap == Capability::RolesGrantEqual || !policy.permissions.contains(*cap)
            })
            .map(|cap| cap.as_str())
            .collect();
        info!(
            grantor = %grantor,
            missing = ?missing,
            "Role grant blocked: capabilities not held by grantor"
        );
        Err(RoleError::InvalidGrantor {
            grantor: grantor.clone(),
            level: grant.level,
            reason: DenyReason::MissingPermission,
        })
    }

    /// Grant a role on behalf of `grantor`. The store writes the
    /// `grant_role` audit record in the same unit of work.
    pub async fn grant_role(
        &self,
        grantor: &SubjectId,
        request: RoleGrantRequest,
        origin: Option<String>,
    ) -> Result<RoleGrant, RoleError> {
        let grant = request.into_new_grant(grantor.clone());
        grant.validate(self.clock.now())?;

        let policy = self.grantor_policy(grantor).await?;
        self.ensure_may_manage(grantor, &policy, grant.level)?;
        self.ensure_may_confer(grantor, &policy, &grant)?;

        self.roles.grant(grant, origin).await
    }

    /// Revoke a grant on behalf of `revoker`, ordered against the grant's level.
    pub async fn revoke_role(
        &self,
        revoker: &SubjectId,
        grant_id: GrantId,
        origin: Option<String>,
    ) -> Result<RevokeOutcome, RoleError> {
        let target = self
            .roles
            .find_by_id(grant_id)
            .await?
            .ok_or(RoleError::NotFound(grant_id))?;
        let policy = self.grantor_policy(revoker).await?;
        self.ensure_may_manage(revoker, &policy, target.level)?;

        self.roles.revoke(grant_id, revoker, origin).await
    }

    /// Effective grants for `subject_id`, for the role-management screen.
    pub async fn list_effective(
        &self,
        viewer: &SubjectId,
        subject_id: &SubjectId,
        origin: Option<String>,
    ) -> Result<Vec<RoleGrant>, AuthError> {
        let requirement = Requirement::permission(Capability::RolesGrant);
        let decision = self
            .check_and_log(
                viewer,
                &requirement,
                VIEW_ROLES_ACTION,
                ResourceRef::new(SUBJECT_RESOURCE, subject_id.as_str()),
                AuditContext::from_origin(origin),
            )
            .await?;
        if let Decision::Deny(reason) = decision {
            return Err(AuthError::Denied(reason));
        }

        Ok(self.roles.list_effective(subject_id, self.clock.now()).await?)
    }

    /// Audit review, gated on `audit:read`.
    pub async fn query_audit(
        &self,
        viewer: &SubjectId,
        filter: &AuditFilter,
        page: &ValidatedPage,
        origin: Option<String>,
    ) -> Result<Page<AuditRecord>, AuthError> {
        let requirement = Requirement::permission(Capability::AuditRead);
        let decision = self
            .check_and_log(
                viewer,
                &requirement,
                READ_AUDIT_ACTION,
                ResourceRef::collection("audit_log"),
                AuditContext::from_origin(origin),
            )
            .await?;
        if let Decision::Deny(reason) = decision {
            return Err(AuthError::Denied(reason));
        }

        Ok(self.audit.query(filter, page).await?)
    }
}
