/// Authorization module for the admin core
///
/// Content editors go through the fluent API:
///
/// ```rust,ignore
/// use crate::common::auth::{Actor, Capability, Requirement};
///
/// Actor::new(subject_id)
///     .requires(Requirement::either(5, Capability::ContentWrite))
///     .check_and_log(&deps, "update", ResourceRef::new("fee", fee_id))
///     .await?;
/// ```
///
/// Resolution (`PolicyResolver`) is pure; the gateway does the I/O and owns
/// the no-unaudited-permit rule.

mod builder;
mod capability;
mod errors;
mod gateway;
mod policy;
mod requirement;

pub use builder::{Actor, HasAuthContext, RequirementBuilder};
pub use capability::{
    permissions_from_strings, permissions_to_strings, Capability, PermissionSet,
    UnknownCapability,
};
pub use errors::AuthError;
pub use gateway::{AuditContext, AuthorizationGateway, READ_AUDIT_ACTION, VIEW_ROLES_ACTION};
pub use policy::{EffectivePolicy, PolicyResolver, DEFAULT_FULL_ADMIN_LEVEL};
pub use requirement::{Decision, DenyReason, InvalidRequirement, Requirement};
