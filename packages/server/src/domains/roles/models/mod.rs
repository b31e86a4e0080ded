pub mod role_grant;

pub(crate) use role_grant::RoleGrantRow;
pub use role_grant::{
    NewRoleGrant, RevokeOutcome, RoleGrant, RoleGrantRequest, GRANT_ROLE_ACTION, REVOKE_ROLE_ACTION,
    SUBJECT_RESOURCE,
};
