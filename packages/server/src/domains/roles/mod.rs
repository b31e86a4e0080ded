//! Roles domain - durable admin grants
//!
//! Grants carry a numeric level and a capability set. They are created,
//! revoked, and read through `BaseRoleStore`; every change writes an audit
//! record in the same unit of work.

pub mod errors;
pub mod models;
pub mod store;

pub use errors::RoleError;
pub use models::{
    NewRoleGrant, RevokeOutcome, RoleGrant, RoleGrantRequest, GRANT_ROLE_ACTION,
    REVOKE_ROLE_ACTION, SUBJECT_RESOURCE,
};
pub use store::PostgresRoleStore;
