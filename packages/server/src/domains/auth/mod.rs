//! Auth domain - bearer token verification
//!
//! Identity comes from the upstream identity provider; this module only
//! verifies the token and yields a `SubjectId`. What the subject may do is
//! decided by `common::auth`.

pub mod jwt;

pub use jwt::{Claims, JwtService};
