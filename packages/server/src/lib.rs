// Admin Authorization Core
//
// This crate decides whether an authenticated subject may perform a privileged
// action on shared content, and keeps an append-only audit trail of every
// permitted action and every role change.
//
// Layout: role and audit persistence live in domains/*, the authorization
// rules and gateway in common/auth, infrastructure traits in kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
